//! Client transports.

pub mod websocket;

pub use websocket::websocket_handler;
