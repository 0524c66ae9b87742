//! HTTP request handlers.

pub mod metrics;
pub mod username;

pub use metrics::metrics_handler;
pub use username::check_username;
