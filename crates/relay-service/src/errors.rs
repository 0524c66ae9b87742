//! Signaling relay error types.
//!
//! Errors raised while handling client events are never fatal: they are
//! either reported to the originating session or logged and dropped.
//! HTTP handlers convert them to responses via `IntoResponse`, returning
//! client-safe messages only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Signaling relay error type.
///
/// Maps to HTTP status codes when surfaced over HTTP:
/// - `BadRequest`, `MalformedMessage`: 400 Bad Request
/// - `DuplicateName`: 409 Conflict
/// - `UnresolvedTarget`: 404 Not Found
/// - `NotificationFailure`, `Config`, `Internal`: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Display name already used in the room.
    #[error("Username '{username}' already exists in room '{room}'")]
    DuplicateName { username: String, room: String },

    /// Target session id is not registered.
    #[error("Unresolved target session: {0}")]
    UnresolvedTarget(String),

    /// Delivering an event to a session failed.
    #[error("Notification to session {session_id} failed: {reason}")]
    NotificationFailure { session_id: String, reason: String },

    /// Inbound frame could not be decoded.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Invalid HTTP request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the error code string used in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::DuplicateName { .. } => "DUPLICATE_NAME",
            RelayError::UnresolvedTarget(_) => "NOT_FOUND",
            RelayError::MalformedMessage(_) => "MALFORMED_MESSAGE",
            RelayError::BadRequest(_) => "BAD_REQUEST",
            RelayError::NotificationFailure { .. }
            | RelayError::Config(_)
            | RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::BadRequest(_) | RelayError::MalformedMessage(_) => 400,
            RelayError::UnresolvedTarget(_) => 404,
            RelayError::DuplicateName { .. } => 409,
            RelayError::NotificationFailure { .. }
            | RelayError::Config(_)
            | RelayError::Internal(_) => 500,
        }
    }

    /// Returns a bounded label string for the error variant (for metrics).
    pub fn error_type_label(&self) -> &'static str {
        match self {
            RelayError::DuplicateName { .. } => "duplicate_name",
            RelayError::UnresolvedTarget(_) => "unresolved_target",
            RelayError::NotificationFailure { .. } => "notification_failure",
            RelayError::MalformedMessage(_) => "malformed_message",
            RelayError::BadRequest(_) => "bad_request",
            RelayError::Config(_) => "config",
            RelayError::Internal(_) => "internal",
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            RelayError::DuplicateName { .. } => crate::protocol::ERROR_MESSAGE_REPEAT.to_string(),
            RelayError::UnresolvedTarget(_) => "Target session not found".to_string(),
            RelayError::MalformedMessage(_) => "Malformed message".to_string(),
            RelayError::BadRequest(reason) => reason.clone(),
            RelayError::NotificationFailure { .. }
            | RelayError::Config(_)
            | RelayError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            // Log actual error server-side, return generic message to client
            tracing::error!(target: "relay.http", error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<crate::config::ConfigError> for RelayError {
    fn from(err: crate::config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}
