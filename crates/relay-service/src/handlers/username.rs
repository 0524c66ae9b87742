//! Username availability query.
//!
//! - `GET /checkUsername?username=&roomname=`
//!
//! The answer comes from the same directory predicate the join path uses,
//! so a name reported free is accepted by a subsequent join unless someone
//! else takes it first.

use crate::errors::RelayError;
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Query parameters for `/checkUsername`.
#[derive(Debug, Deserialize)]
pub struct CheckUsernameQuery {
    pub username: Option<String>,
    pub roomname: Option<String>,
}

/// Response body for `/checkUsername`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckUsernameResponse {
    pub success: bool,
    pub is_repeat: bool,
}

/// Handler for `GET /checkUsername`.
///
/// # Response
///
/// - 200 OK: `{"success": true, "isRepeat": <bool>}`
/// - 400 Bad Request: `username` or `roomname` missing
/// - 500 Internal Server Error: signaling actor unavailable
#[instrument(skip_all, name = "relay.http.check_username")]
pub async fn check_username(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckUsernameQuery>,
) -> Result<Json<CheckUsernameResponse>, RelayError> {
    let username = query
        .username
        .ok_or_else(|| RelayError::BadRequest("missing query parameter: username".to_string()))?;
    let room_name = query
        .roomname
        .ok_or_else(|| RelayError::BadRequest("missing query parameter: roomname".to_string()))?;

    let is_repeat = state.signaling.check_username(username, room_name).await?;

    Ok(Json(CheckUsernameResponse {
        success: true,
        is_repeat,
    }))
}
