//! Password gate and session middleware
//!
//! `POST /api/login` checks the shared password and hands out a session id.
//! Protected routes expect that id in the `X-Session-Id` header.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use labeldesk_common::gate::GateOutcome;

use crate::registry::SessionHandle;
use crate::{ApiError, ApiResult, AppState};

/// Header carrying the session id on protected routes
pub const SESSION_HEADER: &str = "x-session-id";

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: Uuid,
}

/// Session resolved by [`session_middleware`], available to handlers as an
/// `Extension`
#[derive(Clone)]
pub struct CurrentSession {
    pub id: Uuid,
    pub handle: SessionHandle,
}

/// POST /api/login
///
/// An empty password is a prompt, not a failed attempt. Wrong passwords get
/// a generic message; attempts are not rate limited.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    match state.gate.check(&request.password) {
        GateOutcome::Granted => {
            let session_id = state.sessions.create().await;
            info!(session_id = %session_id, "Login accepted");
            Ok(Json(LoginResponse { session_id }))
        }
        GateOutcome::Denied => {
            warn!("Login rejected: password incorrect");
            Err(ApiError::Unauthorized("Password incorrect".to_string()))
        }
        GateOutcome::Empty => Err(ApiError::BadRequest("Please enter the password".to_string())),
    }
}

/// DELETE /api/session
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> StatusCode {
    state.sessions.remove(&current.id).await;
    info!(session_id = %current.id, "Session closed");
    StatusCode::NO_CONTENT
}

/// Session middleware
///
/// Resolves `X-Session-Id` to a live session or answers 401.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| ApiError::Unauthorized("Please log in".to_string()))?;

    let handle = state.sessions.get(&id).await.ok_or_else(|| {
        ApiError::Unauthorized("Session expired or unknown, please log in again".to_string())
    })?;

    request.extensions_mut().insert(CurrentSession { id, handle });
    Ok(next.run(request).await)
}
