//! Error types for labeldesk-web HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing/invalid session or wrong password (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Rejected session action (400/409 depending on the cause)
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Session(err) => match err {
                SessionError::Incomplete { missing } => {
                    details = Some(json!({
                        "missing": missing.iter().map(|c| c.key()).collect::<Vec<_>>()
                    }));
                    (StatusCode::BAD_REQUEST, "INCOMPLETE_SUBMISSION")
                }
                SessionError::UnknownLabeller(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_LABELLER"),
                SessionError::UnknownOption(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_OPTION"),
                SessionError::IdentityNotSelected => (StatusCode::CONFLICT, "IDENTITY_NOT_SELECTED"),
                SessionError::Ended(_) => (StatusCode::CONFLICT, "SESSION_ENDED"),
            },
        };

        let mut error = json!({
            "code": error_code,
            "message": self.to_string(),
        });
        if let (Some(details), Some(obj)) = (details, error.as_object_mut()) {
            obj.insert("details".to_string(), details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
