//! Session endpoints: identity, selections, submission

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use labeldesk_common::models::LabelledEntry;
use labeldesk_common::time::now_local;
use labeldesk_common::Category;

use super::auth::CurrentSession;
use crate::session::{SessionView, SubmitOutcome, SUBMITTED_MESSAGE};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ChooseLabellerRequest {
    pub labeller: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub category: String,
    /// Option label; `null` clears the selection
    pub option: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    /// Selections to apply before submitting, keyed by category
    #[serde(default)]
    pub selections: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// `saved` or `halted`
    pub status: &'static str,
    pub message: String,
    pub entry: Option<LabelledEntry>,
    pub view: SessionView,
}

fn parse_category(key: &str) -> ApiResult<Category> {
    Category::from_key(key).ok_or_else(|| ApiError::BadRequest(format!("Unknown category: {}", key)))
}

/// GET /api/session
pub async fn get_session(Extension(current): Extension<CurrentSession>) -> Json<SessionView> {
    Json(current.handle.lock().await.view())
}

/// POST /api/session/labeller
pub async fn choose_labeller(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(request): Json<ChooseLabellerRequest>,
) -> ApiResult<Json<SessionView>> {
    let mut session = current.handle.lock().await;
    session.choose_labeller(&state.desk, &request.labeller).await?;
    Ok(Json(session.view()))
}

/// PUT /api/session/selection
pub async fn set_selection(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(request): Json<SelectionRequest>,
) -> ApiResult<Json<SessionView>> {
    let category = parse_category(&request.category)?;
    let mut session = current.handle.lock().await;
    session.select(&state.desk, category, request.option.as_deref())?;
    Ok(Json(session.view()))
}

/// POST /api/session/submit
///
/// Applies any selections in the body, then validates and saves. Rejected
/// submissions leave the session on the same record.
pub async fn submit_label(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let mut selections = Vec::with_capacity(request.selections.len());
    for (key, option) in &request.selections {
        selections.push((parse_category(key)?, option.as_deref()));
    }

    let mut session = current.handle.lock().await;
    for (category, option) in selections {
        session.select(&state.desk, category, option)?;
    }

    let response = match session.submit(&state.desk, now_local()).await? {
        SubmitOutcome::Saved(entry) => SubmitResponse {
            status: "saved",
            message: SUBMITTED_MESSAGE.to_string(),
            entry: Some(*entry),
            view: session.view(),
        },
        SubmitOutcome::Halted(reason) => SubmitResponse {
            status: "halted",
            message: reason,
            entry: None,
            view: session.view(),
        },
    };
    Ok(Json(response))
}
