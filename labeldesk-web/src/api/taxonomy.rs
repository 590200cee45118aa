//! Roster, category options and reference definitions for the UI

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryOptions {
    pub key: &'static str,
    pub title: &'static str,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TaxonomyResponse {
    pub roster: Vec<String>,
    pub categories: Vec<CategoryOptions>,
    pub definitions: String,
}

/// GET /api/taxonomy
pub async fn get_taxonomy(State(state): State<AppState>) -> Json<TaxonomyResponse> {
    let taxonomy = state.desk.taxonomy();
    let categories = taxonomy
        .mappings()
        .iter()
        .map(|mapping| CategoryOptions {
            key: mapping.category().key(),
            title: mapping.category().title(),
            options: mapping.labels().map(str::to_string).collect(),
        })
        .collect();

    Json(TaxonomyResponse {
        roster: state.desk.roster().names().to_vec(),
        categories,
        definitions: taxonomy.definitions().to_string(),
    })
}
