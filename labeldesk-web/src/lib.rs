//! labeldesk-web library - annotation service
//!
//! Serves the labelling UI and the JSON API behind it. Exposed as a library
//! so integration tests can build the router against an in-memory store.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use labeldesk_common::config::AppConfig;
use labeldesk_common::gate::CredentialGate;
use labeldesk_common::store::SharedStore;

pub mod api;
pub mod desk;
pub mod error;
pub mod registry;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use crate::desk::Desk;
use crate::registry::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Store, tables, taxonomy and roster shared by all sessions
    pub desk: Arc<Desk>,
    /// Password check for `/api/login`
    pub gate: Arc<CredentialGate>,
    /// Live sessions keyed by session id
    pub sessions: Arc<SessionRegistry>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(desk: Desk, gate: CredentialGate) -> Self {
        Self {
            desk: Arc::new(desk),
            gate: Arc::new(gate),
            sessions: Arc::new(SessionRegistry::new()),
            startup_time: Utc::now(),
        }
    }

    /// Assemble state from validated configuration and an open store
    pub fn from_config(config: &AppConfig, store: SharedStore) -> Self {
        let desk = Desk::new(
            store,
            config.store.input_table.clone(),
            config.store.output_table.clone(),
            config.taxonomy.clone(),
            config.roster.clone(),
        );
        Self::new(desk, CredentialGate::new(&config.password))
    }
}

/// Build application router
///
/// Health, login, taxonomy and UI assets are public; everything under
/// `/api/session` requires a session id from `/api/login`.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Protected routes (require a logged-in session)
    let protected = Router::new()
        .route(
            "/api/session",
            get(api::get_session).delete(api::logout),
        )
        .route("/api/session/labeller", post(api::choose_labeller))
        .route("/api/session/selection", put(api::set_selection))
        .route("/api/session/submit", post(api::submit_label))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    // Public routes (no session)
    let public = Router::new()
        .route("/api/login", post(api::login))
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/taxonomy", get(api::get_taxonomy))
        .merge(api::ui_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
