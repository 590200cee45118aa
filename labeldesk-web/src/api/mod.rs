//! HTTP API handlers for labeldesk-web

pub mod auth;
pub mod buildinfo;
pub mod health;
pub mod labelling;
pub mod taxonomy;
pub mod ui;

pub use auth::{login, logout, session_middleware, CurrentSession, SESSION_HEADER};
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use labelling::{choose_labeller, get_session, set_selection, submit_label};
pub use taxonomy::get_taxonomy;
pub use ui::ui_routes;
