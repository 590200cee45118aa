//! # labeldesk common library
//!
//! Shared code for the labeldesk annotation service:
//! - Configuration loading and validation
//! - Label taxonomy (option → canonical code mapping)
//! - Labeller roster
//! - Record / labelled-entry models
//! - Tabular store adapter and backends
//! - Resume tracking and the credential gate

pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod resume;
pub mod roster;
pub mod store;
pub mod taxonomy;
pub mod time;

pub use error::{Error, Result};
pub use taxonomy::{Category, Choice, Taxonomy};
