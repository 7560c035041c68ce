//! neurochat-core: local conversation history store
//!
//! This crate persists voice-chat conversations, their ordered turns and a
//! singleton user profile in an embedded SQLite database, and renders
//! conversations to markdown or JSON for export.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::Error;
pub use error::Result;
pub use store::ConversationStore;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "neurochat";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "NEUROCHAT".to_string()
}
