pub mod auth;
pub mod bhyt;
pub mod cache;
pub mod checklist_progress;
pub mod checklist_session;
pub mod client;
pub mod config;
pub mod coverage;
pub mod debounce;
pub mod error;
pub mod models;
pub mod mutation;
pub mod outcomes;
pub mod resources;
pub mod session_timer;

pub use client::ApiClient;
pub use config::Config;
pub use error::ApiError;
