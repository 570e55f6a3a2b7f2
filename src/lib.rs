//! Library circulation service
//!
//! REST API for the borrow/return workflow of a library: pending borrow
//! requests, approvals against live inventory and per-user quotas, returns
//! with fine assessment, and a recurring overdue sweep.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod fine;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
