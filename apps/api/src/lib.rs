//! # techshop-api
//!
//! Router and state for the TechShop HTTP server. `main.rs` only loads
//! configuration, opens the database and serves [`app`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

use axum::Router;

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    routes::router(state)
}

// =============================================================================
// Handler Tests
// =============================================================================
