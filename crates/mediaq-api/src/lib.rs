//! Axum HTTP/WS API server.
//!
//! This crate provides:
//! - Job creation, lookup, listing and removal over REST
//! - Live job event streaming over WebSocket
//! - Periodic aggregate stats on the global topic

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
