#![warn(missing_docs)]

//! # Skein API
//!
//! The outward-facing surface: REST endpoints for compilation, execution
//! lifecycle and credentials; SSE and WebSocket streams for live events;
//! JWT authentication; tier-based throttling. Every read is filtered by the
//! authenticated user.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
