//! QuillHub API Library
//!
//! Identity subsystem and HTTP surface for the QuillHub API server.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
