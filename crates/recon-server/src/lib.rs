//! Recon Server Library
//!
//! HTTP front end that launches the recon script for a `(domain, task)` pair
//! and streams its output back to the caller while it runs.

pub mod api_router;
pub mod config;
pub mod error;
pub mod logging;
pub mod run_api;
pub mod validation;

pub use api_router::create_api_router;
pub use config::AppConfig;
pub use error::{ApiError, ErrorResponse};
pub use validation::{RunRequest, ValidationError};
