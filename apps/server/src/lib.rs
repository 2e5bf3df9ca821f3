#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used, clippy::panic, clippy::todo, clippy::unimplemented))]

pub mod bots;
pub mod config;
pub mod domain;
pub mod error;
pub mod errors;
pub mod infra;
pub mod matchmaker;
pub mod middleware;
pub mod room;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod telemetry;
pub mod ws;

// Re-exports for public API
pub use config::AppConfig;
pub use error::AppError;
pub use errors::ErrorKind;
pub use middleware::cors::cors_middleware;
pub use state::app_state::AppState;
