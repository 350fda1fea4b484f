//! HTTP handlers

pub mod health;
pub mod routes;

pub use health::{handle_liveness, handle_readiness, health_routes};
pub use routes::create_routes;
