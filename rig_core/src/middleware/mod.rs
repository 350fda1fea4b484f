//! Middleware components for the HTTP server

pub mod logging;
pub mod recover;
pub mod request_id;
pub mod signal;
pub mod timeout;

pub use recover::recover_layer;
pub use request_id::{request_id_middleware, RequestId, RequestIdState};
pub use signal::signal_middleware;
pub use timeout::{default_timeout_response, timeout_middleware, TimeoutConfig};
