pub mod settings;

pub use settings::{AppConfig, HealthConfig, LogFormat, LoggingConfig, RequestIdConfig, ServerConfig};
