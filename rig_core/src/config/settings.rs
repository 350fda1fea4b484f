use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub health: HealthConfig,
    pub request_id: RequestIdConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Budget for every request; 0 disables the timeout guard.
    pub request_timeout_ms: u64,
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Applied to each check that has no timeout of its own.
    pub check_timeout_ms: u64,
    /// Run the checks of a collection concurrently instead of one at a time.
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIdConfig {
    pub header: String,
    /// Reuse the id sent by an upstream proxy instead of generating one.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_ms: 30_000,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: 5_000,
            parallel: false,
        }
    }
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header: "X-Request-ID".to_string(),
            trust_proxy: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl HealthConfig {
    pub fn new(check_timeout: Duration, parallel: bool) -> Self {
        Self {
            check_timeout_ms: u64::try_from(check_timeout.as_millis()).unwrap_or(u64::MAX),
            parallel,
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

impl AppConfig {
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from("config.toml")
    }

    /// Defaults, then `path` if it exists, then `APP__SECTION__KEY` variables.
    pub fn load_from(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.health.check_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Health check timeout must be greater than 0".to_string(),
            ));
        }

        if self.request_id.header.trim().is_empty() {
            return Err(ConfigError::Message(
                "Request id header cannot be empty".to_string(),
            ));
        }

        if http::HeaderName::from_bytes(self.request_id.header.as_bytes()).is_err() {
            return Err(ConfigError::Message(format!(
                "Request id header '{}' is not a valid header name",
                self.request_id.header
            )));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
