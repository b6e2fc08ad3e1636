//! Application configuration.
//!
//! # Responsibility
//! - Load settings from defaults, an optional TOML file and `TILNOTE__*`
//!   environment variables, in that order of precedence.
//! - Reject configurations that would start an insecure or broken process.
//!
//! # Invariants
//! - There is no global settings instance; the loaded [`AppConfig`] is passed
//!   to constructors explicitly.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "TILNOTE";
const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub email: EmailConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u32,
    pub hash: HashConfig,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    /// Argon2's recommended defaults (19 MiB, 2 passes, 1 lane).
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rotated log files; stderr only when unset.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub batch_size: u32,
    pub max_attempts: u32,
    pub backoff_base_secs: u32,
    pub lease_secs: u32,
}

impl AppConfig {
    /// Loads configuration. `path` names an optional TOML file; a missing
    /// file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "tilnote.sqlite3")?
            .set_default("auth.token_ttl_hours", 6)?
            .set_default("auth.hash.memory_kib", HashConfig::default().memory_kib)?
            .set_default("auth.hash.iterations", HashConfig::default().iterations)?
            .set_default("auth.hash.parallelism", HashConfig::default().parallelism)?
            .set_default("logging.level", crate::logging::default_log_level())?
            .set_default("email.sender", "no-reply@tilnote.local")?
            .set_default("worker.poll_interval_ms", 1000)?
            .set_default("worker.batch_size", 20)?
            .set_default("worker.max_attempts", 5)?
            .set_default("worker.backoff_base_secs", 30)?
            .set_default("worker.lease_secs", 300)?;

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<AppConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }
        if self.auth.token_ttl_hours == 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "database.path cannot be empty".to_string(),
            ));
        }
        if self.worker.max_attempts == 0 || self.worker.batch_size == 0 {
            return Err(ConfigError::Message(
                "worker.max_attempts and worker.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
