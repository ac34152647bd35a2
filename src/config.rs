//! Runtime configuration for the EHR summarizer.
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file). The resolved [`AppConfig`] is then passed by value to the parts that
//! need it; nothing reads the environment after startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default `SQLite` database file.
pub const DEFAULT_DATABASE_PATH: &str = "ehr_summarizer.db";
/// Default directory for static assets.
pub const DEFAULT_STATIC_DIR: &str = "static";
/// Development-only signing key, replaced in any real deployment.
pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-in-production";
/// Access tokens live for 8 hours by default.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 480;
/// PBKDF2 rounds for password hashing.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;
/// Azure `OpenAI` API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
/// Upper bound for one external summarization call.
pub const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 60;
/// Sampling temperature for the external model.
pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.2;

const PORT_ENV: &str = "EHR_PORT";
const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
const STATIC_DIR_ENV: &str = "STATIC_DIR";
const SECRET_KEY_ENV: &str = "SECRET_KEY";
const TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";
const PBKDF2_ITERATIONS_ENV: &str = "PASSWORD_HASH_ITERATIONS";
const AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
const AZURE_KEY_ENV: &str = "AZURE_OPENAI_KEY";
const AZURE_DEPLOYMENT_ENV: &str = "AZURE_OPENAI_DEPLOYMENT";
const AZURE_API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";
const SUMMARY_TIMEOUT_ENV: &str = "SUMMARY_TIMEOUT_SECS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The external endpoint is not a valid URL.
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Password hashing and token settings.
    pub auth: AuthConfig,
    /// Summary strategy settings.
    pub summarizer: SummarizerConfig,
}

impl AppConfig {
    /// Load `.env` (if present) and build the configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or validation fails.
    pub fn from_env() -> ConfigResult<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if let Some(problem) = dotenv_problem(&err) {
                warn!(%problem, "ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or validation fails.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(port) = var(PORT_ENV) {
            config.server.port = parse_var(PORT_ENV, &port)?;
        }
        if let Some(dir) = var(STATIC_DIR_ENV) {
            config.server.static_dir = PathBuf::from(dir);
        }
        if let Some(path) = var(DATABASE_PATH_ENV) {
            config.storage.database_path = PathBuf::from(path);
        }
        if let Some(secret) = var(SECRET_KEY_ENV) {
            config.auth.secret_key = secret;
        }
        if let Some(ttl) = var(TOKEN_TTL_ENV) {
            config.auth.token_ttl_minutes = parse_var(TOKEN_TTL_ENV, &ttl)?;
        }
        if let Some(iterations) = var(PBKDF2_ITERATIONS_ENV) {
            config.auth.pbkdf2_iterations = parse_var(PBKDF2_ITERATIONS_ENV, &iterations)?;
        }

        config.summarizer.endpoint = var(AZURE_ENDPOINT_ENV);
        config.summarizer.api_key = var(AZURE_KEY_ENV);
        config.summarizer.deployment = var(AZURE_DEPLOYMENT_ENV);
        if let Some(version) = var(AZURE_API_VERSION_ENV) {
            config.summarizer.api_version = version;
        }
        if let Some(timeout) = var(SUMMARY_TIMEOUT_ENV) {
            config.summarizer.timeout_secs = parse_var(SUMMARY_TIMEOUT_ENV, &timeout)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".to_string()));
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.database_path must not be empty".to_string(),
            ));
        }

        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.secret_key must not be empty".to_string(),
            ));
        }

        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_minutes must be > 0".to_string(),
            ));
        }

        if self.auth.pbkdf2_iterations == 0 {
            return Err(ConfigError::Invalid(
                "auth.pbkdf2_iterations must be > 0".to_string(),
            ));
        }

        self.summarizer.validate()
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory served for unmatched routes.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database file.
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// Password hashing and access token settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for access tokens.
    #[serde(skip_serializing)]
    pub secret_key: String,
    /// Token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// PBKDF2 rounds for new password hashes.
    pub pbkdf2_iterations: u32,
}

impl AuthConfig {
    /// True when the built-in development key is still in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

/// Settings for the external generative-text service.
///
/// The service is only used when endpoint, key and deployment are all set;
/// otherwise summaries come from the local fallback.
#[derive(Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Azure `OpenAI` resource endpoint, e.g. `https://example.openai.azure.com`.
    pub endpoint: Option<String>,
    /// API key sent in the `api-key` header.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Deployment (model) identifier.
    pub deployment: Option<String>,
    /// API version query parameter.
    pub api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f32,
}

impl SummarizerConfig {
    /// Capability check: true when the external service can be called.
    #[must_use]
    pub fn is_external_configured(&self) -> bool {
        [&self.endpoint, &self.api_key, &self.deployment]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// Builder-style helper for configuring the external service.
    #[must_use]
    pub fn with_external(
        mut self,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        self.endpoint = Some(endpoint.into());
        self.api_key = Some(api_key.into());
        self.deployment = Some(deployment.into());
        self
    }

    /// Validate summarizer settings.
    ///
    /// # Errors
    /// Returns an error if the endpoint is malformed or limits are out of range.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.timeout_secs must be > 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "summarizer.temperature must be within 0.0..=2.0".to_string(),
            ));
        }

        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint)?;
        }

        Ok(())
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_SUMMARY_TIMEOUT_SECS,
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
        }
    }
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} has invalid value {value:?}")))
}

/// Describe a `.env` failure worth reporting; a missing file is not one.
fn dotenv_problem(err: &dotenvy::Error) -> Option<String> {
    (!err.not_found()).then(|| err.to_string())
}
