//! Environment-driven configuration.
//!
//! Connection parameters and API keys always come from the environment; nothing
//! is embedded in source. `Config::from_lookup` takes any key lookup so tests
//! can supply values without touching the process environment.

use crate::gate::SafetyPolicy;
use crate::llm::client::LlmProvider;
use crate::types::{AskError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default model for both completion calls.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// TLS mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = AskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(AskError::Config(format!("Unknown SSL mode: {}", other))),
        }
    }
}

/// Database connection and pool settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: SslMode,

    /// Pool ceiling on concurrent physical connections
    pub max_connections: u32,

    /// Idle connections are closed after this long
    pub idle_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Completion service settings.
#[derive(Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: String,

    /// Override for the provider's API root (e.g. an OpenAI-compatible gateway)
    pub base_url: Option<String>,

    pub timeout: Duration,
}

impl LlmConfig {
    pub fn provider(&self) -> LlmProvider {
        LlmProvider::from_model(&self.model)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub safety: SafetyPolicy,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AskError::Config` if a required variable is missing or a value
    /// does not parse
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            llm: LlmConfig::from_lookup(&lookup)?,
            safety: parse_or(&lookup, "ASKDB_SAFETY_POLICY", SafetyPolicy::Keyword)?,
        })
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: required(lookup, "ASKDB_DB_HOST")?,
            port: parse_or(lookup, "ASKDB_DB_PORT", 5432)?,
            user: required(lookup, "ASKDB_DB_USER")?,
            password: required(lookup, "ASKDB_DB_PASSWORD")?,
            database: required(lookup, "ASKDB_DB_NAME")?,
            ssl_mode: parse_or(lookup, "ASKDB_DB_SSLMODE", SslMode::Require)?,
            max_connections: parse_or(lookup, "ASKDB_DB_MAX_CONNECTIONS", 5)?,
            idle_timeout: Duration::from_secs(parse_or(lookup, "ASKDB_DB_IDLE_TIMEOUT_SECS", 10)?),
        })
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// The API key variable follows the provider implied by the model name.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = lookup("ASKDB_LLM_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_key = required(lookup, LlmProvider::from_model(&model).api_key_var())?;

        Ok(Self {
            model,
            api_key,
            base_url: lookup("ASKDB_LLM_BASE_URL").filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_secs(parse_or(lookup, "ASKDB_LLM_TIMEOUT_SECS", 60)?),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AskError::Config(format!("{} environment variable not set", key)))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AskError::Config(format!("Invalid {}: {}", key, e))),
        _ => Ok(default),
    }
}
