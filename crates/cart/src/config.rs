//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ROCKETSHOES_API_URL` - Base URL of the storefront API (serves
//!   `/stock/{id}` and `/products/{id}`)
//!
//! ## Optional
//! - `ROCKETSHOES_API_TOKEN` - Bearer token for the storefront API
//! - `ROCKETSHOES_STORAGE_PATH` - Storage file (default: .rocketshoes/storage.json)
//! - `ROCKETSHOES_CART_KEY` - Storage key of the cart entry (default: @RocketShoes:cart)
//! - `ROCKETSHOES_HTTP_TIMEOUT_SECS` - Request timeout (default: 10)
//! - `ROCKETSHOES_CATALOG_CACHE_TTL_SECS` - Product cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::storage::DEFAULT_CART_KEY;

const DEFAULT_STORAGE_PATH: &str = ".rocketshoes/storage.json";
const DEFAULT_HTTP_TIMEOUT_SECS: &str = "10";
const DEFAULT_CATALOG_CACHE_TTL_SECS: &str = "300";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &["your-", "changeme", "replace", "placeholder", "xxx", "todo"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Storefront API configuration
    pub api: ApiConfig,
    /// File backing the local storage
    pub storage_path: PathBuf,
    /// Storage key of the cart entry
    pub cart_key: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Storefront API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:3333`
    pub base_url: Url,
    /// Optional bearer token
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long product lookups stay cached
    pub catalog_cache_ttl: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .finish()
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api = ApiConfig::from_lookup(&lookup)?;
        let storage_path =
            PathBuf::from(get_or_default(&lookup, "ROCKETSHOES_STORAGE_PATH", DEFAULT_STORAGE_PATH));
        let cart_key = get_or_default(&lookup, "ROCKETSHOES_CART_KEY", DEFAULT_CART_KEY);
        if cart_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "ROCKETSHOES_CART_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty());

        Ok(Self {
            api,
            storage_path,
            cart_key,
            sentry_dsn,
        })
    }
}

impl ApiConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_required(lookup, "ROCKETSHOES_API_URL")?;
        let base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ROCKETSHOES_API_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "ROCKETSHOES_API_URL".to_string(),
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }

        let token = match lookup("ROCKETSHOES_API_TOKEN").filter(|t| !t.is_empty()) {
            Some(value) => {
                let token = SecretString::from(value);
                validate_token(&token, "ROCKETSHOES_API_TOKEN")?;
                Some(token)
            }
            None => None,
        };

        Ok(Self {
            base_url,
            token,
            timeout: get_seconds(lookup, "ROCKETSHOES_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            catalog_cache_ttl: get_seconds(
                lookup,
                "ROCKETSHOES_CATALOG_CACHE_TTL_SECS",
                DEFAULT_CATALOG_CACHE_TTL_SECS,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Get a positive number of seconds.
fn get_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    let secs = get_or_default(lookup, key, default)
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Reject tokens that are obviously copied from a template.
fn validate_token(token: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let lower = token.expose_secret().to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    Ok(())
}
