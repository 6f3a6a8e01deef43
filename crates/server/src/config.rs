//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SANDPIPER_DATABASE_URL` - `SQLite` connection string (e.g., `sqlite://sandpiper.db`)
//! - `PAYMENT_GATEWAY_KEY_ID` - Gateway publishable key (safe to expose)
//! - `PAYMENT_GATEWAY_KEY_SECRET` - Gateway signing secret (server-side only)
//!
//! ## Optional
//! - `SANDPIPER_HOST` - Bind address (default: 127.0.0.1)
//! - `SANDPIPER_PORT` - Listen port (default: 4000)
//! - `PAYMENT_GATEWAY_URL` - Gateway API base URL (default: https://api.gateway.example)
//! - `PAYMENT_CURRENCY` - ISO 4217 currency code (default: USD)
//! - `SHIPPING_API_URL` / `SHIPPING_API_EMAIL` / `SHIPPING_API_PASSWORD` -
//!   Shipping provider credentials; reverse-pickup registration is
//!   disabled unless all three are set.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use sandpiper_core::CurrencyCode;

/// Blocklist of common placeholder patterns (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-", "changeme", "replace", "placeholder", "example", "xxx", "todo", "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `SQLite` database connection URL.
    pub database_url: SecretString,
    /// IP address to bind the server to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Payment gateway configuration.
    pub gateway: GatewayConfig,
    /// Shipping provider configuration (reverse pickup registration).
    pub shipping: Option<ShippingConfig>,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL.
    pub base_url: String,
    /// Publishable key, exposed to clients via `GET /api/payment/key`.
    pub key_id: String,
    /// Signing secret for order creation auth and confirmation HMAC.
    pub key_secret: SecretString,
    /// Currency all gateway orders are created in.
    pub currency: CurrencyCode,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish()
    }
}

/// Shipping provider configuration.
#[derive(Clone)]
pub struct ShippingConfig {
    /// Provider API base URL.
    pub base_url: String,
    /// Login email for token issuance.
    pub email: String,
    /// Login password for token issuance.
    pub password: SecretString,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the gateway secret looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_env("SANDPIPER_DATABASE_URL").map(SecretString::from)?;
        let host = get_env_or_default("SANDPIPER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SANDPIPER_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("SANDPIPER_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SANDPIPER_PORT".to_owned(), e.to_string()))?;

        Ok(Self {
            database_url,
            host,
            port,
            gateway: GatewayConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("PAYMENT_CURRENCY", "USD");
        Ok(Self {
            base_url: get_env_or_default("PAYMENT_GATEWAY_URL", "https://api.gateway.example"),
            key_id: get_required_env("PAYMENT_GATEWAY_KEY_ID")?,
            key_secret: get_validated_secret("PAYMENT_GATEWAY_KEY_SECRET")?,
            currency: CurrencyCode::from_str(&currency)
                .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_owned(), e))?,
        })
    }
}

impl ShippingConfig {
    /// All-or-nothing: the provider integration is enabled only when every
    /// credential is present.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(base_url) = get_optional_env("SHIPPING_API_URL") else {
            return Ok(None);
        };
        Ok(Some(Self {
            base_url,
            email: get_required_env("SHIPPING_API_EMAIL")?,
            password: get_validated_secret("SHIPPING_API_PASSWORD")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Validate that a secret is not an obvious placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    if secret.len() < 16 {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("must be at least 16 characters (got {})", secret.len()),
        ));
    }
    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
