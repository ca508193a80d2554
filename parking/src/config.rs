//! Configuration management for the parking service.
//!
//! Loads configuration from environment variables (after `.env`, if present)
//! with sensible defaults. Only `DATABASE_URL` is mandatory.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Development fallback for `JWT_SECRET`.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

/// Configuration loading failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub database: DatabaseConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Token signing configuration
    pub auth: AuthConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Real-time channel configuration
    pub notifications: NotificationConfig,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Require TLS (`DB_SSL=true`)
    pub ssl: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 7 days)
    pub token_ttl: u64,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Razorpay key id
    pub razorpay_key_id: Option<String>,
    /// Razorpay key secret
    pub razorpay_key_secret: Option<String>,
    /// Razorpay API base URL
    pub razorpay_base_url: String,
    /// ISO currency code for orders
    pub currency: String,
}

impl PaymentConfig {
    /// Both gateway credentials, when configured.
    #[must_use]
    pub fn razorpay_credentials(&self) -> Option<(&str, &str)> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Real-time channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Per-subscriber buffer before messages are dropped
    pub channel_capacity: usize,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(non_empty)
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Used by [`Config::from_env`] and by tests, which cannot mutate the
    /// process environment safely.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let num = |key: &str, default: u64| get(key).and_then(|s| s.parse().ok()).unwrap_or(default);

        let url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections: u32::try_from(num("DATABASE_MAX_CONNECTIONS", 10)).unwrap_or(10),
                min_connections: u32::try_from(num("DATABASE_MIN_CONNECTIONS", 1)).unwrap_or(1),
                connect_timeout: num("DATABASE_CONNECT_TIMEOUT", 30),
                ssl: get("DB_SSL").is_some_and(|v| v == "true"),
            },
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: u16::try_from(num("PORT", 3000)).unwrap_or(3000),
                shutdown_timeout: num("SHUTDOWN_TIMEOUT", 30),
            },
            auth: AuthConfig {
                jwt_secret: get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
                token_ttl: num("TOKEN_TTL", 604_800), // 7 days
            },
            payment: PaymentConfig {
                razorpay_key_id: get("RAZORPAY_KEY_ID"),
                razorpay_key_secret: get("RAZORPAY_KEY_SECRET"),
                razorpay_base_url: get("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|| "https://api.razorpay.com".to_string()),
                currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            },
            notifications: NotificationConfig {
                channel_capacity: usize::try_from(num("NOTIFY_CHANNEL_CAPACITY", 256))
                    .unwrap_or(256),
            },
        })
    }

    /// Whether the signing secret is still the development default.
    #[must_use]
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }
}
