//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{random_secret, AuthConfig, DEFAULT_ADMIN_PASSWORD, DEFAULT_MIN_PASSWORD_LEN};
use crate::email::DEFAULT_SEND_DELAY;
use crate::token::DEFAULT_TOKEN_LIFETIME_DAYS;

/// Default address for admin request notifications
pub const DEFAULT_SITE_EMAIL: &str = "admin@localhost";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database for the durable tier
    pub db_path: PathBuf,

    /// Authentication settings
    pub auth: AuthConfig,

    /// Recipient of admin request notifications
    pub site_email: String,

    /// Simulated email delivery delay
    pub email_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("LOCALAUTH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let token_secret = std::env::var("LOCALAUTH_TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!("No token secret configured - using random secret (sessions will not survive restart)");
            random_secret()
        });

        let token_lifetime_days = parse_var("LOCALAUTH_TOKEN_DAYS")?.unwrap_or(DEFAULT_TOKEN_LIFETIME_DAYS);

        let min_password_len = parse_var("LOCALAUTH_MIN_PASSWORD_LEN")?.unwrap_or(DEFAULT_MIN_PASSWORD_LEN);

        let default_admin_password = std::env::var("LOCALAUTH_DEFAULT_ADMIN_PASSWORD")
            .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string());

        let site_email = std::env::var("LOCALAUTH_SITE_EMAIL")
            .unwrap_or_else(|_| DEFAULT_SITE_EMAIL.to_string());

        let email_delay = parse_var::<u64>("LOCALAUTH_EMAIL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEND_DELAY);

        let auth = AuthConfig {
            token_secret,
            token_lifetime_days,
            min_password_len,
            default_admin_password,
        };
        auth.token_lifetime().context("invalid value for LOCALAUTH_TOKEN_DAYS")?;

        Ok(Self {
            db_path,
            auth,
            site_email,
            email_delay,
        })
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("localauth")
        .join("storage.db")
}

/// Parse an optional numeric variable; present but malformed is an error
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_missing_is_none() {
        let value: Option<u64> = parse_var("LOCALAUTH_TEST_UNSET_VARIABLE").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_default_db_path_is_namespaced() {
        let path = default_db_path();
        assert!(path.ends_with("localauth/storage.db"));
    }
}
