//! Process configuration read from the environment (and `.env`, if present).

use std::path::PathBuf;

use services::services::auth::AuthSettings;
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret";
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;
const MAX_ESCALATION_HOURS: i64 = 365 * 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub guest_password: Option<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub escalation_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let bootstrap_admin = match (
            var("BOOTSTRAP_ADMIN_EMAIL"),
            var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_EMAIL")),
        };

        let token_ttl_secs: i64 = parse(&var, "TOKEN_TTL_SECS", 86_400)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl_secs) {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECS",
                value: token_ttl_secs.to_string(),
            });
        }
        let escalation_hours: i64 = parse(&var, "ESCALATION_HOURS", 48)?;
        if !(0..=MAX_ESCALATION_HOURS).contains(&escalation_hours) {
            return Err(ConfigError::Invalid {
                name: "ESCALATION_HOURS",
                value: escalation_hours.to_string(),
            });
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&var, "PORT", 3001)?,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://civic.db?mode=rwc".to_string()),
            jwt_secret,
            token_ttl_secs,
            guest_password: var("GUEST_PASSWORD"),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/uploads")),
            max_upload_bytes: parse(&var, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            bootstrap_admin,
            escalation_hours,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: chrono::Duration::seconds(self.token_ttl_secs),
            guest_password: self.guest_password.clone(),
        }
    }
}

fn parse<T, V>(var: &V, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
