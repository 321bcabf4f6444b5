use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use axum::http::HeaderValue;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
const DEFAULT_MAIL_FROM: &str = "no-reply@share-wear.local";
const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Secret {0} is not configured")]
    MissingSecret(&'static str),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub client_origin: HeaderValue,
    /// Origin prefixed to upload URLs.
    pub server_url: String,
    pub upload_dir: PathBuf,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub trust_proxy: bool,
    pub mail_from: String,
    pub mail_relay_url: Option<String>,
    pub mail_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let port = try_load("RUST_PORT", DEFAULT_PORT)?;
        let client_origin: String =
            try_load("CLIENT_ORIGIN", DEFAULT_CLIENT_ORIGIN.to_string())?;

        Ok(Self {
            port,
            redis_url: optional("REDIS_URL"),
            jwt_secret: read_secret("JWT_SECRET").ok_or(ConfigError::MissingSecret("JWT_SECRET"))?,
            token_ttl_days: try_load("TOKEN_TTL_DAYS", DEFAULT_TOKEN_TTL_DAYS)?,
            client_origin: parse_origin(&client_origin)?,
            server_url: try_load("SERVER_URL", format!("http://localhost:{port}"))?,
            upload_dir: PathBuf::from(try_load::<String>(
                "UPLOAD_DIR",
                DEFAULT_UPLOAD_DIR.to_string(),
            )?),
            rate_limit_window: Duration::from_secs(try_load(
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            rate_limit_max: try_load("RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
            trust_proxy: try_load("TRUST_PROXY", false)?,
            mail_from: try_load("MAIL_FROM", DEFAULT_MAIL_FROM.to_string())?,
            mail_relay_url: optional("MAIL_RELAY_URL"),
            mail_timeout: Duration::from_secs(try_load(
                "MAIL_TIMEOUT_SECS",
                DEFAULT_MAIL_TIMEOUT_SECS,
            )?),
        })
    }

    /// Defaults for everything but the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            redis_url: None,
            jwt_secret: jwt_secret.into(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            client_origin: HeaderValue::from_static(DEFAULT_CLIENT_ORIGIN),
            server_url: format!("http://localhost:{DEFAULT_PORT}"),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            trust_proxy: false,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            mail_relay_url: None,
            mail_timeout: Duration::from_secs(DEFAULT_MAIL_TIMEOUT_SECS),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set");
    }

    value
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

// Docker secrets first, plain environment second.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()),
        Err(e) => {
            info!("Failed to read {secret_name} from file: {e}, falling back to environment");
            var(secret_name).map(|secret| secret.trim().to_string())
        }
    }
}

fn parse_origin(origin: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
        key: "CLIENT_ORIGIN",
        reason: e.to_string(),
    })
}
