use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{AuthConfig, DEFAULT_TOKEN_TTL, decode_secret_key};
use crate::core::{DEFAULT_GOAL, DEFAULT_MAX_MONTHS};

pub const ENV_LISTEN_ADDR: &str = "FM_LISTEN_ADDR";
pub const ENV_JWT_SECRET: &str = "FM_JWT_SECRET";
pub const ENV_TOKEN_TTL_HOURS: &str = "FM_TOKEN_TTL_HOURS";
pub const ENV_GOAL: &str = "FM_GOAL";
pub const ENV_MAX_MONTHS: &str = "FM_MAX_MONTHS";
pub const ENV_DATABASE_URL: &str = "FM_DATABASE_URL";

/// One year.
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub auth: AuthConfig,
    pub goal: f64,
    pub max_months: u32,
    /// SQLite file path. Without one, records live in memory only.
    pub database_url: Option<String>,
}

impl Config {
    /// Reads the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup(ENV_LISTEN_ADDR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid(ENV_LISTEN_ADDR, e))?;

        let raw_secret = lookup(ENV_JWT_SECRET).ok_or(ConfigError::Missing(ENV_JWT_SECRET))?;
        let jwt_secret = decode_secret_key(&raw_secret).map_err(|e| invalid(ENV_JWT_SECRET, e))?;

        let token_ttl = match lookup(ENV_TOKEN_TTL_HOURS) {
            Some(raw) => {
                let hours = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| invalid(ENV_TOKEN_TTL_HOURS, e))?;
                if hours == 0 || hours > MAX_TOKEN_TTL_HOURS {
                    return Err(invalid(
                        ENV_TOKEN_TTL_HOURS,
                        format!("must be between 1 and {MAX_TOKEN_TTL_HOURS}"),
                    ));
                }
                Duration::from_secs(hours * 60 * 60)
            }
            None => DEFAULT_TOKEN_TTL,
        };

        let goal = match lookup(ENV_GOAL) {
            Some(raw) => {
                let goal = raw.trim().parse::<f64>().map_err(|e| invalid(ENV_GOAL, e))?;
                if !goal.is_finite() || goal <= 0.0 {
                    return Err(invalid(ENV_GOAL, "must be a positive number"));
                }
                goal
            }
            None => DEFAULT_GOAL,
        };

        let max_months = match lookup(ENV_MAX_MONTHS) {
            Some(raw) => {
                let months = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| invalid(ENV_MAX_MONTHS, e))?;
                if months == 0 {
                    return Err(invalid(ENV_MAX_MONTHS, "must be > 0"));
                }
                months
            }
            None => DEFAULT_MAX_MONTHS,
        };

        let database_url = lookup(ENV_DATABASE_URL)
            .map(|raw| raw.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            listen_addr,
            auth: AuthConfig {
                jwt_secret,
                token_ttl,
            },
            goal,
            max_months,
            database_url,
        })
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
