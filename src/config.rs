use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::location::watcher::WatchOptions;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub invite_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Location sampling
    pub sample_interval_secs: u64,
    pub sample_distance_meters: f64,
    pub permission_poll_secs: u64,
    pub location_timeout_secs: u64,
    pub max_sample_age_secs: i64,

    pub role_request_cooldown_hours: i64,
    pub log_dir: String,
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://onsite.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 86_400)?, // default 1 day
            invite_token_ttl: var_or("INVITE_TOKEN_TTL", 86_400)?,

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: var_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            sample_interval_secs: var_or("SAMPLE_INTERVAL_SECS", 10)?,
            sample_distance_meters: var_or("SAMPLE_DISTANCE_METERS", 10.0)?,
            permission_poll_secs: var_or("PERMISSION_POLL_SECS", 30)?,
            location_timeout_secs: var_or("LOCATION_TIMEOUT_SECS", 15)?,
            max_sample_age_secs: var_or("MAX_SAMPLE_AGE_SECS", 120)?,

            role_request_cooldown_hours: var_or("ROLE_REQUEST_COOLDOWN_HOURS", 24)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            time_interval: Duration::from_secs(self.sample_interval_secs.max(1)),
            distance_interval_meters: self.sample_distance_meters,
            permission_poll: Duration::from_secs(self.permission_poll_secs.max(1)),
            read_timeout: self.location_timeout(),
        }
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    /// Defaults with an in-memory store, for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "memory".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 3600,
            invite_token_ttl: 3600,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            sample_interval_secs: 10,
            sample_distance_meters: 10.0,
            permission_poll_secs: 30,
            location_timeout_secs: 1,
            max_sample_age_secs: 120,
            role_request_cooldown_hours: 24,
            log_dir: "logs".to_string(),
        }
    }
}
