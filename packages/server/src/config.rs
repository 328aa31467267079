//! Server configuration from environment variables.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BIND_ADDR` | `127.0.0.1` | Listen address |
//! | `PORT` | `3001` | Listen port |
//! | `STORE_BACKEND` | `memory` | `memory` or `postgis` |
//! | `STORE_TIMEOUT_SECS` | `10` | Bound on a single store operation |
//! | `RATE_LIMIT_MAX` | `3` | Admitted submissions per source per window |
//! | `RATE_LIMIT_WINDOW_SECS` | `3600` | Rate limit window length |
//! | `TRUST_FORWARDED_FOR` | `false` | Key rate limits on `X-Forwarded-For` |
//! | `UPLOAD_BACKEND` | `local` | `local`, `r2` or `disabled` |
//! | `UPLOAD_DIR` | `data/uploads` | Directory for the `local` backend |
//!
//! `DATABASE_URL` is read by `disaster_reports_database::db` and the R2
//! credentials by `disaster_reports_upload::r2`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use disaster_reports_rate_limit::RateLimitPolicy;
use strum_macros::{Display, EnumString};

/// Where reports are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgis,
}

/// Where uploaded images are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum UploadBackend {
    Local,
    R2,
    Disabled,
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value for {name}: {value:?}")]
pub struct ConfigError {
    /// Environment variable name.
    pub name: &'static str,
    /// Rejected value.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub store_timeout: Duration,
    pub rate_limit: RateLimitPolicy,
    pub trust_forwarded_for: bool,
    pub upload_backend: UploadBackend,
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 3001,
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_secs(10),
            rate_limit: RateLimitPolicy::default(),
            trust_forwarded_for: false,
            upload_backend: UploadBackend::Local,
            upload_dir: PathBuf::from("data/uploads"),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a value that cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a value that cannot
    /// be parsed, or a duration is set to zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            store_backend: parse_or(&lookup, "STORE_BACKEND", defaults.store_backend)?,
            store_timeout: nonzero_secs(&lookup, "STORE_TIMEOUT_SECS", defaults.store_timeout)?,
            rate_limit: RateLimitPolicy {
                max_requests: parse_or(
                    &lookup,
                    "RATE_LIMIT_MAX",
                    defaults.rate_limit.max_requests,
                )?,
                window: nonzero_secs(
                    &lookup,
                    "RATE_LIMIT_WINDOW_SECS",
                    defaults.rate_limit.window,
                )?,
            },
            trust_forwarded_for: parse_or(
                &lookup,
                "TRUST_FORWARDED_FOR",
                defaults.trust_forwarded_for,
            )?,
            upload_backend: parse_or(&lookup, "UPLOAD_BACKEND", defaults.upload_backend)?,
            upload_dir: lookup("UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| ConfigError { name, value }),
    }
}

/// A whole number of seconds. Zero is rejected: a zero rate limit window
/// expires every admission and a zero store timeout fails every call.
fn nonzero_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match parse_or(lookup, name, default.as_secs())? {
        0 => Err(ConfigError {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "8080"),
            ("STORE_BACKEND", "PostGIS"),
            ("STORE_TIMEOUT_SECS", "3"),
            ("RATE_LIMIT_MAX", "10"),
            ("RATE_LIMIT_WINDOW_SECS", "60"),
            ("TRUST_FORWARDED_FOR", "true"),
            ("UPLOAD_BACKEND", "r2"),
            ("UPLOAD_DIR", "/var/lib/uploads"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.store_backend, StoreBackend::Postgis);
        assert_eq!(cfg.store_timeout, Duration::from_secs(3));
        assert_eq!(cfg.rate_limit.max_requests, 10);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
        assert!(cfg.trust_forwarded_for);
        assert_eq!(cfg.upload_backend, UploadBackend::R2);
        assert_eq!(cfg.upload_dir, PathBuf::from("/var/lib/uploads"));
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = config(&[("STORE_BACKEND", "mongodb")]).unwrap_err();
        assert_eq!(err.name, "STORE_BACKEND");
        assert_eq!(err.value, "mongodb");
    }

    #[test]
    fn rejects_unparseable_numbers() {
        assert_eq!(config(&[("PORT", "eighty")]).unwrap_err().name, "PORT");
    }

    #[test]
    fn rejects_zero_durations() {
        let err = config(&[("RATE_LIMIT_WINDOW_SECS", "0")]).unwrap_err();
        assert_eq!(err.name, "RATE_LIMIT_WINDOW_SECS");
        assert_eq!(err.value, "0");

        let err = config(&[("STORE_TIMEOUT_SECS", " 0 ")]).unwrap_err();
        assert_eq!(err.name, "STORE_TIMEOUT_SECS");
    }
}
