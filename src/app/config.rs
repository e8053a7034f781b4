//! Runtime configuration read from the environment.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use chrono::Duration;
use secrecy::SecretString;

use crate::domain::ConfigError;

const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
const DEFAULT_UPLOAD_DIR: &str = "images";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub token_ttl: Duration,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` or `JWT_SECRET` is missing, or any value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let ttl_secs: i64 = parse_or(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: SecretString::from(required("JWT_SECRET")?),
            token_ttl: Duration::seconds(ttl_secs),
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?,
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            rate_limit_rps: parse_or(&lookup, "RATE_LIMIT_RPS", 10)?,
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", 20)?,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/crowdfund"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ]))
        .unwrap();

        assert_eq!(config.token_ttl, Duration::hours(24));
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.upload_dir, PathBuf::from("images"));
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.rate_limit_rps, 10);
        assert_eq!(config.rate_limit_burst, 20);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.jwt_secret.expose_secret(),
            "0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn test_overrides_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/crowdfund"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("TOKEN_TTL_SECS", "600"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("UPLOAD_DIR", "/var/uploads"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.token_ttl, Duration::minutes(10));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.upload_dir, PathBuf::from("/var/uploads"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let result = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/x")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(key)) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_unparseable_value_is_reported() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/x"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("RATE_LIMIT_RPS", "fast"),
        ]));
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "RATE_LIMIT_RPS")
        );
    }
}
