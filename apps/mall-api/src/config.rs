//! Mall API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::str::FromStr;

/// Secret used when `JWT_SECRET` is not set. Development only.
pub const DEV_JWT_SECRET: &str = "online-mall-dev-secret-change-in-production";

/// Mall API configuration.
#[derive(Debug, Clone)]
pub struct MallConfig {
    /// HTTP bind address
    pub listen_addr: String,

    /// SQLite connection string
    pub database_url: String,

    /// Pool size
    pub database_max_connections: u32,

    /// Redis connection string (optional)
    pub redis_url: Option<String>,

    /// Prefix for every cache key
    pub cache_prefix: String,

    /// Cache entry lifetime in seconds
    pub cache_ttl_secs: u64,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// Token lifetime in hours
    pub jwt_expire_hours: i64,

    /// `iss` claim
    pub jwt_issuer: String,

    /// Requests per client IP per minute; 0 disables limiting
    pub rate_limit_per_minute: u32,

    /// Permissive CORS for the storefront
    pub cors_allow_any: bool,
}

impl Default for MallConfig {
    fn default() -> Self {
        MallConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://mall.db".to_string(),
            database_max_connections: 5,
            redis_url: None,
            cache_prefix: "online-mall:".to_string(),
            cache_ttl_secs: 3600,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expire_hours: 24,
            jwt_issuer: "online-mall".to_string(),
            rate_limit_per_minute: 100,
            cors_allow_any: true,
        }
    }
}

impl MallConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = MallConfig::default();

        let config = MallConfig {
            listen_addr: env::var("MALL_LISTEN_ADDR").unwrap_or(defaults.listen_addr),

            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),

            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,

            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),

            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),

            cache_ttl_secs: parse_var("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,

            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),

            jwt_expire_hours: parse_var("JWT_EXPIRE_HOURS", defaults.jwt_expire_hours)?,

            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),

            rate_limit_per_minute: parse_var(
                "RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            )?,

            cors_allow_any: parse_var("CORS_ALLOW_ANY", defaults.cors_allow_any)?,
        };

        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if config.jwt_expire_hours <= 0 {
            return Err(ConfigError::InvalidValue("JWT_EXPIRE_HOURS".to_string()));
        }
        if config.database_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// True when the built-in development secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MallConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.jwt_expire_hours, 24);
        assert_eq!(config.rate_limit_per_minute, 100);
        assert!(config.redis_url.is_none());
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let value: u32 = parse_var("MALL_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
