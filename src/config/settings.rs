//! Process settings read from the environment (after `.env` is loaded by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(ConfigError::Settings(format!(
                "invalid APP_ENV: {} (expected development, production or test)",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub jwt_secret: String,
    /// JSON registration list; the compiled-in catalog is used when unset.
    pub resources_path: Option<PathBuf>,
    pub max_connections: u32,
    pub body_limit: usize,
    pub auto_migrate: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| ConfigError::Settings("DATABASE_URL is required".into()))?;
        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| ConfigError::Settings("JWT_SECRET is required".into()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Settings(format!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            )));
        }
        let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let environment = match get("APP_ENV") {
            Some(v) => v.parse()?,
            None => Environment::Development,
        };
        let max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5u32)?;
        let body_limit = parse_or(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", 1024 * 1024usize)?;
        let auto_migrate = parse_or(get("AUTO_MIGRATE"), "AUTO_MIGRATE", false)?;

        Ok(Settings {
            database_url,
            bind_addr,
            environment,
            jwt_secret,
            resources_path: get("RESOURCES_PATH").map(PathBuf::from),
            max_connections,
            body_limit,
            auto_migrate,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Settings(format!("invalid {}: {}", key, v))),
        None => Ok(default),
    }
}
