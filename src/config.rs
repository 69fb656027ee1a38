//! Environment configuration.

use std::collections::HashMap;

use thiserror::Error;

use crate::identity::GatewayIdentity;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub identity_header: String,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 8083;
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(&vars, name);
        Ok(Self {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?.to_string(),
            port: parse(get("PORT"), "PORT", Self::DEFAULT_PORT)?,
            max_connections: parse(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            nats_url: get("NATS_URL").map(str::to_string),
            identity_header: get("IDENTITY_HEADER").unwrap_or(GatewayIdentity::DEFAULT_HEADER).to_string(),
        })
    }
}

fn lookup<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse<T: std::str::FromStr>(raw: Option<&str>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_vars(vars(&[("DATABASE_URL", "postgres://localhost/shop")])).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.nats_url, None);
        assert_eq!(cfg.identity_header, "x-user-id");
    }

    #[test]
    fn test_missing_and_invalid() {
        assert_eq!(Config::from_vars(vars(&[])).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        let err = Config::from_vars(vars(&[("DATABASE_URL", "postgres://x"), ("PORT", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { name: "PORT", value: "http".into() });
    }
}
