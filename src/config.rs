// Runtime configuration from the environment (and an optional .env file)

use crate::aggregator::TimeRange;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "LANCAMENTOS_DB";
pub const BIND_ADDR_VAR: &str = "LANCAMENTOS_ADDR";
pub const RANGE_VAR: &str = "LANCAMENTOS_RANGE";

const DEFAULT_DB_PATH: &str = "lancamentos.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub default_range: TimeRange,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_range: TimeRange::default(),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(DB_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup(BIND_ADDR_VAR).filter(|v| !v.trim().is_empty()) {
            if !addr.contains(':') {
                return Err(anyhow!("{} must be host:port, got '{}'", BIND_ADDR_VAR, addr));
            }
            config.bind_addr = addr;
        }

        if let Some(range) = lookup(RANGE_VAR).filter(|v| !v.trim().is_empty()) {
            config.default_range = range
                .parse()
                .map_err(|e: String| anyhow!("{}: {}", RANGE_VAR, e))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_range, TimeRange::Last180Days);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (DB_PATH_VAR, "/tmp/entries.db"),
            (BIND_ADDR_VAR, "127.0.0.1:8080"),
            (RANGE_VAR, "30d"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/entries.db"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.default_range, TimeRange::Last30Days);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[(RANGE_VAR, "2w")])).is_err());
        assert!(Config::from_lookup(lookup(&[(BIND_ADDR_VAR, "localhost")])).is_err());
    }
}
