/// Configuration management for community-service
///
/// Loads configuration from environment variables.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ServiceError, ServiceResult};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Counter sharding configuration
    pub counters: CounterConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Counter sharding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    /// Shards per logical counter key unless overridden per namespace
    #[serde(default = "default_shards")]
    pub default_shards: u32,
    /// Per-namespace shard overrides for known-hot keys,
    /// e.g. {"upvote": 16, "downvote": 16}
    #[serde(default)]
    pub namespace_shards: HashMap<String, u32>,
    /// Attempts for a serializable vote transaction before giving up
    #[serde(default = "default_toggle_retries")]
    pub toggle_retries: u32,
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_shards() -> u32 {
    1
}

fn default_toggle_retries() -> u32 {
    3
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            default_shards: default_shards(),
            namespace_shards: HashMap::new(),
            toggle_retries: default_toggle_retries(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> ServiceResult<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .map_err(|_| ServiceError::Config("DATABASE_URL not set".to_string()))?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_connections),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_min_connections),
        };

        let counters = CounterConfig {
            default_shards: std::env::var("COUNTER_DEFAULT_SHARDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_shards),
            // COUNTER_NAMESPACE_SHARDS="upvote=16,downvote=16,comments=4"
            namespace_shards: std::env::var("COUNTER_NAMESPACE_SHARDS")
                .ok()
                .map(|raw| parse_namespace_shards(&raw))
                .transpose()?
                .unwrap_or_default(),
            toggle_retries: std::env::var("VOTE_TOGGLE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_toggle_retries),
        };

        Ok(Config {
            app,
            database,
            counters,
        })
    }
}

fn parse_namespace_shards(raw: &str) -> ServiceResult<HashMap<String, u32>> {
    let mut map = HashMap::new();
    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let (ns, n) = pair
            .split_once('=')
            .ok_or_else(|| ServiceError::Config(format!("bad shard override: {pair}")))?;
        let n: u32 = n
            .trim()
            .parse()
            .map_err(|_| ServiceError::Config(format!("bad shard count in: {pair}")))?;
        if n == 0 {
            return Err(ServiceError::Config(format!(
                "shard count must be >= 1 in: {pair}"
            )));
        }
        map.insert(ns.trim().to_string(), n);
    }
    Ok(map)
}
