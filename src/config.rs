//! Configuration management for the routing engine

use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::env;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Routing table behavior
    pub routing: RoutingConfig,
    /// Broadcast serialization settings
    pub broadcast: BroadcastConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Routing table behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Default hold-down for derived routes, in milliseconds
    pub expiry_duration_ms: i64,
    /// Upper bound on transitive derivation recursion
    pub max_derivation_depth: usize,
}

/// Broadcast serialization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Maximum curve break-points per broadcast record
    pub max_points: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Log output format (json, plain)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routing: RoutingConfig {
                expiry_duration_ms: 45_000, // 45 seconds
                max_derivation_depth: 10,
            },
            broadcast: BroadcastConfig { max_points: 10 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "plain".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Routing configuration
        if let Ok(value) = env::var("ROUTE_EXPIRY_MS") {
            config.routing.expiry_duration_ms = value
                .parse()
                .map_err(|_| RoutingError::config("Invalid ROUTE_EXPIRY_MS value"))?;
        }
        if let Ok(value) = env::var("ROUTE_MAX_DERIVATION_DEPTH") {
            config.routing.max_derivation_depth = value
                .parse()
                .map_err(|_| RoutingError::config("Invalid ROUTE_MAX_DERIVATION_DEPTH value"))?;
        }

        // Broadcast configuration
        if let Ok(value) = env::var("BROADCAST_MAX_POINTS") {
            config.broadcast.max_points = value
                .parse()
                .map_err(|_| RoutingError::config("Invalid BROADCAST_MAX_POINTS value"))?;
        }

        // Logging configuration
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RoutingError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RoutingError::config(format!("Failed to parse config file: {}", e)))
    }
}
