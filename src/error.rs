//! Error types for the routing engine

use thiserror::Error;

/// Result type alias for the routing engine
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Main error type for the routing engine
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RoutingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_curve(msg: impl Into<String>) -> Self {
        Self::InvalidCurve(msg.into())
    }

    pub fn invalid_route(msg: impl Into<String>) -> Self {
        Self::InvalidRoute(msg.into())
    }
}
