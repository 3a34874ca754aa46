//! Interledger-style payment routing core
//!
//! Maintains, per source ledger, a table of liquidity-curve routes to
//! destination ledgers and answers two queries: the best next hop and
//! resulting destination amount for a source amount, and the cheapest next
//! hop and required source amount for a destination amount. Newly announced
//! routes are composed with locally configured pairs into transitive
//! routes; stale routes expire; the combined table serializes for
//! broadcast.

pub mod clock;
pub mod config;
pub mod curve;
pub mod error;
pub mod models;
pub mod prefix_map;
pub mod route;
pub mod routing_table;
pub mod tables;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use curve::{Curve, Point};
pub use error::{Result, RoutingError};
pub use models::{DestinationHop, RouteData, SourceHop};
pub use prefix_map::PrefixMap;
pub use route::Route;
pub use routing_table::RoutingTable;
pub use tables::{RoutingTables, PAIR};

/// Initialize routing tables with configuration from the environment
pub fn init() -> Result<RoutingTables> {
    let config = Config::from_env()?;
    Ok(RoutingTables::new(&config))
}

/// Initialize the tracing subscriber from logging configuration
pub fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .map_err(|e| RoutingError::config(format!("Invalid log level: {}", e)))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let initialized = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    initialized.map_err(|e| RoutingError::config(format!("Failed to install subscriber: {}", e)))
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
