//! External data models for route announcements and query results

use crate::route::Route;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Route announcement in external (broadcast) form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteData {
    /// Ledger the route starts from
    pub source_ledger: String,
    /// Ledger the route ultimately reaches
    pub destination_ledger: String,
    /// Account of the connector announcing the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    /// Account on the destination ledger, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    /// Liquidity curve break-points as `[x, y]` decimal-string pairs
    pub points: Vec<[String; 2]>,
    /// Sum of per-hop message windows
    #[serde(default)]
    pub min_message_window: f64,
    /// Absolute expiry timestamp; absent for static routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Epoch counter value at insertion (populated on output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_during_epoch: Option<u64>,
    /// Ledgers traversed, in order; accepts the legacy `paths` key
    #[serde(default, alias = "paths", skip_serializing_if = "Option::is_none")]
    pub hops: Option<Vec<String>>,
    /// Destination-matching prefix; defaults to `destination_ledger`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_prefix: Option<String>,
}

/// Best next hop for a given source amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHop {
    /// Connector (or local account) to forward to
    pub best_hop: String,
    /// Destination amount obtained for the queried source amount
    #[serde(with = "rust_decimal::serde::str")]
    pub best_value: Decimal,
    /// The winning route
    pub best_route: Route,
}

/// Cheapest next hop able to deliver a given destination amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationHop {
    /// Connector (or local account) to forward to
    pub best_hop: String,
    /// Source amount required for the queried destination amount
    #[serde(with = "rust_decimal::serde::str")]
    pub best_cost: Decimal,
    /// The winning route
    pub best_route: Route,
}
