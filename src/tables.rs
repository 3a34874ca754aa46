//! Routing-tables composer
//!
//! Orchestrates one routing table per source ledger: derives transitive
//! routes from local pairs and announcements, tracks the table epoch, and
//! expires or invalidates stale routes.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Result, RoutingError};
use crate::models::{DestinationHop, RouteData, SourceHop};
use crate::prefix_map::PrefixMap;
use crate::route::Route;
use crate::routing_table::RoutingTable;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Next-hop key marking a locally configured ledger pair, distinguishing it
/// from derived routes that happen to share endpoints.
pub const PAIR: &str = "PAIR";

/// Composer over per-source routing tables.
#[derive(Debug, Clone)]
pub struct RoutingTables {
    sources: PrefixMap<RoutingTable>,
    local_accounts: HashMap<String, String>,
    current_epoch: u64,
    expiry_duration_ms: Option<i64>,
    max_derivation_depth: usize,
    clock: Arc<dyn Clock>,
}

impl RoutingTables {
    /// Create empty tables from configuration, using the system clock.
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create empty tables with an injected clock.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: PrefixMap::new(),
            local_accounts: HashMap::new(),
            current_epoch: 0,
            expiry_duration_ms: Some(config.routing.expiry_duration_ms),
            max_derivation_depth: config.routing.max_derivation_depth,
            clock,
        }
    }

    /// Epoch counter, incremented on every route insertion the tables did
    /// not already know.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// The per-source tables, keyed by source ledger prefix.
    pub fn sources(&self) -> &PrefixMap<RoutingTable> {
        &self.sources
    }

    /// Register locally configured pair routes, then derive transitive
    /// routes from them. Parses every record before mutating anything.
    pub fn add_local_routes(&mut self, local_routes: Vec<RouteData>) -> Result<()> {
        let mut routes = Vec::with_capacity(local_routes.len());
        for data in local_routes {
            let mut route = Route::from_data(data)?;
            route.is_local = true;
            routes.push(route);
        }

        for route in &routes {
            if self.sources.get(&route.source_ledger).is_none() {
                self.sources
                    .insert(route.source_ledger.clone(), RoutingTable::new());
            }
            if let Some(table) = self.sources.get_mut(&route.source_ledger) {
                table.add_route(&route.destination_ledger, PAIR, route.clone());
            }
            if let Some(account) = &route.source_account {
                self.local_accounts
                    .insert(route.source_ledger.clone(), account.clone());
            }
            if let Some(account) = &route.destination_account {
                self.local_accounts
                    .insert(route.destination_ledger.clone(), account.clone());
            }
            info!(
                source = %route.source_ledger,
                destination = %route.destination_ledger,
                "added local pair route"
            );
        }

        for route in &routes {
            self.add_route(route);
        }
        Ok(())
    }

    /// Add an announced route, deriving transitive routes from every known
    /// source. Returns true and advances the epoch iff any table gained a
    /// route it did not already hold.
    pub fn add_route(&mut self, route: &Route) -> bool {
        self.add_route_at_depth(route, 0)
    }

    fn add_route_at_depth(&mut self, route: &Route, depth: usize) -> bool {
        if depth > self.max_derivation_depth {
            warn!(
                source = %route.source_ledger,
                destination = %route.destination_ledger,
                depth,
                "derivation depth guard hit, not propagating"
            );
            return false;
        }
        let source_ledgers: Vec<String> = self.sources.keys().map(str::to_string).collect();
        let mut added = false;
        for ledger_a in &source_ledgers {
            added |= self.add_route_from_source(ledger_a, route, depth);
        }
        if added {
            self.current_epoch += 1;
        }
        added
    }

    /// Derive A→C from the local pair A→B and the announced route B→C.
    fn add_route_from_source(&mut self, ledger_a: &str, route_b_to_c: &Route, depth: usize) -> bool {
        let ledger_b = route_b_to_c.source_ledger.clone();
        let ledger_c = route_b_to_c.target_prefix.clone();
        let connector = match &route_b_to_c.source_account {
            Some(account) => account.clone(),
            None => {
                debug!(source = %ledger_b, "announcement carries no source account, skipping");
                return false;
            }
        };

        // A direct local pair beats a locally derived detour.
        if route_b_to_c.is_local && self.local_pair_route(ledger_a, &ledger_c).is_some() {
            return false;
        }
        // Only derive across a locally configured first leg.
        let route_a_to_b = match self.local_pair_route(ledger_a, &ledger_b) {
            Some(route) => route.clone(),
            None => return false,
        };

        let now = self.clock.now();
        let mut route_a_to_c =
            match route_a_to_b.join(route_b_to_c, self.expiry_duration_ms, self.current_epoch, now)
            {
                Some(route) => route,
                None => return false,
            };

        let is_new = self.route_at(ledger_a, &ledger_c, &connector).is_none();
        if is_new {
            route_a_to_c.added_during_epoch += 1;
        }
        if let Some(table) = self.sources.get_mut(ledger_a) {
            table.add_route(&ledger_c, &connector, route_a_to_c.clone());
        }
        debug!(
            source = %ledger_a,
            destination = %ledger_c,
            connector = %connector,
            is_new,
            "derived transitive route"
        );
        if is_new {
            self.add_route_at_depth(&route_a_to_c, depth + 1);
        }
        is_new
    }

    /// The locally configured pair route from `source` to `destination`.
    pub fn local_pair_route(&self, source: &str, destination: &str) -> Option<&Route> {
        self.route_at(source, destination, PAIR)
    }

    fn route_at(&self, source: &str, destination: &str, next_hop: &str) -> Option<&Route> {
        self.sources
            .get(source)?
            .destinations
            .get(destination)?
            .get(next_hop)
    }

    fn collect_routes<F>(&self, mut keep: F) -> Vec<(String, String, String)>
    where
        F: FnMut(&Route, &str, &str, &str) -> bool,
    {
        let mut found = Vec::new();
        for (source, table) in self.sources.iter() {
            for (destination, routes) in table.destinations.iter() {
                for (next_hop, route) in routes {
                    if keep(route, source, destination, next_hop) {
                        found.push((
                            source.to_string(),
                            destination.to_string(),
                            next_hop.to_string(),
                        ));
                    }
                }
            }
        }
        found
    }

    fn remove_routes(&mut self, victims: Vec<(String, String, String)>) -> Vec<String> {
        let mut lost = Vec::new();
        for (source, destination, next_hop) in victims {
            if let Some(table) = self.sources.get_mut(&source) {
                if table.remove_route(&destination, &next_hop) {
                    lost.push(destination);
                }
            }
        }
        lost.sort();
        lost.dedup();
        lost
    }

    /// Remove every route into or out of `ledger`.
    pub fn remove_ledger(&mut self, ledger: &str) {
        let victims = self.collect_routes(|_, source, destination, _| {
            source == ledger || destination == ledger
        });
        let lost = self.remove_routes(victims);
        info!(%ledger, lost = lost.len(), "removed ledger routes");
    }

    /// Drop every expired route; returns the destination prefixes that
    /// lost at least one route.
    pub fn remove_expired_routes(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let victims = self.collect_routes(|route, _, _, _| route.is_expired(now));
        let lost = self.remove_routes(victims);
        if !lost.is_empty() {
            info!(lost = lost.len(), "expired routes removed");
        }
        lost
    }

    /// Refresh the hold-down timer on every route announced by `connector`.
    /// Static routes are untouched.
    pub fn bump_connector(&mut self, connector: &str, hold_down_ms: i64) {
        let now = self.clock.now();
        for (_, table) in self.sources.iter_mut() {
            for (_, routes) in table.destinations.iter_mut() {
                if let Some(route) = routes.get_mut(connector) {
                    route.bump_expiration(now, hold_down_ms);
                }
            }
        }
    }

    /// Remove every non-static route announced by `connector`; returns the
    /// destination prefixes that lost at least one route.
    pub fn invalidate_connector(&mut self, connector: &str) -> Vec<String> {
        let victims = self.collect_routes(|route, _, _, next_hop| {
            next_hop == connector && route.expires_at.is_some()
        });
        let lost = self.remove_routes(victims);
        info!(%connector, lost = lost.len(), "invalidated connector routes");
        lost
    }

    /// Remove every non-static route announced by `connector` into
    /// `ledger`; returns the destination prefixes that lost at least one
    /// route.
    pub fn invalidate_connectors_routes_to(&mut self, connector: &str, ledger: &str) -> Vec<String> {
        let victims = self.collect_routes(|route, _, _, next_hop| {
            next_hop == connector
                && route.expires_at.is_some()
                && route.destination_ledger == ledger
        });
        self.remove_routes(victims)
    }

    /// Best next hop for sending `source_amount` from somewhere under
    /// `source_address` toward `final_address`.
    pub fn find_best_hop_for_source_amount(
        &self,
        source_address: &str,
        final_address: &str,
        source_amount: Decimal,
    ) -> Option<SourceHop> {
        let table = self.sources.resolve(source_address)?;
        let mut hop = table.find_best_hop_for_source_amount(final_address, source_amount)?;
        hop.best_hop = self.rewrite_local_hop(hop.best_hop, &hop.best_route);
        Some(hop)
    }

    /// Cheapest next hop able to deliver `destination_amount` from
    /// somewhere under `source_address` toward `final_address`.
    pub fn find_best_hop_for_destination_amount(
        &self,
        source_address: &str,
        final_address: &str,
        destination_amount: Decimal,
    ) -> Option<DestinationHop> {
        let table = self.sources.resolve(source_address)?;
        let mut hop = table.find_best_hop_for_destination_amount(final_address, destination_amount)?;
        hop.best_hop = self.rewrite_local_hop(hop.best_hop, &hop.best_route);
        Some(hop)
    }

    /// A winning local pair is reported as the local account on its
    /// destination ledger rather than the internal sentinel.
    fn rewrite_local_hop(&self, best_hop: String, route: &Route) -> String {
        if best_hop != PAIR {
            return best_hop;
        }
        match self.local_accounts.get(&route.destination_ledger) {
            Some(account) => account.clone(),
            None => {
                warn!(
                    destination = %route.destination_ledger,
                    "no local account recorded for pair route"
                );
                best_hop
            }
        }
    }

    /// Serialize the combined tables for broadcast: one record per
    /// (source, destination), with all connectors collapsed by parallel
    /// combine and the curve reduced to at most `max_points` break-points.
    pub fn to_data(&self, max_points: usize) -> Result<Vec<RouteData>> {
        if max_points < 2 {
            return Err(RoutingError::invalid_curve(format!(
                "broadcast requires room for both endpoints, got max_points={}",
                max_points
            )));
        }
        let mut records = Vec::new();
        for (source_ledger, table) in self.sources.iter() {
            for (_, routes) in table.destinations.iter() {
                let mut combined: Option<Route> = None;
                for route in routes.values() {
                    combined = Some(match combined {
                        Some(current) => current.combine(route),
                        None => route.clone(),
                    });
                }
                let combined = match combined {
                    Some(combined) => combined,
                    None => continue,
                };
                let mut data = combined.simplify(max_points)?.to_data();
                data.source_account = self.local_accounts.get(source_ledger).cloned();
                records.push(data);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn data(
        source: &str,
        destination: &str,
        source_account: &str,
        destination_account: Option<&str>,
        points: &[[&str; 2]],
    ) -> RouteData {
        RouteData {
            source_ledger: source.to_string(),
            destination_ledger: destination.to_string(),
            source_account: Some(source_account.to_string()),
            destination_account: destination_account.map(str::to_string),
            points: points
                .iter()
                .map(|pair| [pair[0].to_string(), pair[1].to_string()])
                .collect(),
            min_message_window: 1.0,
            expires_at: None,
            added_during_epoch: None,
            hops: None,
            target_prefix: None,
        }
    }

    fn tables_with_pairs() -> (RoutingTables, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2015, 6, 16, 0, 0, 0).unwrap(),
        ));
        let mut tables = RoutingTables::with_clock(&Config::default(), clock.clone());
        tables
            .add_local_routes(vec![
                data("a.", "b.", "a.mark", Some("b.mark"), &[["0", "0"], ["100", "50"]]),
                data("b.", "c.", "b.mark", Some("c.mark"), &[["0", "0"], ["50", "40"]]),
            ])
            .unwrap();
        (tables, clock)
    }

    fn connie_route() -> Route {
        Route::from_data(data(
            "c.",
            "d.",
            "c.connie",
            None,
            &[["0", "0"], ["40", "30"]],
        ))
        .unwrap()
    }

    #[test_log::test]
    fn test_transitive_derivation() {
        let (mut tables, _clock) = tables_with_pairs();
        let epoch_before = tables.current_epoch();

        assert!(tables.add_route(&connie_route()));

        // The announcement reached b. directly and a. through the recursive
        // propagation, advancing the epoch once for each.
        assert_eq!(tables.current_epoch(), epoch_before + 2);

        let hop = tables
            .find_best_hop_for_source_amount("a.", "d.carl", dec!(100))
            .unwrap();
        assert_eq!(hop.best_hop, "c.connie");
        assert_eq!(hop.best_value, dec!(30));
        assert_eq!(hop.best_route.path_length(), 3);
        assert_eq!(hop.best_route.min_message_window, 3.0);
    }

    #[test]
    fn test_derivation_preserves_local_pairs() {
        let (mut tables, _clock) = tables_with_pairs();
        let pair_before = tables.local_pair_route("a.", "b.").cloned().unwrap();

        tables.add_route(&connie_route());

        let pair_after = tables.local_pair_route("a.", "b.").unwrap();
        assert_eq!(pair_after, &pair_before);
        assert!(pair_after.is_local);
    }

    #[test]
    fn test_novelty_bumps_added_during_epoch() {
        let (tables, _clock) = tables_with_pairs();
        // After the local pass the derived a.→c. was inserted at epoch 0 and
        // bumped by one to mark novelty.
        let derived = tables
            .sources()
            .get("a.")
            .and_then(|table| table.destinations.get("c."))
            .and_then(|routes| routes.get("b.mark"))
            .unwrap();
        assert_eq!(derived.added_during_epoch, 1);
        assert!(!derived.is_local);
    }

    #[test]
    fn test_replacement_does_not_advance_epoch() {
        let (mut tables, _clock) = tables_with_pairs();
        assert!(tables.add_route(&connie_route()));
        let epoch = tables.current_epoch();

        // Re-announcing with fresher liquidity replaces the stored routes
        // without minting a new epoch.
        let mut updated = connie_route();
        updated.curve = crate::curve::Curve::new(vec![
            crate::curve::Point::new(dec!(0), dec!(0)),
            crate::curve::Point::new(dec!(40), dec!(36)),
        ])
        .unwrap();
        assert!(!tables.add_route(&updated));
        assert_eq!(tables.current_epoch(), epoch);

        let hop = tables
            .find_best_hop_for_source_amount("b.", "d.carl", dec!(50))
            .unwrap();
        assert_eq!(hop.best_value, dec!(36));
    }

    #[test]
    fn test_unknown_source_is_absent() {
        let (tables, _clock) = tables_with_pairs();
        assert!(tables
            .find_best_hop_for_source_amount("z.", "b.", dec!(10))
            .is_none());
    }

    #[test]
    fn test_pair_hop_rewritten_to_local_account() {
        let (tables, _clock) = tables_with_pairs();
        let hop = tables
            .find_best_hop_for_source_amount("a.", "b.carl", dec!(10))
            .unwrap();
        assert_eq!(hop.best_hop, "b.mark");
        assert!(hop.best_route.is_local);

        let hop = tables
            .find_best_hop_for_destination_amount("a.", "b.carl", dec!(10))
            .unwrap();
        assert_eq!(hop.best_hop, "b.mark");
        assert_eq!(hop.best_cost, dec!(20));
    }

    #[test]
    fn test_remove_expired_routes() {
        let (mut tables, clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        // Derived routes carry the configured hold-down; local pairs are
        // static and survive the sweep.
        clock.advance(Duration::milliseconds(45_001));
        let lost = tables.remove_expired_routes();
        assert!(lost.contains(&"d.".to_string()));
        assert!(tables.local_pair_route("a.", "b.").is_some());
        assert!(tables
            .find_best_hop_for_source_amount("a.", "d.carl", dec!(10))
            .is_none());
    }

    #[test]
    fn test_bump_connector_extends_hold_down() {
        let (mut tables, clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        clock.advance(Duration::milliseconds(40_000));
        tables.bump_connector("c.connie", 60_000);
        clock.advance(Duration::milliseconds(30_000));

        tables.remove_expired_routes();
        assert!(tables
            .find_best_hop_for_source_amount("a.", "d.carl", dec!(10))
            .is_some());
        // The a.→c. route was not bumped and lapsed.
        assert!(tables
            .find_best_hop_for_source_amount("a.", "c.carl", dec!(10))
            .is_none());
    }

    #[test]
    fn test_invalidate_connector() {
        let (mut tables, _clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        let lost = tables.invalidate_connector("c.connie");
        assert!(lost.contains(&"d.".to_string()));
        assert!(tables
            .find_best_hop_for_source_amount("a.", "d.carl", dec!(10))
            .is_none());
        // Other connectors' routes survive.
        assert!(tables
            .find_best_hop_for_source_amount("a.", "c.carl", dec!(10))
            .is_some());
    }

    #[test]
    fn test_invalidate_connectors_routes_to() {
        let (mut tables, _clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        let lost = tables.invalidate_connectors_routes_to("c.connie", "d.");
        assert_eq!(lost, vec!["d.".to_string()]);
        assert!(tables
            .find_best_hop_for_source_amount("b.", "d.carl", dec!(10))
            .is_none());
    }

    #[test]
    fn test_remove_ledger() {
        let (mut tables, _clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        tables.remove_ledger("c.");
        assert!(tables.local_pair_route("b.", "c.").is_none());
        assert!(tables
            .find_best_hop_for_source_amount("a.", "c.carl", dec!(10))
            .is_none());
        assert!(tables
            .find_best_hop_for_source_amount("a.", "b.carl", dec!(10))
            .is_some());
    }

    #[test]
    fn test_to_data_combines_connectors() {
        let (mut tables, _clock) = tables_with_pairs();

        // A second connector offers better liquidity to c. for small
        // amounts; the broadcast form merges both under one record.
        let rival = Route::from_data(data(
            "b.",
            "c.",
            "b.rival",
            None,
            &[["0", "0"], ["10", "35"]],
        ))
        .unwrap();
        tables.add_route(&rival);

        let records = tables.to_data(10).unwrap();
        let merged = records
            .iter()
            .find(|record| record.source_ledger == "a." && record.destination_ledger == "c.")
            .unwrap();
        assert_eq!(merged.source_account, Some("a.mark".to_string()));

        let route = Route::from_data(merged.clone()).unwrap();
        // The rival dominates small amounts, the original large ones.
        assert_eq!(route.amount_at(dec!(20)), dec!(35));
        assert_eq!(route.amount_at(dec!(100)), dec!(40));
    }

    #[test]
    fn test_to_data_rejects_too_few_points() {
        let (tables, _clock) = tables_with_pairs();
        assert!(tables.to_data(1).is_err());
    }

    #[test]
    fn test_to_data_simplifies_curves() {
        let (mut tables, _clock) = tables_with_pairs();
        tables.add_route(&connie_route());

        for record in tables.to_data(2).unwrap() {
            assert!(record.points.len() <= 2);
        }
    }
}
