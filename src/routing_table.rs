//! Per-source routing table with best-hop selection

use crate::models::{DestinationHop, SourceHop};
use crate::prefix_map::PrefixMap;
use crate::route::Route;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Candidate metric: destination value for a source amount (higher is
/// better) or source cost for a destination amount (lower is better).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Metric {
    Value(Decimal),
    Cost(Decimal),
    None,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub next_hop: &'a str,
    pub route: &'a Route,
    pub path_length: usize,
    pub metric: Metric,
}

/// Pick the better of two candidate paths.
///
/// A defined value beats an undefined one (likewise for cost); then higher
/// value or lower cost wins; ties fall back to the shorter path; a full tie
/// keeps `current`.
pub(crate) fn better_path<'a>(current: Candidate<'a>, other: Candidate<'a>) -> Candidate<'a> {
    match (current.metric, other.metric) {
        (Metric::Value(cur), Metric::Value(new)) => {
            if new > cur || (new == cur && other.path_length < current.path_length) {
                other
            } else {
                current
            }
        }
        (Metric::Cost(cur), Metric::Cost(new)) => {
            if new < cur || (new == cur && other.path_length < current.path_length) {
                other
            } else {
                current
            }
        }
        (Metric::None, Metric::Value(_)) | (Metric::None, Metric::Cost(_)) => other,
        (Metric::Value(_), Metric::None) | (Metric::Cost(_), Metric::None) => current,
        (Metric::Value(_), Metric::Cost(_)) => current,
        (Metric::Cost(_), Metric::Value(_)) => other,
        (Metric::None, Metric::None) => {
            if other.path_length < current.path_length {
                other
            } else {
                current
            }
        }
    }
}

/// Routes out of a single source ledger, keyed by destination prefix and,
/// under each destination, by next hop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    /// Destination prefix to an ordered map of next hop to route
    pub destinations: PrefixMap<BTreeMap<String, Route>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route under (destination prefix, next hop), creating the
    /// inner map when absent.
    pub fn add_route(&mut self, destination: &str, next_hop: &str, route: Route) {
        match self.destinations.get_mut(destination) {
            Some(routes) => {
                routes.insert(next_hop.to_string(), route);
            }
            None => {
                let mut routes = BTreeMap::new();
                routes.insert(next_hop.to_string(), route);
                self.destinations.insert(destination, routes);
            }
        }
    }

    /// Remove the route under (destination prefix, next hop). Returns true
    /// iff something was actually removed; drops the inner map when it
    /// empties.
    pub fn remove_route(&mut self, destination: &str, next_hop: &str) -> bool {
        let (removed, now_empty) = match self.destinations.get_mut(destination) {
            Some(routes) => (routes.remove(next_hop).is_some(), routes.is_empty()),
            None => return false,
        };
        if now_empty {
            self.destinations.remove(destination);
        }
        removed
    }

    /// Best next hop for sending `source_amount` toward `final_address`:
    /// the candidate yielding the highest destination amount, shorter paths
    /// breaking ties.
    pub fn find_best_hop_for_source_amount(
        &self,
        final_address: &str,
        source_amount: Decimal,
    ) -> Option<SourceHop> {
        let routes = self.destinations.resolve(final_address)?;
        let mut best: Option<Candidate<'_>> = None;
        for (next_hop, route) in routes {
            let candidate = Candidate {
                next_hop: next_hop.as_str(),
                route,
                path_length: route.path_length(),
                metric: Metric::Value(route.amount_at(source_amount)),
            };
            best = Some(match best {
                Some(current) => better_path(current, candidate),
                None => candidate,
            });
        }
        best.map(|candidate| SourceHop {
            best_hop: candidate.next_hop.to_string(),
            best_value: candidate.route.amount_at(source_amount),
            best_route: candidate.route.clone(),
        })
    }

    /// Cheapest next hop able to deliver `destination_amount` toward
    /// `final_address`. Candidates that cannot reach the amount at any
    /// source amount are discarded; `None` when no candidate is feasible.
    pub fn find_best_hop_for_destination_amount(
        &self,
        final_address: &str,
        destination_amount: Decimal,
    ) -> Option<DestinationHop> {
        let routes = self.destinations.resolve(final_address)?;
        let mut best: Option<Candidate<'_>> = None;
        for (next_hop, route) in routes {
            let cost = match route.amount_reverse(destination_amount) {
                Some(cost) => cost,
                None => continue,
            };
            let candidate = Candidate {
                next_hop: next_hop.as_str(),
                route,
                path_length: route.path_length(),
                metric: Metric::Cost(cost),
            };
            best = Some(match best {
                Some(current) => better_path(current, candidate),
                None => candidate,
            });
        }
        best.and_then(|candidate| {
            let cost = candidate.route.amount_reverse(destination_amount)?;
            Some(DestinationHop {
                best_hop: candidate.next_hop.to_string(),
                best_cost: cost,
                best_route: candidate.route.clone(),
            })
        })
    }
}
