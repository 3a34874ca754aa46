//! Routes: liquidity curves with hop metadata

use crate::curve::{Curve, Point};
use crate::error::{Result, RoutingError};
use crate::models::RouteData;
use crate::utils::{format_decimal, parse_decimal};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A route from a source ledger to a destination ledger: a liquidity curve
/// plus the hop metadata needed to select and re-announce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteData", into = "RouteData")]
pub struct Route {
    /// Liquidity from source amount to destination amount
    pub curve: Curve,
    /// Ledgers traversed, source first
    pub hops: Vec<String>,
    /// Ledger the route starts from
    pub source_ledger: String,
    /// Immediate next ledger on the path
    pub next_ledger: String,
    /// Ledger the route ultimately reaches
    pub destination_ledger: String,
    /// Account of the connector announcing the route
    pub source_account: Option<String>,
    /// Account on the destination ledger, when known
    pub destination_account: Option<String>,
    /// Sum of per-hop message windows
    pub min_message_window: f64,
    /// Absolute expiry; `None` means static, never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Epoch counter value at insertion
    pub added_during_epoch: u64,
    /// Whether this is a locally configured pair
    pub is_local: bool,
    /// Destination-matching prefix
    pub target_prefix: String,
}

impl Route {
    /// Build a route from its external form, validating required fields and
    /// the curve invariants.
    pub fn from_data(data: RouteData) -> Result<Self> {
        Route::try_from(data)
    }

    /// The route's external form.
    pub fn to_data(&self) -> RouteData {
        RouteData::from(self.clone())
    }

    /// Number of hops traversed.
    pub fn path_length(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }

    /// Destination amount for the source amount `x`.
    pub fn amount_at(&self, x: Decimal) -> Decimal {
        self.curve.amount_at(x)
    }

    /// Source amount required for the destination amount `y`, or `None`
    /// when the route cannot deliver `y`.
    pub fn amount_reverse(&self, y: Decimal) -> Option<Decimal> {
        self.curve.amount_reverse(y)
    }

    /// Parallel composition with an alternative route to the same
    /// destination. Hops collapse to the two endpoints; consumers must not
    /// rely on hop identity of combined routes beyond serialization.
    pub fn combine(&self, alternative: &Route) -> Route {
        Route {
            curve: self.curve.combine(&alternative.curve),
            hops: vec![self.source_ledger.clone(), self.destination_ledger.clone()],
            min_message_window: self.min_message_window.max(alternative.min_message_window),
            is_local: false,
            ..self.clone()
        }
    }

    /// Serial composition with an adjacent route.
    ///
    /// `None` when the endpoints do not meet, when the path would double
    /// back through a ledger it already crossed, or when the joined curve
    /// is empty. The derived route carries the tail's announcing account
    /// and target prefix so further derivation keys off the original
    /// announcer.
    pub fn join(
        &self,
        tail: &Route,
        expiry_duration_ms: Option<i64>,
        epoch: u64,
        now: DateTime<Utc>,
    ) -> Option<Route> {
        if self.destination_ledger != tail.source_ledger {
            return None;
        }
        let shared = self.hops.iter().filter(|hop| tail.hops.contains(hop)).count();
        if shared > 1 {
            return None;
        }
        let curve = self.curve.join(&tail.curve);
        if curve.is_empty() {
            return None;
        }

        let mut hops = self.hops.clone();
        hops.extend(tail.hops.iter().skip(1).cloned());

        Some(Route {
            curve,
            hops,
            source_ledger: self.source_ledger.clone(),
            next_ledger: self.next_ledger.clone(),
            destination_ledger: tail.destination_ledger.clone(),
            source_account: tail.source_account.clone(),
            destination_account: tail.destination_account.clone(),
            min_message_window: self.min_message_window + tail.min_message_window,
            expires_at: expiry_duration_ms.map(|ms| now + Duration::milliseconds(ms)),
            added_during_epoch: epoch,
            is_local: false,
            target_prefix: tail.target_prefix.clone(),
        })
    }

    /// Whether the route's hold-down has lapsed. Static routes never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    /// Refresh the hold-down timer. No-op for static routes.
    pub fn bump_expiration(&mut self, now: DateTime<Utc>, hold_down_ms: i64) {
        if self.expires_at.is_some() {
            self.expires_at = Some(now + Duration::milliseconds(hold_down_ms));
        }
    }

    /// Shift the curve along the source axis, keeping the metadata.
    pub fn shift_x(&self, dx: Decimal) -> Route {
        Route {
            curve: self.curve.shift_x(dx),
            ..self.clone()
        }
    }

    /// Shift the curve along the destination axis, keeping the metadata.
    pub fn shift_y(&self, dy: Decimal) -> Route {
        Route {
            curve: self.curve.shift_y(dy),
            ..self.clone()
        }
    }

    /// Reduce the curve to at most `max_points` break-points.
    pub fn simplify(&self, max_points: usize) -> Result<Route> {
        Ok(Route {
            curve: self.curve.simplify(max_points)?,
            ..self.clone()
        })
    }
}

impl TryFrom<RouteData> for Route {
    type Error = RoutingError;

    fn try_from(data: RouteData) -> Result<Self> {
        if data.source_ledger.is_empty() || data.destination_ledger.is_empty() {
            return Err(RoutingError::invalid_route(
                "source_ledger and destination_ledger are required",
            ));
        }
        if data.min_message_window < 0.0 {
            return Err(RoutingError::invalid_route(
                "min_message_window must be non-negative",
            ));
        }

        let mut points = Vec::with_capacity(data.points.len());
        for pair in &data.points {
            points.push(Point::new(parse_decimal(&pair[0])?, parse_decimal(&pair[1])?));
        }
        let curve = Curve::new(points)?;

        let hops = match data.hops {
            Some(hops) if !hops.is_empty() => {
                if hops.first().map(String::as_str) != Some(data.source_ledger.as_str())
                    || hops.last().map(String::as_str) != Some(data.destination_ledger.as_str())
                {
                    return Err(RoutingError::invalid_route(format!(
                        "hops must run from {} to {}",
                        data.source_ledger, data.destination_ledger
                    )));
                }
                hops
            }
            _ => vec![data.source_ledger.clone(), data.destination_ledger.clone()],
        };
        let next_ledger = hops
            .get(1)
            .cloned()
            .unwrap_or_else(|| data.destination_ledger.clone());

        Ok(Route {
            curve,
            source_ledger: data.source_ledger,
            next_ledger,
            target_prefix: data
                .target_prefix
                .unwrap_or_else(|| data.destination_ledger.clone()),
            destination_ledger: data.destination_ledger,
            source_account: data.source_account,
            destination_account: data.destination_account,
            min_message_window: data.min_message_window,
            expires_at: data.expires_at,
            added_during_epoch: data.added_during_epoch.unwrap_or(0),
            is_local: false,
            hops,
        })
    }
}

impl From<Route> for RouteData {
    fn from(route: Route) -> Self {
        RouteData {
            source_ledger: route.source_ledger,
            destination_ledger: route.destination_ledger,
            source_account: route.source_account,
            destination_account: route.destination_account,
            points: route
                .curve
                .points()
                .iter()
                .map(|p| [format_decimal(p.x), format_decimal(p.y)])
                .collect(),
            min_message_window: route.min_message_window,
            expires_at: route.expires_at,
            added_during_epoch: Some(route.added_during_epoch),
            hops: Some(route.hops),
            target_prefix: Some(route.target_prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn data(source: &str, destination: &str, points: &[[&str; 2]]) -> RouteData {
        RouteData {
            source_ledger: source.to_string(),
            destination_ledger: destination.to_string(),
            source_account: Some(format!("{}me", source)),
            destination_account: None,
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

    fn route(source: &str, destination: &str, points: &[[&str; 2]]) -> Route {
        Route::from_data(data(source, destination, points)).unwrap()
    }

    #[test]
    fn test_from_data_defaults() {
        let route = route("a.", "b.", &[["0", "0"], ["100", "50"]]);
        assert_eq!(route.hops, vec!["a.".to_string(), "b.".to_string()]);
        assert_eq!(route.next_ledger, "b.");
        assert_eq!(route.target_prefix, "b.");
        assert_eq!(route.path_length(), 1);
        assert!(!route.is_local);
    }

    #[test]
    fn test_from_data_rejects_missing_ledgers() {
        assert!(Route::from_data(data("", "b.", &[])).is_err());
    }

    #[test]
    fn test_from_data_rejects_non_monotone_curve() {
        assert!(Route::from_data(data("a.", "b.", &[["0", "10"], ["10", "5"]])).is_err());
    }

    #[test]
    fn test_from_data_rejects_inconsistent_hops() {
        let mut bad = data("a.", "b.", &[["0", "0"], ["100", "50"]]);
        bad.hops = Some(vec!["a.".to_string(), "c.".to_string()]);
        assert!(Route::from_data(bad).is_err());
    }

    #[test]
    fn test_join_concatenates_metadata() {
        let head = route("a.", "b.", &[["0", "0"], ["200", "100"]]);
        let tail = route("b.", "c.", &[["0", "0"], ["50", "60"]]);
        let now = Utc.with_ymd_and_hms(2015, 6, 16, 0, 0, 0).unwrap();

        let joined = head.join(&tail, Some(45_000), 7, now).unwrap();
        assert_eq!(joined.source_ledger, "a.");
        assert_eq!(joined.next_ledger, "b.");
        assert_eq!(joined.destination_ledger, "c.");
        assert_eq!(
            joined.hops,
            vec!["a.".to_string(), "b.".to_string(), "c.".to_string()]
        );
        assert_eq!(joined.path_length(), 2);
        assert_eq!(joined.min_message_window, 2.0);
        assert_eq!(joined.source_account, tail.source_account);
        assert_eq!(joined.added_during_epoch, 7);
        assert_eq!(
            joined.expires_at,
            Some(now + Duration::milliseconds(45_000))
        );
        assert_eq!(joined.amount_at(dec!(200)), dec!(60));
    }

    #[test]
    fn test_join_requires_adjacent_ledgers() {
        let head = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        let tail = route("c.", "d.", &[["0", "0"], ["100", "100"]]);
        let now = Utc::now();
        assert!(head.join(&tail, None, 0, now).is_none());
    }

    #[test]
    fn test_join_rejects_doubling_back() {
        let head = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        let back = route("b.", "a.", &[["0", "0"], ["100", "100"]]);
        let now = Utc::now();
        assert!(head.join(&back, None, 0, now).is_none());
    }

    #[test]
    fn test_join_without_expiry_is_static() {
        let head = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        let tail = route("b.", "c.", &[["0", "0"], ["100", "100"]]);
        let joined = head.join(&tail, None, 0, Utc::now()).unwrap();
        assert_eq!(joined.expires_at, None);
        assert!(!joined.is_expired(Utc::now()));
    }

    #[test]
    fn test_is_expired_and_bump() {
        let now = Utc.with_ymd_and_hms(2015, 6, 16, 0, 0, 0).unwrap();
        let mut route = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        route.expires_at = Some(now + Duration::milliseconds(1000));

        assert!(!route.is_expired(now));
        assert!(route.is_expired(now + Duration::milliseconds(1000)));

        route.bump_expiration(now + Duration::milliseconds(900), 2000);
        assert!(!route.is_expired(now + Duration::milliseconds(1000)));
    }

    #[test]
    fn test_bump_expiration_skips_static_routes() {
        let mut route = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        route.bump_expiration(Utc::now(), 1000);
        assert_eq!(route.expires_at, None);
    }

    #[test]
    fn test_combine_takes_better_liquidity() {
        let mark = route("a.", "b.", &[["0", "0"], ["100", "100"]]);
        let mary = route("a.", "b.", &[["0", "0"], ["50", "60"]]);
        let combined = mark.combine(&mary);
        assert_eq!(combined.amount_at(dec!(25)), dec!(30));
        assert_eq!(combined.amount_at(dec!(100)), dec!(100));
        assert!(!combined.is_local);
    }

    #[test]
    fn test_curve_transforms_keep_metadata() {
        let route = route("a.", "b.", &[["0", "10"], ["100", "60"]]);

        let spread = route.shift_y(dec!(-10));
        assert_eq!(spread.amount_at(dec!(100)), dec!(50));
        assert_eq!(spread.source_ledger, route.source_ledger);

        let widened = route.shift_x(dec!(5));
        assert_eq!(widened.amount_at(dec!(5)), dec!(10));

        let simplified = route.simplify(2).unwrap();
        assert_eq!(simplified.curve, route.curve);
        assert!(route.simplify(0).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let route = route("a.", "b.", &[["0", "0"], ["100", "50"]]);
        let json = serde_json::to_string(&route).unwrap();
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(back, route);
    }

    #[test]
    fn test_to_data_formats_points_as_strings() {
        let route = route("a.", "b.", &[["0", "0"], ["100.50", "50"]]);
        let data = route.to_data();
        assert_eq!(data.points[1], ["100.5".to_string(), "50".to_string()]);
        assert_eq!(data.added_during_epoch, Some(0));
    }
}
