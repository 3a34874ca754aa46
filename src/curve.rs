//! Piecewise-linear liquidity curves
//!
//! A curve maps a source amount to the destination amount obtainable for
//! it. Curves are non-decreasing, defined by an ordered sequence of
//! break-points, and immutable: every transformation returns a new curve.

use crate::error::{Result, RoutingError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single break-point of a liquidity curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Source amount
    pub x: Decimal,
    /// Destination amount obtainable for `x`
    pub y: Decimal,
}

impl Point {
    pub fn new(x: Decimal, y: Decimal) -> Self {
        Self { x, y }
    }
}

/// Piecewise-linear non-decreasing function from source amount to
/// destination amount.
///
/// Below its first break-point a curve yields nothing; above its last it is
/// clamped to the final y. An empty curve represents no liquidity at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<Point>,
}

impl Curve {
    /// A curve with no liquidity at any amount
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a curve from break-points, validating the curve invariants:
    /// non-negative coordinates, xs strictly increasing, ys non-decreasing.
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if let Some(first) = points.first() {
            if first.x < Decimal::ZERO || first.y < Decimal::ZERO {
                return Err(RoutingError::invalid_curve(format!(
                    "curve points must be non-negative, got ({}, {})",
                    first.x, first.y
                )));
            }
        }
        for pair in points.windows(2) {
            if pair[1].x <= pair[0].x {
                return Err(RoutingError::invalid_curve(format!(
                    "x coordinates must be strictly increasing, got {} then {}",
                    pair[0].x, pair[1].x
                )));
            }
            if pair[1].y < pair[0].y {
                return Err(RoutingError::invalid_curve(format!(
                    "y coordinates must be non-decreasing, got {} then {}",
                    pair[0].y, pair[1].y
                )));
            }
        }
        Ok(Self { points })
    }

    /// Internal constructor for points that satisfy the invariants by
    /// construction.
    fn from_sorted(points: Vec<Point>) -> Self {
        debug_assert!(points
            .windows(2)
            .all(|pair| pair[0].x < pair[1].x && pair[0].y <= pair[1].y));
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Destination amount for the source amount `x`.
    ///
    /// Zero below the first break-point, clamped above the last, linearly
    /// interpolated in between.
    pub fn amount_at(&self, x: Decimal) -> Decimal {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Decimal::ZERO,
        };
        if x < first.x {
            return Decimal::ZERO;
        }
        if x >= last.x {
            return last.y;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if x < b.x {
                return a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x);
            }
        }
        last.y
    }

    /// Source amount required to obtain the destination amount `y`, or
    /// `None` when the curve cannot deliver `y` at any source amount.
    pub fn amount_reverse(&self, y: Decimal) -> Option<Decimal> {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return None,
        };
        if y > last.y {
            return None;
        }
        if y <= first.y {
            return Some(first.x);
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if y <= b.y {
                if b.y == a.y {
                    return Some(a.x);
                }
                return Some(a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y));
            }
        }
        Some(last.x)
    }

    /// Parallel composition: at every source amount, the better of the two
    /// destination amounts. Break-points are the union of both curves' xs
    /// plus the points where their segments cross.
    pub fn combine(&self, other: &Curve) -> Curve {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let mut xs: Vec<Decimal> = Vec::with_capacity(self.points.len() + other.points.len());
        xs.extend(self.points.iter().map(|p| p.x));
        xs.extend(other.points.iter().map(|p| p.x));
        xs.sort();
        xs.dedup();

        let mut crossings = Vec::new();
        for pair in xs.windows(2) {
            if let Some(x) = segment_crossing(self, other, pair[0], pair[1]) {
                crossings.push(x);
            }
        }
        xs.extend(crossings);
        xs.sort();
        xs.dedup();

        let points = xs
            .into_iter()
            .map(|x| Point::new(x, self.amount_at(x).max(other.amount_at(x))))
            .collect();
        Curve::from_sorted(points)
    }

    /// Serial composition: the curve representing
    /// `other.amount_at(self.amount_at(x))`, with break-points wherever
    /// either input breaks. Empty when either input is empty.
    pub fn join(&self, other: &Curve) -> Curve {
        if self.is_empty() || other.is_empty() {
            return Curve::empty();
        }
        let mut xs: Vec<Decimal> = self.points.iter().map(|p| p.x).collect();
        for point in &other.points {
            if let Some(x) = self.amount_reverse(point.x) {
                xs.push(x);
            }
        }
        xs.sort();
        xs.dedup();

        let points = xs
            .into_iter()
            .map(|x| Point::new(x, other.amount_at(self.amount_at(x))))
            .collect();
        Curve::from_sorted(points)
    }

    /// Add `dx` to every x. A negative shift clamps the boundary point to
    /// zero and drops points pushed off the axis.
    pub fn shift_x(&self, dx: Decimal) -> Curve {
        let mut points: Vec<Point> = self
            .points
            .iter()
            .map(|p| Point::new(p.x + dx, p.y))
            .collect();
        while points.len() >= 2 && points[1].x <= Decimal::ZERO {
            points.remove(0);
        }
        if let Some(first) = points.first_mut() {
            if first.x < Decimal::ZERO {
                first.x = Decimal::ZERO;
            }
        }
        Curve::from_sorted(points)
    }

    /// Add `dy` to every y. A negative shift clamps the boundary point to
    /// zero and drops points pushed below the axis.
    pub fn shift_y(&self, dy: Decimal) -> Curve {
        let mut points: Vec<Point> = self
            .points
            .iter()
            .map(|p| Point::new(p.x, p.y + dy))
            .collect();
        while points.len() >= 2 && points[1].y < Decimal::ZERO {
            points.remove(0);
        }
        if let Some(first) = points.first_mut() {
            if first.y < Decimal::ZERO {
                first.y = Decimal::ZERO;
            }
        }
        Curve::from_sorted(points)
    }

    /// Reduce the curve to at most `max_points` break-points by repeatedly
    /// removing the interior point whose removal introduces the smallest
    /// vertical error. Endpoints are preserved.
    pub fn simplify(&self, max_points: usize) -> Result<Curve> {
        if max_points < 2 {
            return Err(RoutingError::invalid_curve(format!(
                "simplify requires room for both endpoints, got max_points={}",
                max_points
            )));
        }
        let mut points = self.points.clone();
        while points.len() > max_points {
            let mut best_index = 1;
            let mut best_error: Option<Decimal> = None;
            for i in 1..points.len() - 1 {
                let error = chord_error(points[i - 1], points[i], points[i + 1]);
                if best_error.map_or(true, |best| error < best) {
                    best_error = Some(error);
                    best_index = i;
                }
            }
            points.remove(best_index);
        }
        Ok(Curve::from_sorted(points))
    }
}

/// Vertical distance between `mid` and the chord from `a` to `b`.
fn chord_error(a: Point, mid: Point, b: Point) -> Decimal {
    let chord_y = a.y + (b.y - a.y) * (mid.x - a.x) / (b.x - a.x);
    (mid.y - chord_y).abs()
}

/// The y values a curve takes just inside the open interval (x1, x2): the
/// right limit at x1 and the left limit at x2. Both curves are linear on
/// such an interval when x1 and x2 are consecutive union break-points; the
/// jump a curve makes at its first break-point sits exactly on a boundary.
fn linear_piece(curve: &Curve, x1: Decimal, x2: Decimal) -> (Decimal, Decimal) {
    match curve.points.first() {
        Some(first) if x2 <= first.x => (Decimal::ZERO, Decimal::ZERO),
        _ => (curve.amount_at(x1), curve.amount_at(x2)),
    }
}

/// The x where the two curves cross strictly inside (x1, x2), if they do.
/// Crossings at the boundaries need no extra break-point.
fn segment_crossing(a: &Curve, b: &Curve, x1: Decimal, x2: Decimal) -> Option<Decimal> {
    let (ya1, ya2) = linear_piece(a, x1, x2);
    let (yb1, yb2) = linear_piece(b, x1, x2);
    let d1 = ya1 - yb1;
    let d2 = ya2 - yb2;
    if d1.is_zero() || d2.is_zero() || d1.is_sign_positive() == d2.is_sign_positive() {
        return None;
    }
    let x = x1 + (x2 - x1) * d1 / (d1 - d2);
    if x1 < x && x < x2 {
        Some(x)
    } else {
        None
    }
}
