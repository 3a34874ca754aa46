//! Utility functions and helpers

use crate::error::Result;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Convert string to Decimal safely
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s)
        .map_err(|e| crate::error::RoutingError::invalid_curve(format!("Invalid decimal: {}", e)))
}

/// Format a Decimal in canonical external form (no trailing zeros)
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}
