//! Fixed-point decimal types for prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Prices always carry exactly two decimal places and are produced by
//! truncation toward zero: half-cent results are never rounded up.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// Number of decimal places carried by every price.
pub const PRICE_SCALE: u32 = 2;

/// A non-negative price quantized to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::from_parts(0, 0, 0, false, PRICE_SCALE));

    /// Create a price from a whole number of cents.
    pub fn from_cents(cents: u64) -> Self {
        Self(Decimal::from_i128_with_scale(cents as i128, PRICE_SCALE))
    }

    /// Quantize an arbitrary decimal to cents, truncating toward zero.
    ///
    /// Negative inputs clamp to zero.
    pub fn from_decimal_truncated(value: Decimal) -> Self {
        let mut quantized = value
            .max(Decimal::ZERO)
            .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::ToZero);
        quantized.rescale(PRICE_SCALE);
        Self(quantized)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the price is strictly above the given floor.
    pub fn is_above(&self, floor: Price) -> bool {
        self.0 > floor.0
    }

    /// Render as a cash amount, e.g. `$12,345.67`.
    pub fn to_cash_string(&self) -> String {
        format_cash(self.0)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed change between two consecutive prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceDelta(Decimal);

/// Direction of a price movement, used for up/down styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl PriceDelta {
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Zero counts as `Up`.
    pub fn direction(&self) -> Direction {
        if self.0 >= Decimal::ZERO {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn to_cash_string(&self) -> String {
        format_cash(self.0)
    }
}

impl Sub for Price {
    type Output = PriceDelta;

    fn sub(self, rhs: Price) -> PriceDelta {
        PriceDelta(self.0 - rhs.0)
    }
}

impl fmt::Display for PriceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format a decimal as cash: floored to cents, thousands separators,
/// leading `-` for negative amounts.
pub fn format_cash(amount: Decimal) -> String {
    let mut floored =
        amount.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::ToNegativeInfinity);
    floored.rescale(PRICE_SCALE);

    let negative = floored.is_sign_negative() && !floored.is_zero();
    let digits = floored.abs().to_string();
    let (whole, frac) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!(
        "{}${}.{}",
        if negative { "-" } else { "" },
        group_thousands(whole),
        frac
    )
}

/// Format a count with thousands separators, e.g. `1,234,567`.
pub fn format_count(n: u64) -> String {
    group_thousands(&n.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
