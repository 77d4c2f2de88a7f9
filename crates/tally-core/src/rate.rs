//! # Rates and Discounts
//!
//! Tax rates and discounts applied to cart rows.
//!
//! ## Why Basis Points?
//! 1 basis point = 0.01% = 1/10000
//! 2100 bps = 21% (e.g., Dutch VAT); float rates would reintroduce the
//! floating-point drift the integer `Money` type exists to avoid.
//!
//! ## Discount Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Discount::Rate(r)    - fraction of the gross line (price × qty)        │
//! │  Discount::Amount(m)  - absolute money value per unit                   │
//! │                                                                         │
//! │  The two shapes are a tagged union: serialization keeps the tag and     │
//! │  no code path ever reinterprets one shape as the other.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate in basis points, used for both tax and fractional
/// discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::rate::Rate;
    ///
    /// assert_eq!(Rate::from_percentage(21.0).bps(), 2100);
    /// assert_eq!(Rate::from_percentage(8.25).bps(), 825);
    /// ```
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percentage())
    }
}

// =============================================================================
// Discount
// =============================================================================

/// A per-row discount: either a fraction of the gross line or an absolute
/// money value per unit.
///
/// Serialized with an explicit tag so a persisted fraction can never be
/// misread as an absolute amount (or vice versa) on restore or merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Fraction of the gross line (unit price × quantity).
    Rate(Rate),
    /// Absolute amount per unit.
    Amount(Money),
}

impl Discount {
    /// No discount at all.
    #[inline]
    pub const fn none() -> Self {
        Discount::Rate(Rate::zero())
    }

    /// Checks whether this discount has no effect.
    pub fn is_none(&self) -> bool {
        match self {
            Discount::Rate(rate) => rate.is_zero(),
            Discount::Amount(amount) => amount.is_zero(),
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::none()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
