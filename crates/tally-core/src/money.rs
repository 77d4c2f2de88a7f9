//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units + Currency Tag                       │
//! │    Every amount is an i64 count of minor units (cents for USD)          │
//! │    tagged with its ISO currency code. Arithmetic across different       │
//! │    currencies is a typed error, never a silent coercion.                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Currency, Money};
//! use tally_core::rate::Rate;
//!
//! // Create from minor units (preferred)
//! let price = Money::from_cents(1099, Currency::USD); // $10.99
//!
//! // Quantity multiplication is exact
//! let line = price.multiply_quantity(3).unwrap(); // $32.97
//!
//! // Rate application rounds half-up to the nearest minor unit
//! let tax = line.apply_rate(Rate::from_bps(2100)); // 21%
//! assert_eq!(tax.cents(), 692);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::rate::Rate;

// =============================================================================
// Currency
// =============================================================================

/// A 3-letter ISO-4217 currency code, stored inline so `Money` stays `Copy`.
///
/// Only the code is modeled; exponent handling beyond 2 minor-unit digits
/// and conversion between currencies are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    /// United States dollar. Default currency for empty aggregates.
    pub const USD: Currency = Currency(*b"USD");

    /// Euro.
    pub const EUR: Currency = Currency(*b"EUR");

    /// Parses a currency code.
    ///
    /// ## Rules
    /// - Exactly 3 characters
    /// - Uppercase ASCII letters only
    pub fn from_code(code: &str) -> CoreResult<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(CoreError::InvalidCurrency {
                code: code.to_string(),
            });
        }
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    /// Returns the code as a string slice.
    pub fn code(&self) -> &str {
        // Constructor guarantees uppercase ASCII
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Currency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::from_code(&code).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value: an exact count of minor units plus its currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds, corrections
/// - **Immutable**: Every operation returns a new value
/// - **Fallible binary ops**: `checked_add`/`checked_sub` refuse to mix
///   currencies instead of exposing panicking operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units (cents for USD).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Currency, Money};
    ///
    /// let price = Money::from_cents(1099, Currency::USD); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64, currency: Currency) -> Self {
        Money { cents, currency }
    }

    /// Returns zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money { cents: 0, currency }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency tag.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Fails with `CurrencyMismatch` unless both values share a currency.
    fn require_same_currency(&self, other: &Money) -> CoreResult<()> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    /// Adds two Money values of the same currency.
    pub fn checked_add(self, other: Money) -> CoreResult<Money> {
        self.require_same_currency(&other)?;
        let cents = self
            .cents
            .checked_add(other.cents)
            .ok_or(CoreError::AmountOverflow { operation: "add" })?;
        Ok(Money::from_cents(cents, self.currency))
    }

    /// Subtracts two Money values of the same currency.
    pub fn checked_sub(self, other: Money) -> CoreResult<Money> {
        self.require_same_currency(&other)?;
        let cents = self
            .cents
            .checked_sub(other.cents)
            .ok_or(CoreError::AmountOverflow { operation: "sub" })?;
        Ok(Money::from_cents(cents, self.currency))
    }

    /// Multiplies money by a quantity. Exact, no rounding involved.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Currency, Money};
    ///
    /// let unit_price = Money::from_cents(299, Currency::USD); // $2.99
    /// let line_total = unit_price.multiply_quantity(3).unwrap();
    /// assert_eq!(line_total.cents(), 897); // $8.97
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> CoreResult<Money> {
        let cents = self
            .cents
            .checked_mul(qty)
            .ok_or(CoreError::AmountOverflow { operation: "mul" })?;
        Ok(Money::from_cents(cents, self.currency))
    }

    /// Applies a rate (tax or fractional discount), rounding half-up to the
    /// nearest minor unit.
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  Integer math: (cents * bps + 5000) / 10000                         │
    /// │                                                                     │
    /// │  The +5000 term rounds half-up (5000/10000 = 0.5). This is the      │
    /// │  ONE rounding rule used by every derived amount in the system,      │
    /// │  so per-item and aggregate calculations can never drift by a cent   │
    /// │  relative to each other.                                            │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Currency, Money};
    /// use tally_core::rate::Rate;
    ///
    /// let base = Money::from_cents(1000, Currency::USD); // $10.00
    /// let tax = base.apply_rate(Rate::from_bps(825));    // 8.25%
    /// // $10.00 × 8.25% = $0.825 → rounds to $0.83
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        // i128 prevents overflow on large amounts
        let cents = (self.cents as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64, self.currency)
    }

    /// Returns the smaller of two same-currency amounts.
    ///
    /// Used to clamp discount amounts so they never exceed the gross line.
    pub fn clamp_to(self, ceiling: Money) -> CoreResult<Money> {
        self.require_same_currency(&ceiling)?;
        Ok(if self.cents > ceiling.cents {
            ceiling
        } else {
            self
        })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for error messages and debugging. Use frontend formatting for
/// actual UI display to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02} {}",
            sign,
            (self.cents / 100).abs(),
            (self.cents % 100).abs(),
            self.currency
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
