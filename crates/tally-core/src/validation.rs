//! # Validation Module
//!
//! Input validation for item specs entering the cart.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Types (Rust)                                                 │
//! │  ├── Money is always an integer amount + currency                      │
//! │  └── Rates are always basis points                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── A spec with an empty product id never reaches the cart            │
//! │  └── Every failure names the offending field                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_product_id, validate_quantity};
//!
//! validate_product_id("293ad").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product identifier.
///
/// ## Rules
/// - Must not be empty or whitespace-only
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_id;
///
/// assert!(validate_product_id("293ad").is_ok());
/// assert!(validate_product_id("").is_err());
/// assert!(validate_product_id("   ").is_err());
/// ```
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name.
///
/// ## Rules
/// - Must not be empty or whitespace-only
pub fn validate_name(name: &str) -> ValidationResult<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value on `add`.
///
/// ## Rules
/// - Must be positive (> 0); a row is removed rather than stored with a
///   zero or negative quantity
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "qty".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
pub fn validate_unit_price(price: &Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a per-unit weight.
///
/// ## Rules
/// - Must be a finite number
/// - Must be non-negative
pub fn validate_weight(weight: f64) -> ValidationResult<()> {
    if !weight.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: "weight".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    if weight < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "weight".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
