//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Money and identity failures                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-cart errors (separate crate)                                    │
//! │  └── CartError        - Mutation/persistence protocol failures         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CartError → Caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field name, currency code, row id)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::money::Currency;

// =============================================================================
// Core Error
// =============================================================================

/// Core value-type errors.
///
/// These errors represent violations of the money and identity invariants.
/// They are raised synchronously at the point of violation and never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Arithmetic was attempted between two amounts in different currencies.
    ///
    /// ## When This Occurs
    /// - Summing cart rows whose unit prices use different currency codes
    /// - Applying an absolute discount denominated in another currency
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// A currency code was not a 3-letter uppercase ASCII code.
    #[error("invalid currency code '{code}': must be 3 uppercase ASCII letters")]
    InvalidCurrency { code: String },

    /// A row identity string could not be parsed.
    #[error("invalid row id '{raw}': {reason}")]
    InvalidRowId { raw: String, reason: String },

    /// A money amount overflowed the 64-bit minor-unit range.
    #[error("money amount overflow in {operation}")]
    AmountOverflow { operation: &'static str },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any cart state is touched.
/// The message always names the offending field.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., non-finite weight, malformed price).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
