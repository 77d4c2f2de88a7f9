//! # Error Types
//!
//! Protocol errors for the cart engine.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RowNotFound      - operation referenced an absent rowId                │
//! │  AlreadyStored    - store collision on (identifier, instance)           │
//! │  UnknownModel     - associate given an unresolvable type tag            │
//! │  DuplicateRecord  - record gateway unique-constraint violation          │
//! │  Core             - money/identity failures (CurrencyMismatch, ...)     │
//! │  Validation       - bad add/update input, names the offending field     │
//! │  Serialization    - malformed persisted record content                  │
//! │                                                                         │
//! │  Designed no-ops that are NOT errors: restore of a missing              │
//! │  identifier (nothing happens), merge of a missing identifier            │
//! │  (returns false). Nothing is retried internally.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use tally_core::{CoreError, RowId, ValidationError};

// =============================================================================
// Cart Error
// =============================================================================

/// Errors raised by cart mutation and persistence operations.
///
/// The message always names the offending key (rowId, identifier, type tag)
/// so callers can surface it without unpacking the variant.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart has no row with the given identity.
    #[error("the cart does not contain a row with id {0}")]
    RowNotFound(RowId),

    /// A cart was already stored under this identifier for the current
    /// instance. Resolve with `restore` or `erase` first.
    #[error("a cart with identifier {0} was already stored")]
    AlreadyStored(String),

    /// The supplied model type tag is not recognized by the resolver.
    #[error("the supplied model type {0} does not exist")]
    UnknownModel(String),

    /// The record gateway refused an insert because a record already
    /// exists for the (identifier, instance) pair.
    #[error("a record for ({identifier}, {instance}) already exists")]
    DuplicateRecord { identifier: String, instance: String },

    /// Money or identity failure (wraps CoreError).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Input validation failure (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Persisted or session content could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CartError.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// Unit Tests
// =============================================================================
