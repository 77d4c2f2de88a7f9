//! # tally-core: Pure Value Types for tally
//!
//! This crate is the **heart** of tally. It contains the money arithmetic,
//! row identity derivation, and per-item amount calculations as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Embedding Application                           │   │
//! │  │   session backend ── record table ── event bus ── resolver     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ gateway traits                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tally-cart (Cart engine)                       │   │
//! │  │    add/update/remove, aggregates, store/restore/merge          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │ identity  │  │   item    │  │ validation│  │   │
//! │  │   │   Money   │  │   RowId   │  │ CartItem  │  │   rules   │  │   │
//! │  │   │ Currency  │  │  hashing  │  │  amounts  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO SESSION • NO DATABASE • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money`/`Currency` with integer arithmetic (no floats!)
//! - [`rate`] - `Rate` in basis points and the `Discount` tagged union
//! - [`options`] - `CartItemOptions` with canonical serialization
//! - [`identity`] - `RowId` content-hash identity derivation
//! - [`item`] - `CartItem` and its derived amounts
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation for item specs
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Session, database, network access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are minor units (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Currency, Money};
//! use tally_core::rate::Rate;
//!
//! // Create money from minor units (never from floats!)
//! let price = Money::from_cents(1000, Currency::USD); // $10.00
//!
//! // Tax at 21%, rounded half-up to the nearest cent
//! let tax = price.apply_rate(Rate::from_bps(2100));
//! assert_eq!(tax.cents(), 210);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod item;
pub mod money;
pub mod options;
pub mod rate;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use identity::RowId;
pub use item::{CartItem, Globals, ModelRef};
pub use money::{Currency, Money};
pub use options::{CartItemOptions, OptionValue};
pub use rate::{Discount, Rate};
