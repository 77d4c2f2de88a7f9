//! # Cart Item
//!
//! One line entry in a cart and its derived monetary amounts.
//!
//! ## Derivation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Per-Item Amount Derivation                           │
//! │                                                                         │
//! │  price_total      = unit_price × quantity            (gross, exact)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  discount_amount  = fraction ? price_total × rate                       │
//! │                              : amount × quantity     (clamped ≤ gross)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  subtotal         = price_total − discount_amount    (taxable base)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tax              = subtotal × effective_tax_rate                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  total            = subtotal + tax                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fallback At Read Time
//! `tax_rate` and `discount` are `Option`s. A `None` falls back to the
//! cart's globals at *calculation* time - the global value is never copied
//! onto the item, so changing a global later retroactively affects every
//! row without an override.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::identity::RowId;
use crate::money::Money;
use crate::options::CartItemOptions;
use crate::rate::{Discount, Rate};

// =============================================================================
// Model Reference
// =============================================================================

/// An opaque, lazy reference to an external model backing a cart row.
///
/// Only the type tag and key are stored; resolution happens through a
/// separate resolver collaborator, never eagerly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Type tag the external resolver recognizes (e.g., "product").
    pub type_tag: String,
    /// Key of the referenced object within that type.
    pub key: String,
}

impl ModelRef {
    /// Creates a model reference.
    pub fn new(type_tag: impl Into<String>, key: impl Into<String>) -> Self {
        ModelRef {
            type_tag: type_tag.into(),
            key: key.into(),
        }
    }
}

// =============================================================================
// Globals
// =============================================================================

/// Cart-wide default tax and discount, applied to rows without a per-row
/// override. Resolved at read time (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Globals {
    /// Default tax rate for rows with `tax_rate: None`.
    pub tax: Rate,
    /// Default discount for rows with `discount: None`.
    pub discount: Discount,
}

// =============================================================================
// Cart Item
// =============================================================================

/// One line entry in a cart.
///
/// ## Invariants
/// - `row_id` always equals `RowId::derive(product_id, options)`; the cart
///   re-derives it whenever an update touches the options
/// - `quantity >= 1` while the item is resident (the cart removes rows
///   instead of storing a zero or negative quantity)
/// - Derived amounts are computed on demand, never cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Content-derived identity (product id + options).
    pub row_id: RowId,

    /// Product identifier this row was created from.
    pub product_id: String,

    /// Display name.
    pub name: String,

    /// Units of the product in this row.
    pub quantity: i64,

    /// Price per unit.
    pub unit_price: Money,

    /// Per-row tax override. `None` falls back to the cart's global rate.
    pub tax_rate: Option<Rate>,

    /// Per-row discount override. `None` falls back to the cart's global.
    pub discount: Option<Discount>,

    /// Weight per unit (caller-defined unit, e.g. grams).
    pub weight_per_unit: f64,

    /// Option set; part of this row's identity.
    pub options: CartItemOptions,

    /// Optional lazy reference to an external model.
    pub model_ref: Option<ModelRef>,
}

impl CartItem {
    /// Gross line value: `unit_price × quantity`. Exact, no rounding.
    pub fn price_total(&self) -> CoreResult<Money> {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Discount amount for this row, resolved against the cart globals and
    /// clamped so it never exceeds the gross line.
    pub fn discount_amount(&self, globals: &Globals) -> CoreResult<Money> {
        let gross = self.price_total()?;
        let raw = match self.discount.unwrap_or(globals.discount) {
            Discount::Rate(rate) => gross.apply_rate(rate),
            Discount::Amount(amount) => amount.multiply_quantity(self.quantity)?,
        };
        raw.clamp_to(gross)
    }

    /// Taxable base: gross line minus the discount amount.
    pub fn subtotal(&self, globals: &Globals) -> CoreResult<Money> {
        self.price_total()?.checked_sub(self.discount_amount(globals)?)
    }

    /// The tax rate in effect for this row: the per-row override if set,
    /// otherwise the cart's global rate.
    pub fn effective_tax_rate(&self, globals: &Globals) -> Rate {
        self.tax_rate.unwrap_or(globals.tax)
    }

    /// Tax amount: taxable base × effective tax rate.
    pub fn tax(&self, globals: &Globals) -> CoreResult<Money> {
        Ok(self.subtotal(globals)?.apply_rate(self.effective_tax_rate(globals)))
    }

    /// Line total: taxable base + tax.
    pub fn total(&self, globals: &Globals) -> CoreResult<Money> {
        self.subtotal(globals)?.checked_add(self.tax(globals)?)
    }

    /// Total weight of this row: `weight_per_unit × quantity`.
    pub fn total_weight(&self) -> f64 {
        self.weight_per_unit * self.quantity as f64
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
