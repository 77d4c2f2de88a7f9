//! # Item Input Shapes
//!
//! The three ways callers describe a purchasable line, all normalized to a
//! single internal [`ItemSpec`] before any cart logic runs.
//!
//! ## Input Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Add Input Shapes                                   │
//! │                                                                         │
//! │  ItemSpec::new(id, name, qty, price)     (positional fields)            │
//! │  ItemSpec::from_buyable(&product, ..)    (external buyable object)      │
//! │  ItemSpec::from_attributes(attrs)        (raw attribute map)            │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │              ItemSpec (one normalized shape)                            │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │              Cart::add / Cart::merge                                    │
//! │                                                                         │
//! │  Branching lives HERE, at the entry points - never deep inside add.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use tally_core::{
    CartItemOptions, Discount, Money, ModelRef, Rate, ValidationError,
};

// =============================================================================
// Buyable
// =============================================================================

/// An external object that can be placed in a cart.
///
/// Implemented by product models in the embedding application. A buyable
/// supplies its own identity, description, price and weight; quantity and
/// options come from the caller at add time.
pub trait Buyable {
    /// Identifier the row identity is derived from.
    fn identifier(&self) -> String;

    /// Display name for the cart row.
    fn description(&self) -> String;

    /// Price per unit.
    fn price(&self) -> Money;

    /// Weight per unit. Defaults to zero.
    fn weight(&self) -> f64 {
        0.0
    }

    /// Model type tag for lazy association, if the buyable is backed by a
    /// resolvable external model.
    fn model_type(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// Item Attributes
// =============================================================================

/// Raw attribute map: the loosely-shaped input form, with every field
/// optional. Also serves as the patch shape for `Cart::update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemAttributes {
    /// Product identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Quantity.
    pub qty: Option<i64>,
    /// Price per unit.
    pub price: Option<Money>,
    /// Weight per unit.
    pub weight: Option<f64>,
    /// Option set. Replaces the row's options wholesale when present.
    pub options: Option<CartItemOptions>,
    /// Per-row tax override.
    pub tax_rate: Option<Rate>,
    /// Per-row discount override.
    pub discount: Option<Discount>,
}

// =============================================================================
// Item Spec
// =============================================================================

/// The normalized description of a line to add: every input shape becomes
/// one of these before `Cart::add` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSpec {
    /// Product identifier (identity input).
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Quantity to add.
    pub quantity: i64,
    /// Price per unit.
    pub unit_price: Money,
    /// Weight per unit.
    pub weight_per_unit: f64,
    /// Option set (identity input).
    pub options: CartItemOptions,
    /// Per-row tax override carried into the new row.
    pub tax_rate: Option<Rate>,
    /// Per-row discount override carried into the new row.
    pub discount: Option<Discount>,
    /// Lazy external model reference carried into the new row.
    pub model_ref: Option<ModelRef>,
}

impl ItemSpec {
    /// Positional-fields entry point.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        ItemSpec {
            product_id: product_id.into(),
            name: name.into(),
            quantity,
            unit_price,
            weight_per_unit: 0.0,
            options: CartItemOptions::new(),
            tax_rate: None,
            discount: None,
            model_ref: None,
        }
    }

    /// Sets the per-unit weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight_per_unit = weight;
        self
    }

    /// Sets the option set.
    pub fn with_options(mut self, options: CartItemOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets a per-row tax override.
    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    /// Sets a per-row discount override.
    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Sets a lazy external model reference.
    pub fn with_model_ref(mut self, model_ref: ModelRef) -> Self {
        self.model_ref = Some(model_ref);
        self
    }

    /// Buyable entry point: the buyable supplies id/name/price/weight, the
    /// caller supplies quantity and options. A buyable with a model type
    /// is auto-associated.
    pub fn from_buyable(buyable: &dyn Buyable, quantity: i64, options: CartItemOptions) -> Self {
        let model_ref = buyable
            .model_type()
            .map(|type_tag| ModelRef::new(type_tag, buyable.identifier()));

        ItemSpec {
            product_id: buyable.identifier(),
            name: buyable.description(),
            quantity,
            unit_price: buyable.price(),
            weight_per_unit: buyable.weight(),
            options,
            tax_rate: None,
            discount: None,
            model_ref,
        }
    }

    /// Attribute-map entry point. `id`, `name` and `price` are required;
    /// `qty` defaults to 1 and `weight` to 0.
    pub fn from_attributes(attrs: ItemAttributes) -> Result<Self, ValidationError> {
        let product_id = attrs.id.ok_or_else(|| ValidationError::Required {
            field: "id".to_string(),
        })?;
        let name = attrs.name.ok_or_else(|| ValidationError::Required {
            field: "name".to_string(),
        })?;
        let unit_price = attrs.price.ok_or_else(|| ValidationError::Required {
            field: "price".to_string(),
        })?;

        Ok(ItemSpec {
            product_id,
            name,
            quantity: attrs.qty.unwrap_or(1),
            unit_price,
            weight_per_unit: attrs.weight.unwrap_or(0.0),
            options: attrs.options.unwrap_or_default(),
            tax_rate: attrs.tax_rate,
            discount: attrs.discount,
            model_ref: None,
        })
    }
}

// =============================================================================
// Cart Update
// =============================================================================

/// A change request for an existing row, in one of the three caller shapes.
#[derive(Debug, Clone)]
pub enum CartUpdate {
    /// Bare quantity. Zero or negative removes the row.
    Quantity(i64),
    /// Attribute patch; only the present fields are applied.
    Attributes(ItemAttributes),
}

impl CartUpdate {
    /// Buyable shape: refreshes name, price and weight from the buyable.
    pub fn from_buyable(buyable: &dyn Buyable) -> Self {
        CartUpdate::Attributes(ItemAttributes {
            name: Some(buyable.description()),
            price: Some(buyable.price()),
            weight: Some(buyable.weight()),
            ..ItemAttributes::default()
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
