//! # Cart
//!
//! The mutable cart: an ordered mapping of rowId → item, plus the
//! mutation API, aggregate calculations, named instances, and the
//! store/restore/merge persistence protocol.
//!
//! ## State & Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Cart                                         │
//! │                                                                         │
//! │   items: IndexMap<RowId, CartItem>   (insertion-ordered, key == row_id) │
//! │   globals: { tax, discount }         (fallback for un-overridden rows)  │
//! │   instance: String                   (named partition of session state) │
//! │                                                                         │
//! │   every mutating call ──► write-through to SessionGateway[instance]     │
//! │   store(identifier)    ──► RecordGateway.insert + cart.stored event     │
//! │   restore(identifier)  ──► replace live state, delete record            │
//! │   merge(identifier)    ──► fold persisted rows in via the add path      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering & Rounding
//! Aggregates accumulate left-to-right in insertion order and never
//! re-round: per-item amounts are already rounded to the minor unit, and
//! the sums are exact integer additions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tally_core::validation::{
    validate_product_id, validate_quantity, validate_rate_bps, validate_unit_price,
    validate_weight,
};
use tally_core::{CartItem, Currency, Discount, Globals, Money, Rate, RowId};

use crate::error::{CartError, CartResult};
use crate::events::{CartEvent, EventSink};
use crate::gateway::{ModelResolver, PersistedCartRecord, RecordGateway, SessionGateway};
use crate::input::{CartUpdate, ItemAttributes, ItemSpec};

// =============================================================================
// Cart Snapshot
// =============================================================================

/// The serialized form of a cart: the full rowId → item mapping plus the
/// globals in force when it was written.
///
/// The globals ride along so `merge` can materialize the *effective*
/// tax/discount of source rows that had no per-row override - without them,
/// a `keep_discount` merge into a cart with different globals would
/// silently change what the source rows were worth.
#[derive(Debug, Serialize, Deserialize)]
struct CartSnapshot {
    items: IndexMap<RowId, CartItem>,
    globals: Globals,
}

// =============================================================================
// Cart
// =============================================================================

/// A named, session-backed shopping cart.
///
/// ## Invariants
/// - Every key in `items` equals the contained item's current `row_id`
/// - Insertion order is preserved across in-place updates; a re-derived
///   identity keeps its position unless it collides with an existing row
/// - Rows never hold a quantity below 1; updates that would are removals
pub struct Cart {
    session: Arc<dyn SessionGateway>,
    records: Arc<dyn RecordGateway>,
    events: Arc<dyn EventSink>,
    resolver: Arc<dyn ModelResolver>,

    instance: String,
    items: IndexMap<RowId, CartItem>,
    globals: Globals,

    /// Adopted from a persisted record on restore; `None` until then.
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Name of the instance a new cart starts on.
    pub const DEFAULT_INSTANCE: &'static str = "default";

    /// Creates a cart on the default instance, picking up any live state
    /// the session already holds for it.
    pub fn new(
        session: Arc<dyn SessionGateway>,
        records: Arc<dyn RecordGateway>,
        events: Arc<dyn EventSink>,
        resolver: Arc<dyn ModelResolver>,
    ) -> Self {
        let items = load_items(session.as_ref(), Self::DEFAULT_INSTANCE);
        Cart {
            session,
            records,
            events,
            resolver,
            instance: Self::DEFAULT_INSTANCE.to_string(),
            items,
            globals: Globals::default(),
            created_at: None,
            updated_at: None,
        }
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// The name of the instance this cart currently addresses.
    pub fn current_instance(&self) -> &str {
        &self.instance
    }

    /// Switches to the named instance.
    ///
    /// The current instance's rows are already in the session (write-through
    /// happens on every mutation), so switching never discards state; the
    /// target instance's rows are loaded in their place. Globals are
    /// cart-level and survive the switch.
    pub fn set_instance(&mut self, name: &str) -> &mut Self {
        if name != self.instance {
            debug!(from = %self.instance, to = %name, "switching cart instance");
            self.instance = name.to_string();
            self.items = load_items(self.session.as_ref(), name);
        }
        self
    }

    // =========================================================================
    // Mutation API
    // =========================================================================

    /// Adds one line to the cart.
    ///
    /// ## Behavior
    /// - Input is validated first; any violation names the offending field
    /// - The row identity is derived from (product id, options); adding an
    ///   identity that already exists increases that row's quantity instead
    ///   of creating a duplicate row
    /// - Emits `item.added` with the resulting row snapshot
    pub fn add(&mut self, spec: ItemSpec) -> CartResult<CartItem> {
        let item = self.fold_in(spec, true)?;
        self.write_session()?;
        Ok(item)
    }

    /// Adds a batch of lines, returning the resulting row snapshots in
    /// order. One `item.added` per resulting row; the session is written
    /// once at the end.
    pub fn add_many(&mut self, specs: Vec<ItemSpec>) -> CartResult<Vec<CartItem>> {
        let mut added = Vec::with_capacity(specs.len());
        for spec in specs {
            added.push(self.fold_in(spec, true)?);
        }
        self.write_session()?;
        Ok(added)
    }

    /// Validates a spec and folds it into the item mapping. Shared by
    /// `add`, `add_many` and `merge`; does not touch the session.
    fn fold_in(&mut self, spec: ItemSpec, dispatch: bool) -> CartResult<CartItem> {
        validate_product_id(&spec.product_id)?;
        validate_quantity(spec.quantity)?;
        validate_unit_price(&spec.unit_price)?;
        validate_weight(spec.weight_per_unit)?;

        let row_id = RowId::derive(&spec.product_id, &spec.options);

        let snapshot = if let Some(existing) = self.items.get_mut(&row_id) {
            existing.quantity += spec.quantity;
            debug!(row_id = %row_id, qty = existing.quantity, "increased row quantity");
            existing.clone()
        } else {
            debug!(row_id = %row_id, product_id = %spec.product_id, "inserting row");
            let item = CartItem {
                row_id,
                product_id: spec.product_id,
                name: spec.name,
                quantity: spec.quantity,
                unit_price: spec.unit_price,
                tax_rate: spec.tax_rate,
                discount: spec.discount,
                weight_per_unit: spec.weight_per_unit,
                options: spec.options,
                model_ref: spec.model_ref,
            };
            self.items.insert(row_id, item.clone());
            item
        };
        if dispatch {
            self.events.emit(CartEvent::ItemAdded(snapshot.clone()));
        }
        Ok(snapshot)
    }

    /// Applies a change to an existing row.
    ///
    /// ## Behavior
    /// - Fails with `RowNotFound` if the row is absent
    /// - A resulting quantity <= 0 removes the row and emits `item.removed`
    ///   (never `item.updated`); the method then returns `None`
    /// - A changed product id or option set re-derives the identity: the
    ///   row is re-keyed
    ///   in place (position preserved), or - if the new identity collides
    ///   with another row - the quantities are summed into that row under
    ///   its existing position and the original row is deleted
    /// - Otherwise the row is mutated in place; emits `item.updated`
    pub fn update(&mut self, row_id: &RowId, update: CartUpdate) -> CartResult<Option<CartItem>> {
        let mut item = self
            .items
            .get(row_id)
            .cloned()
            .ok_or(CartError::RowNotFound(*row_id))?;

        match update {
            CartUpdate::Quantity(qty) => item.quantity = qty,
            CartUpdate::Attributes(attrs) => apply_attributes(&mut item, attrs)?,
        }

        if item.quantity <= 0 {
            // Removal path never reports an update
            let removed = self
                .items
                .shift_remove(row_id)
                .ok_or(CartError::RowNotFound(*row_id))?;
            debug!(row_id = %row_id, "removed row via non-positive quantity");
            self.events.emit(CartEvent::ItemRemoved(removed));
            self.write_session()?;
            return Ok(None);
        }

        let new_id = RowId::derive(&item.product_id, &item.options);
        if new_id != *row_id {
            if self.items.contains_key(&new_id) {
                // Collision: fold the quantity into the surviving row, which
                // keeps its own attributes and position
                let quantity = item.quantity;
                self.items.shift_remove(row_id);
                let survivor = match self.items.get_mut(&new_id) {
                    Some(survivor) => {
                        survivor.quantity += quantity;
                        survivor.clone()
                    }
                    None => return Err(CartError::RowNotFound(new_id)),
                };
                debug!(row_id = %new_id, "merged re-keyed row into existing row");
                self.events.emit(CartEvent::ItemUpdated(survivor.clone()));
                self.write_session()?;
                return Ok(Some(survivor));
            }

            // Re-key in place: same position, fresh identity
            let position = self
                .items
                .get_index_of(row_id)
                .ok_or(CartError::RowNotFound(*row_id))?;
            item.row_id = new_id;
            self.items.shift_remove(row_id);
            self.items.insert(new_id, item.clone());
            self.items.move_index(self.items.len() - 1, position);
            debug!(old = %row_id, new = %new_id, "re-keyed row after options change");
        } else {
            self.items.insert(*row_id, item.clone());
        }

        self.events.emit(CartEvent::ItemUpdated(item.clone()));
        self.write_session()?;
        Ok(Some(item))
    }

    /// Removes a row, returning its final snapshot. Emits `item.removed`.
    pub fn remove(&mut self, row_id: &RowId) -> CartResult<CartItem> {
        let removed = self
            .items
            .shift_remove(row_id)
            .ok_or(CartError::RowNotFound(*row_id))?;
        debug!(row_id = %row_id, "removed row");
        self.events.emit(CartEvent::ItemRemoved(removed.clone()));
        self.write_session()?;
        Ok(removed)
    }

    /// Looks up a row by identity.
    pub fn get(&self, row_id: &RowId) -> CartResult<&CartItem> {
        self.items.get(row_id).ok_or(CartError::RowNotFound(*row_id))
    }

    /// Snapshot of all rows, insertion order preserved.
    pub fn content(&self) -> Vec<CartItem> {
        self.items.values().cloned().collect()
    }

    /// Clears all rows of the current instance, including its session
    /// entry. No notification is emitted.
    pub fn destroy(&mut self) {
        debug!(instance = %self.instance, "destroying cart instance");
        self.items.clear();
        self.session.delete(&self.instance);
        self.created_at = None;
        self.updated_at = None;
    }

    /// Rows matching a predicate, insertion order preserved.
    pub fn search<F>(&self, predicate: F) -> Vec<CartItem>
    where
        F: Fn(&CartItem, &RowId) -> bool,
    {
        self.items
            .iter()
            .filter(|(row_id, item)| predicate(item, row_id))
            .map(|(_, item)| item.clone())
            .collect()
    }

    // =========================================================================
    // Model Association
    // =========================================================================

    /// Records a lazy external model reference on a row.
    ///
    /// Fails with `UnknownModel` if the resolver does not recognize the
    /// type tag. The referenced object is NOT fetched here.
    pub fn associate(&mut self, row_id: &RowId, type_tag: &str, key: &str) -> CartResult<()> {
        if !self.resolver.recognizes(type_tag) {
            return Err(CartError::UnknownModel(type_tag.to_string()));
        }
        let item = self
            .items
            .get_mut(row_id)
            .ok_or(CartError::RowNotFound(*row_id))?;
        item.model_ref = Some(tally_core::ModelRef::new(type_tag, key));
        self.write_session()?;
        Ok(())
    }

    /// Resolves a row's associated model through the resolver, lazily.
    /// Returns `None` when the row has no reference or the object is gone.
    pub fn model(&self, row_id: &RowId) -> CartResult<Option<serde_json::Value>> {
        let item = self.get(row_id)?;
        Ok(item
            .model_ref
            .as_ref()
            .and_then(|model_ref| self.resolver.resolve(&model_ref.type_tag, &model_ref.key)))
    }

    // =========================================================================
    // Tax & Discount
    // =========================================================================

    /// Sets a per-row tax override.
    pub fn set_tax(&mut self, row_id: &RowId, rate: Rate) -> CartResult<()> {
        validate_rate_bps(rate.bps())?;
        let item = self
            .items
            .get_mut(row_id)
            .ok_or(CartError::RowNotFound(*row_id))?;
        item.tax_rate = Some(rate);
        self.write_session()?;
        Ok(())
    }

    /// Sets a per-row discount override.
    pub fn set_discount(&mut self, row_id: &RowId, discount: Discount) -> CartResult<()> {
        if let Discount::Rate(rate) = discount {
            validate_rate_bps(rate.bps())?;
        }
        let item = self
            .items
            .get_mut(row_id)
            .ok_or(CartError::RowNotFound(*row_id))?;
        item.discount = Some(discount);
        self.write_session()?;
        Ok(())
    }

    /// Sets the cart-wide default tax rate.
    ///
    /// Resolved at calculation time: rows without a per-row override pick
    /// this up retroactively, because the value is never copied onto them.
    pub fn set_global_tax(&mut self, rate: Rate) -> CartResult<()> {
        validate_rate_bps(rate.bps())?;
        self.globals.tax = rate;
        Ok(())
    }

    /// Sets the cart-wide default discount (same read-time resolution as
    /// the global tax rate).
    pub fn set_global_discount(&mut self, discount: Discount) -> CartResult<()> {
        if let Discount::Rate(rate) = discount {
            validate_rate_bps(rate.bps())?;
        }
        self.globals.discount = discount;
        Ok(())
    }

    /// The globals currently in force.
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// The currency aggregates are denominated in: the first row's, or
    /// USD for an empty cart.
    pub fn currency(&self) -> Currency {
        self.items
            .values()
            .next()
            .map(|item| item.unit_price.currency())
            .unwrap_or(Currency::USD)
    }

    /// Accumulates a per-item amount left-to-right in insertion order.
    /// No re-rounding: per-item amounts are already minor-unit exact.
    fn sum_money<F>(&self, mut amount: F) -> CartResult<Money>
    where
        F: FnMut(&CartItem) -> tally_core::CoreResult<Money>,
    {
        let mut sum = Money::zero(self.currency());
        for item in self.items.values() {
            sum = sum.checked_add(amount(item)?)?;
        }
        Ok(sum)
    }

    /// Gross value: Σ unit price × quantity, before any discount.
    pub fn price(&self) -> CartResult<Money> {
        self.sum_money(|item| item.price_total())
    }

    /// Σ per-row discount amounts.
    pub fn discount(&self) -> CartResult<Money> {
        let globals = self.globals;
        self.sum_money(|item| item.discount_amount(&globals))
    }

    /// Σ per-row taxable bases (post-discount, pre-tax).
    pub fn subtotal(&self) -> CartResult<Money> {
        let globals = self.globals;
        self.sum_money(|item| item.subtotal(&globals))
    }

    /// Σ per-row tax amounts.
    pub fn tax(&self) -> CartResult<Money> {
        let globals = self.globals;
        self.sum_money(|item| item.tax(&globals))
    }

    /// Σ per-row totals (taxable base + tax).
    pub fn total(&self) -> CartResult<Money> {
        let globals = self.globals;
        self.sum_money(|item| item.total(&globals))
    }

    /// Σ per-row total weights.
    pub fn weight(&self) -> f64 {
        self.items.values().map(CartItem::total_weight).sum()
    }

    /// Total units across all rows (Σ quantity).
    pub fn count_items(&self) -> i64 {
        self.items.values().map(|item| item.quantity).sum()
    }

    /// Number of rows in the mapping.
    pub fn count_rows(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart holds no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Creation timestamp adopted from a restored record, if any.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Update timestamp adopted from a restored record, if any.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    // =========================================================================
    // Persistence & Merge
    // =========================================================================

    /// Persists the full cart state under `identifier`.
    ///
    /// ## Behavior
    /// - Fails with `AlreadyStored` (naming the identifier) if a record
    ///   already exists for (identifier, current instance)
    /// - `created_at` carries over a previously adopted creation time (the
    ///   restore/re-store cycle); `updated_at` is always now
    /// - Emits `cart.stored`
    ///
    /// The existence check is a read-then-write and is not atomic against
    /// concurrent external writers; the record gateway's unique constraint
    /// is the final arbiter.
    pub fn store(&mut self, identifier: &str) -> CartResult<()> {
        if self.records.find(identifier, &self.instance).is_some() {
            return Err(CartError::AlreadyStored(identifier.to_string()));
        }

        let now = Utc::now();
        let snapshot = CartSnapshot {
            items: self.items.clone(),
            globals: self.globals,
        };
        self.records.insert(PersistedCartRecord {
            identifier: identifier.to_string(),
            instance: self.instance.clone(),
            content: serde_json::to_string(&snapshot)?,
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        })?;

        debug!(identifier = %identifier, instance = %self.instance, "stored cart");
        self.events.emit(CartEvent::Stored {
            identifier: identifier.to_string(),
            instance: self.instance.clone(),
        });
        Ok(())
    }

    /// Restores the cart stored under `identifier`, consuming the record.
    ///
    /// ## Behavior
    /// - Missing record: benign no-op - current rows untouched, no error
    /// - Present: live rows and globals are REPLACED by the snapshot, the
    ///   record's timestamps become the cart's own, and the record is
    ///   deleted (restore is one-shot)
    /// - Emits `cart.restored`
    pub fn restore(&mut self, identifier: &str) -> CartResult<()> {
        let Some(record) = self.records.find(identifier, &self.instance) else {
            debug!(identifier = %identifier, "no stored cart to restore");
            return Ok(());
        };

        let snapshot: CartSnapshot = serde_json::from_str(&record.content)?;
        self.items = snapshot.items;
        self.globals = snapshot.globals;
        self.created_at = Some(record.created_at);
        self.updated_at = Some(record.updated_at);

        self.records.delete(identifier, &self.instance);
        self.write_session()?;

        debug!(identifier = %identifier, instance = %self.instance, "restored cart");
        self.events.emit(CartEvent::Restored {
            identifier: identifier.to_string(),
            instance: self.instance.clone(),
        });
        Ok(())
    }

    /// Deletes the record stored under `identifier` for the current
    /// instance, if present. Emits `cart.erased`.
    pub fn erase(&mut self, identifier: &str) -> CartResult<()> {
        self.records.delete(identifier, &self.instance);
        debug!(identifier = %identifier, instance = %self.instance, "erased stored cart");
        self.events.emit(CartEvent::Erased {
            identifier: identifier.to_string(),
            instance: self.instance.clone(),
        });
        Ok(())
    }

    /// Folds the cart stored under `identifier` into the live cart,
    /// without consuming the record.
    ///
    /// ## Behavior
    /// - Missing record: returns `false`, cart untouched
    /// - Each source row goes through the `add` path, so identity matches
    ///   combine quantities
    /// - `keep_discount`/`keep_tax` preserve the source rows' *effective*
    ///   values (per-row override, or the source snapshot's global when the
    ///   row had none); when false, the override is cleared so the
    ///   destination cart's globals apply
    /// - `item.added` per source row only when `dispatch_add`; exactly one
    ///   `cart.merged` either way
    pub fn merge(
        &mut self,
        identifier: &str,
        keep_discount: bool,
        keep_tax: bool,
        dispatch_add: bool,
    ) -> CartResult<bool> {
        let Some(record) = self.records.find(identifier, &self.instance) else {
            debug!(identifier = %identifier, "no stored cart to merge");
            return Ok(false);
        };

        let snapshot: CartSnapshot = serde_json::from_str(&record.content)?;
        let source = snapshot.globals;
        let rows = snapshot.items.len();

        for (_, item) in snapshot.items {
            let spec = ItemSpec {
                product_id: item.product_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                weight_per_unit: item.weight_per_unit,
                options: item.options,
                tax_rate: keep_tax.then(|| item.tax_rate.unwrap_or(source.tax)),
                discount: keep_discount.then(|| item.discount.unwrap_or(source.discount)),
                model_ref: item.model_ref,
            };
            self.fold_in(spec, dispatch_add)?;
        }
        self.write_session()?;

        debug!(identifier = %identifier, rows, "merged stored cart");
        self.events.emit(CartEvent::Merged {
            identifier: identifier.to_string(),
            instance: self.instance.clone(),
            rows,
        });
        Ok(true)
    }

    // =========================================================================
    // Session Write-Through
    // =========================================================================

    /// Writes the live item mapping into the session under the instance
    /// key. Called after every mutating operation.
    fn write_session(&self) -> CartResult<()> {
        let payload = serde_json::to_vec(&self.items)?;
        self.session.put(&self.instance, payload);
        Ok(())
    }
}

/// Reads an instance's item mapping back out of the session. A corrupt
/// payload is logged and treated as an empty cart rather than poisoning
/// every subsequent call.
fn load_items(session: &dyn SessionGateway, instance: &str) -> IndexMap<RowId, CartItem> {
    match session.get(instance) {
        None => IndexMap::new(),
        Some(payload) => match serde_json::from_slice(&payload) {
            Ok(items) => items,
            Err(error) => {
                warn!(instance = %instance, %error, "discarding corrupt session payload");
                IndexMap::new()
            }
        },
    }
}

/// Applies an attribute patch to a row. Only present fields are touched;
/// prices and weights are re-validated on the way in.
fn apply_attributes(item: &mut CartItem, attrs: ItemAttributes) -> CartResult<()> {
    if let Some(id) = attrs.id {
        validate_product_id(&id)?;
        item.product_id = id;
    }
    if let Some(name) = attrs.name {
        item.name = name;
    }
    if let Some(qty) = attrs.qty {
        item.quantity = qty;
    }
    if let Some(price) = attrs.price {
        validate_unit_price(&price)?;
        item.unit_price = price;
    }
    if let Some(weight) = attrs.weight {
        validate_weight(weight)?;
        item.weight_per_unit = weight;
    }
    if let Some(options) = attrs.options {
        item.options = options;
    }
    if let Some(rate) = attrs.tax_rate {
        item.tax_rate = Some(rate);
    }
    if let Some(discount) = attrs.discount {
        item.discount = Some(discount);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::gateway::{MemoryRecords, MemoryResolver, MemorySession};
    use crate::input::Buyable;
    use serde_json::json;
    use tally_core::{CartItemOptions, ValidationError};

    struct Harness {
        cart: Cart,
        session: Arc<MemorySession>,
        records: Arc<MemoryRecords>,
        sink: Arc<MemorySink>,
        resolver: Arc<MemoryResolver>,
    }

    fn harness() -> Harness {
        let session = Arc::new(MemorySession::new());
        let records = Arc::new(MemoryRecords::new());
        let sink = Arc::new(MemorySink::new());
        let resolver = Arc::new(MemoryResolver::new());
        let cart = Cart::new(
            session.clone(),
            records.clone(),
            sink.clone(),
            resolver.clone(),
        );
        Harness {
            cart,
            session,
            records,
            sink,
            resolver,
        }
    }

    fn usd(cents: i64) -> Money {
        Money::from_cents(cents, Currency::USD)
    }

    fn spec(id: &str, name: &str, qty: i64, cents: i64) -> ItemSpec {
        ItemSpec::new(id, name, qty, usd(cents))
    }

    fn opts(pairs: &[(&str, &str)]) -> CartItemOptions {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    struct Shirt;

    impl Buyable for Shirt {
        fn identifier(&self) -> String {
            "shirt-01".to_string()
        }
        fn description(&self) -> String {
            "Oxford Shirt".to_string()
        }
        fn price(&self) -> Money {
            usd(2999)
        }
        fn weight(&self) -> f64 {
            0.25
        }
        fn model_type(&self) -> Option<&str> {
            Some("product")
        }
    }

    // =========================================================================
    // Instances
    // =========================================================================

    #[test]
    fn test_new_cart_starts_on_default_instance() {
        let h = harness();
        assert_eq!(h.cart.current_instance(), Cart::DEFAULT_INSTANCE);
        assert!(h.cart.is_empty());
    }

    #[test]
    fn test_instances_partition_rows_and_survive_switching() {
        let mut h = harness();
        h.cart.add(spec("p1", "First", 1, 1000)).unwrap();
        h.cart.set_instance("wishlist");
        assert!(h.cart.is_empty());
        h.cart.add(spec("p2", "Second", 2, 500)).unwrap();
        assert_eq!(h.cart.count_rows(), 1);

        h.cart.set_instance(Cart::DEFAULT_INSTANCE);
        assert_eq!(h.cart.content()[0].product_id, "p1");
        h.cart.set_instance("wishlist");
        assert_eq!(h.cart.content()[0].product_id, "p2");
        assert_eq!(h.cart.count_items(), 2);
    }

    // =========================================================================
    // Adding
    // =========================================================================

    #[test]
    fn test_add_returns_row_and_notifies() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 2, 1099)).unwrap();
        assert_eq!(item.product_id, "p1");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.row_id, RowId::derive("p1", &CartItemOptions::new()));
        assert_eq!(h.sink.names(), vec!["item.added"]);
    }

    #[test]
    fn test_add_from_attributes_defaults_quantity_to_one() {
        let mut h = harness();
        let attrs: ItemAttributes = serde_json::from_value(json!({
            "id": "p1",
            "name": "Widget",
            "price": { "cents": 1000, "currency": "USD" },
        }))
        .unwrap();
        let item = h.cart.add(ItemSpec::from_attributes(attrs).unwrap()).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.unit_price, usd(1000));
    }

    #[test]
    fn test_add_from_buyable_auto_associates_model() {
        let mut h = harness();
        h.resolver.register("product");
        h.resolver
            .put("product", "shirt-01", json!({ "sku": "shirt-01", "color": "blue" }));

        let item = h
            .cart
            .add(ItemSpec::from_buyable(&Shirt, 1, CartItemOptions::new()))
            .unwrap();
        assert_eq!(item.name, "Oxford Shirt");
        let model = h.cart.model(&item.row_id).unwrap();
        assert_eq!(model.unwrap()["color"], "blue");
    }

    #[test]
    fn test_add_many_keeps_insertion_order() {
        let mut h = harness();
        let added = h
            .cart
            .add_many(vec![
                spec("p1", "First", 1, 100),
                spec("p2", "Second", 1, 200),
                spec("p3", "Third", 1, 300),
            ])
            .unwrap();
        assert_eq!(added.len(), 3);
        let ids: Vec<_> = h.cart.content().iter().map(|i| i.product_id.clone()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        assert_eq!(h.sink.count("item.added"), 3);
    }

    #[test]
    fn test_add_rejects_invalid_input() {
        let mut h = harness();
        let err = h.cart.add(spec("", "Widget", 1, 100)).unwrap_err();
        assert!(matches!(
            err,
            CartError::Validation(ValidationError::Required { .. })
        ));
        assert!(h.cart.add(spec("p1", "Widget", 0, 100)).is_err());
        assert!(h.cart.add(spec("p1", "Widget", 1, -5)).is_err());
        assert!(h.cart.is_empty());
        assert_eq!(h.sink.events().len(), 0);
    }

    #[test]
    fn test_add_same_identity_sums_quantities() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        let item = h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        assert_eq!(h.cart.count_rows(), 1);
        assert_eq!(item.quantity, 3);
        assert_eq!(h.sink.count("item.added"), 2);
    }

    #[test]
    fn test_different_options_make_different_rows() {
        let mut h = harness();
        let red = spec("p1", "Shirt", 1, 1000).with_options(opts(&[("color", "red")]));
        let blue = spec("p1", "Shirt", 1, 1000).with_options(opts(&[("color", "blue")]));
        h.cart.add(red).unwrap();
        h.cart.add(blue).unwrap();
        assert_eq!(h.cart.count_rows(), 2);
    }

    // =========================================================================
    // Updating
    // =========================================================================

    #[test]
    fn test_update_quantity_in_place() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        let updated = h
            .cart
            .update(&item.row_id, CartUpdate::Quantity(5))
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(h.sink.names(), vec!["item.added", "item.updated"]);
    }

    #[test]
    fn test_update_attributes_patches_present_fields_only() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        let updated = h
            .cart
            .update(
                &item.row_id,
                CartUpdate::Attributes(ItemAttributes {
                    name: Some("Deluxe Widget".to_string()),
                    price: Some(usd(1500)),
                    ..ItemAttributes::default()
                }),
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Deluxe Widget");
        assert_eq!(updated.unit_price, usd(1500));
        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.row_id, item.row_id);
    }

    #[test]
    fn test_update_to_non_positive_quantity_removes_row() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        let result = h.cart.update(&item.row_id, CartUpdate::Quantity(0)).unwrap();
        assert!(result.is_none());
        assert!(h.cart.is_empty());
        assert_eq!(h.sink.names(), vec!["item.added", "item.removed"]);
    }

    #[test]
    fn test_update_options_rekeys_preserving_position() {
        let mut h = harness();
        h.cart.add(spec("p1", "First", 1, 100)).unwrap();
        let middle = h
            .cart
            .add(spec("p2", "Second", 1, 200).with_options(opts(&[("size", "M")])))
            .unwrap();
        h.cart.add(spec("p3", "Third", 1, 300)).unwrap();

        let updated = h
            .cart
            .update(
                &middle.row_id,
                CartUpdate::Attributes(ItemAttributes {
                    options: Some(opts(&[("size", "L")])),
                    ..ItemAttributes::default()
                }),
            )
            .unwrap()
            .unwrap();

        assert_ne!(updated.row_id, middle.row_id);
        let content = h.cart.content();
        assert_eq!(content[1].row_id, updated.row_id);
        assert_eq!(content[1].options.text("size"), Some("L"));
        assert_eq!(content[0].product_id, "p1");
        assert_eq!(content[2].product_id, "p3");
    }

    #[test]
    fn test_update_options_collision_merges_quantities() {
        let mut h = harness();
        let small = h
            .cart
            .add(spec("p1", "Shirt", 2, 1000).with_options(opts(&[("size", "S")])))
            .unwrap();
        let medium = h
            .cart
            .add(spec("p1", "Shirt", 3, 1000).with_options(opts(&[("size", "M")])))
            .unwrap();

        let survivor = h
            .cart
            .update(
                &medium.row_id,
                CartUpdate::Attributes(ItemAttributes {
                    options: Some(opts(&[("size", "S")])),
                    ..ItemAttributes::default()
                }),
            )
            .unwrap()
            .unwrap();

        assert_eq!(h.cart.count_rows(), 1);
        assert_eq!(survivor.row_id, small.row_id);
        assert_eq!(survivor.quantity, 5);
        assert_eq!(h.sink.count("item.updated"), 1);
    }

    #[test]
    fn test_update_missing_row_fails() {
        let mut h = harness();
        let ghost = RowId::derive("ghost", &CartItemOptions::new());
        let err = h.cart.update(&ghost, CartUpdate::Quantity(1)).unwrap_err();
        assert!(matches!(err, CartError::RowNotFound(_)));
    }

    // =========================================================================
    // Remove / Get / Search / Destroy
    // =========================================================================

    #[test]
    fn test_remove_returns_final_snapshot() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        let removed = h.cart.remove(&item.row_id).unwrap();
        assert_eq!(removed.quantity, 2);
        assert!(h.cart.is_empty());
        assert!(h.cart.get(&item.row_id).is_err());
        assert_eq!(h.sink.names(), vec!["item.added", "item.removed"]);
    }

    #[test]
    fn test_search_filters_in_order() {
        let mut h = harness();
        h.cart.add(spec("p1", "Cheap", 1, 100)).unwrap();
        h.cart.add(spec("p2", "Pricey", 1, 5000)).unwrap();
        h.cart.add(spec("p3", "Cheaper", 1, 50)).unwrap();

        let cheap = h.cart.search(|item, _| item.unit_price.cents() < 1000);
        let ids: Vec<_> = cheap.iter().map(|i| i.product_id.clone()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_destroy_clears_rows_and_session_silently() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.sink.clear();
        h.cart.destroy();
        assert!(h.cart.is_empty());
        assert!(h.session.get(Cart::DEFAULT_INSTANCE).is_none());
        assert!(h.sink.events().is_empty());
    }

    // =========================================================================
    // Model Association
    // =========================================================================

    #[test]
    fn test_associate_rejects_unknown_model_type() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        let err = h.cart.associate(&item.row_id, "ghost-type", "42").unwrap_err();
        assert_eq!(
            err.to_string(),
            "the supplied model type ghost-type does not exist"
        );
    }

    #[test]
    fn test_associate_resolves_lazily() {
        let mut h = harness();
        h.resolver.register("product");
        let item = h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.associate(&item.row_id, "product", "p1").unwrap();

        // Not registered as an object yet, so resolution finds nothing
        assert!(h.cart.model(&item.row_id).unwrap().is_none());
        h.resolver.put("product", "p1", json!({ "name": "Widget" }));
        assert_eq!(h.cart.model(&item.row_id).unwrap().unwrap()["name"], "Widget");
    }

    // =========================================================================
    // Tax & Discount
    // =========================================================================

    #[test]
    fn test_global_tax_applies_at_read_time() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 1, 2000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(2100)).unwrap();

        // The row was added before the global changed and still picks it up
        assert_eq!(h.cart.tax().unwrap(), usd(420));
        assert_eq!(h.cart.total().unwrap(), usd(2420));
        assert!(h.cart.get(&item.row_id).unwrap().tax_rate.is_none());
    }

    #[test]
    fn test_row_tax_override_beats_global() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(2100)).unwrap();
        h.cart.set_tax(&item.row_id, Rate::from_bps(900)).unwrap();
        assert_eq!(h.cart.tax().unwrap(), usd(90));
    }

    #[test]
    fn test_discount_pipeline_per_row() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(1900)).unwrap();
        h.cart
            .set_global_discount(Discount::Rate(Rate::from_bps(5000)))
            .unwrap();

        let row = h.cart.get(&item.row_id).unwrap();
        let globals = *h.cart.globals();
        assert_eq!(row.price_total().unwrap(), usd(2000));
        assert_eq!(row.discount_amount(&globals).unwrap(), usd(1000));
        assert_eq!(row.subtotal(&globals).unwrap(), usd(1000));
        assert_eq!(row.tax(&globals).unwrap(), usd(190));
        assert_eq!(row.total(&globals).unwrap(), usd(1190));
    }

    #[test]
    fn test_discount_aggregates_across_cart() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(1900)).unwrap();
        h.cart
            .set_global_discount(Discount::Rate(Rate::from_bps(5000)))
            .unwrap();

        assert_eq!(h.cart.price().unwrap(), usd(1000));
        assert_eq!(h.cart.discount().unwrap(), usd(500));
        assert_eq!(h.cart.subtotal().unwrap(), usd(500));
        assert_eq!(h.cart.tax().unwrap(), usd(95));
        assert_eq!(h.cart.total().unwrap(), usd(595));
    }

    #[test]
    fn test_amount_discount_is_clamped_to_gross() {
        let mut h = harness();
        let item = h.cart.add(spec("p1", "Widget", 1, 500)).unwrap();
        h.cart
            .set_discount(&item.row_id, Discount::Amount(usd(800)))
            .unwrap();
        assert_eq!(h.cart.discount().unwrap(), usd(500));
        assert_eq!(h.cart.subtotal().unwrap(), usd(0));
    }

    #[test]
    fn test_weight_and_counts() {
        let mut h = harness();
        h.cart
            .add(spec("p1", "Widget", 2, 1000).with_weight(0.5))
            .unwrap();
        h.cart
            .add(spec("p2", "Gadget", 3, 2000).with_weight(0.2))
            .unwrap();
        assert!((h.cart.weight() - 1.6).abs() < 1e-9);
        assert_eq!(h.cart.count_items(), 5);
        assert_eq!(h.cart.count_rows(), 2);
    }

    #[test]
    fn test_mixed_currencies_fail_aggregation() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart
            .add(ItemSpec::new("p2", "Gadget", 1, Money::from_cents(500, Currency::EUR)))
            .unwrap();
        let err = h.cart.total().unwrap_err();
        assert!(matches!(
            err,
            CartError::Core(tally_core::CoreError::CurrencyMismatch { .. })
        ));
    }

    // =========================================================================
    // Session Write-Through
    // =========================================================================

    #[test]
    fn test_state_survives_cart_reconstruction() {
        let h = {
            let mut h = harness();
            h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
            h
        };
        let revived = Cart::new(
            h.session.clone(),
            h.records.clone(),
            h.sink.clone(),
            h.resolver.clone(),
        );
        assert_eq!(revived.count_items(), 2);
        assert_eq!(revived.content()[0].product_id, "p1");
    }

    #[test]
    fn test_corrupt_session_payload_reads_as_empty() {
        let session = Arc::new(MemorySession::new());
        session.put(Cart::DEFAULT_INSTANCE, b"not json".to_vec());
        let cart = Cart::new(
            session,
            Arc::new(MemoryRecords::new()),
            Arc::new(MemorySink::new()),
            Arc::new(MemoryResolver::new()),
        );
        assert!(cart.is_empty());
    }

    // =========================================================================
    // Store / Restore / Erase
    // =========================================================================

    #[test]
    fn test_store_and_restore_round_trip() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(1900)).unwrap();
        h.cart.store("order-42").unwrap();
        assert_eq!(h.records.len(), 1);

        h.cart.destroy();
        assert!(h.cart.is_empty());

        h.cart.restore("order-42").unwrap();
        assert_eq!(h.cart.count_items(), 2);
        assert_eq!(h.cart.globals().tax, Rate::from_bps(1900));
        assert!(h.cart.created_at().is_some());
        // One-shot: the record was consumed
        assert!(h.records.is_empty());
        assert_eq!(h.sink.count("cart.stored"), 1);
        assert_eq!(h.sink.count("cart.restored"), 1);
    }

    #[test]
    fn test_restore_of_missing_identifier_is_a_no_op() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.restore("never-stored").unwrap();
        assert_eq!(h.cart.count_rows(), 1);
        assert_eq!(h.sink.count("cart.restored"), 0);
    }

    #[test]
    fn test_store_twice_fails_naming_the_identifier() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.store("order-42").unwrap();
        let err = h.cart.store("order-42").unwrap_err();
        assert_eq!(
            err.to_string(),
            "a cart with identifier order-42 was already stored"
        );
    }

    #[test]
    fn test_restore_then_store_preserves_creation_time() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.store("order-42").unwrap();
        let original = h.records.find("order-42", Cart::DEFAULT_INSTANCE).unwrap();

        h.cart.restore("order-42").unwrap();
        h.cart.store("order-42").unwrap();
        let stored_again = h.records.find("order-42", Cart::DEFAULT_INSTANCE).unwrap();
        assert_eq!(stored_again.created_at, original.created_at);
        assert!(stored_again.updated_at >= original.updated_at);
    }

    #[test]
    fn test_erase_removes_record_and_notifies() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.store("order-42").unwrap();
        h.cart.erase("order-42").unwrap();
        assert!(h.records.is_empty());
        // Erasing an absent record still notifies
        h.cart.erase("order-42").unwrap();
        assert_eq!(h.sink.count("cart.erased"), 2);
    }

    #[test]
    fn test_storage_is_partitioned_by_instance() {
        let mut h = harness();
        h.cart.add(spec("p1", "Widget", 1, 1000)).unwrap();
        h.cart.store("order-42").unwrap();

        h.cart.set_instance("wishlist");
        h.cart.add(spec("p2", "Gadget", 1, 2000)).unwrap();
        // Same identifier under a different instance is a distinct record
        h.cart.store("order-42").unwrap();
        assert_eq!(h.records.len(), 2);

        h.cart.destroy();
        h.cart.restore("order-42").unwrap();
        assert_eq!(h.cart.content()[0].product_id, "p2");
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Stores a one-row cart (50% global discount, 19% global tax, no
    /// per-row overrides) under `identifier`, leaving the live cart empty.
    fn store_discounted_source(h: &mut Harness, identifier: &str) {
        h.cart.add(spec("p1", "Widget", 2, 1000)).unwrap();
        h.cart.set_global_tax(Rate::from_bps(1900)).unwrap();
        h.cart
            .set_global_discount(Discount::Rate(Rate::from_bps(5000)))
            .unwrap();
        h.cart.store(identifier).unwrap();
        h.cart.destroy();
        h.cart.set_global_tax(Rate::zero()).unwrap();
        h.cart.set_global_discount(Discount::none()).unwrap();
        h.sink.clear();
    }

    #[test]
    fn test_merge_of_missing_identifier_returns_false() {
        let mut h = harness();
        assert!(!h.cart.merge("ghost", false, false, true).unwrap());
        assert!(h.sink.events().is_empty());
    }

    #[test]
    fn test_merge_folds_rows_in_without_consuming_the_record() {
        let mut h = harness();
        store_discounted_source(&mut h, "saved");

        assert!(h.cart.merge("saved", false, false, true).unwrap());
        assert_eq!(h.cart.count_items(), 2);
        assert_eq!(h.records.len(), 1);
        assert_eq!(h.sink.count("item.added"), 1);
        assert_eq!(h.sink.count("cart.merged"), 1);

        // Merging again through the add path doubles the quantity
        assert!(h.cart.merge("saved", false, false, true).unwrap());
        assert_eq!(h.cart.count_rows(), 1);
        assert_eq!(h.cart.count_items(), 4);
    }

    #[test]
    fn test_merge_keep_flags_materialize_source_globals() {
        let mut h = harness();
        store_discounted_source(&mut h, "saved");

        assert!(h.cart.merge("saved", true, true, false).unwrap());
        let row = &h.cart.content()[0];
        // The source row had no overrides, so its effective values came
        // from the source snapshot's globals and were pinned on the way in
        assert_eq!(row.discount, Some(Discount::Rate(Rate::from_bps(5000))));
        assert_eq!(row.tax_rate, Some(Rate::from_bps(1900)));
        assert_eq!(h.cart.discount().unwrap(), usd(1000));
        assert_eq!(h.cart.tax().unwrap(), usd(190));
    }

    #[test]
    fn test_merge_without_keep_flags_adopts_destination_globals() {
        let mut h = harness();
        store_discounted_source(&mut h, "saved");
        h.cart.set_global_tax(Rate::from_bps(900)).unwrap();

        assert!(h.cart.merge("saved", false, false, false).unwrap());
        let row = &h.cart.content()[0];
        assert!(row.discount.is_none());
        assert!(row.tax_rate.is_none());
        assert_eq!(h.cart.discount().unwrap(), usd(0));
        assert_eq!(h.cart.tax().unwrap(), usd(180));
    }

    #[test]
    fn test_merge_can_suppress_add_notifications() {
        let mut h = harness();
        store_discounted_source(&mut h, "saved");

        assert!(h.cart.merge("saved", false, false, false).unwrap());
        assert_eq!(h.sink.count("item.added"), 0);
        assert_eq!(h.sink.count("cart.merged"), 1);
    }
}
