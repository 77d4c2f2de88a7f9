//! # Cart Events
//!
//! Fire-and-forget notifications announcing cart mutations.
//!
//! ## Event Names
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  item.added      - a row was created or its quantity increased          │
//! │  item.updated    - a row was mutated (qty, options, price, ...)         │
//! │  item.removed    - a row was deleted (explicitly or via qty <= 0)       │
//! │  cart.stored     - the cart was persisted under an identifier           │
//! │  cart.restored   - a persisted cart replaced the live state             │
//! │  cart.erased     - a persisted record was deleted                       │
//! │  cart.merged     - a persisted cart was folded into the live state      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core never observes a return value from the sink; a sink that drops
//! events on the floor (like [`NullSink`]) is a valid implementation.

use std::sync::Mutex;

use tally_core::CartItem;

// =============================================================================
// Cart Event
// =============================================================================

/// A cart mutation notification, carrying the affected snapshots.
#[derive(Debug, Clone)]
pub enum CartEvent {
    /// A row was created, or an existing row's quantity was increased.
    ItemAdded(CartItem),
    /// A row was mutated in place or re-keyed.
    ItemUpdated(CartItem),
    /// A row was deleted.
    ItemRemoved(CartItem),
    /// The cart was persisted under `identifier`.
    Stored { identifier: String, instance: String },
    /// A persisted cart replaced the live state and was consumed.
    Restored { identifier: String, instance: String },
    /// The persisted record for `identifier` was deleted.
    Erased { identifier: String, instance: String },
    /// A persisted cart was folded into the live state.
    Merged {
        identifier: String,
        instance: String,
        /// Number of source rows folded in.
        rows: usize,
    },
}

impl CartEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            CartEvent::ItemAdded(_) => "item.added",
            CartEvent::ItemUpdated(_) => "item.updated",
            CartEvent::ItemRemoved(_) => "item.removed",
            CartEvent::Stored { .. } => "cart.stored",
            CartEvent::Restored { .. } => "cart.restored",
            CartEvent::Erased { .. } => "cart.erased",
            CartEvent::Merged { .. } => "cart.merged",
        }
    }
}

// =============================================================================
// Event Sink
// =============================================================================

/// Fire-and-forget notification channel for cart mutations.
pub trait EventSink: Send + Sync {
    /// Delivers an event. Failures are the sink's problem, not the cart's.
    fn emit(&self, event: CartEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CartEvent) {}
}

/// Sink that records every event, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CartEvent>>,
}

impl MemorySink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<CartEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The wire names of all recorded events, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CartEvent::name).collect()
    }

    /// Number of recorded events with the given wire name.
    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CartEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
