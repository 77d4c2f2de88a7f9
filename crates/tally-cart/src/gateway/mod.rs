//! # Gateways
//!
//! The cart's view of the outside world, as traits.
//!
//! ## Collaborator Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Collaborators                               │
//! │                                                                         │
//! │  SessionGateway   - live item mapping per instance, written through    │
//! │                     after every mutating call                           │
//! │  RecordGateway    - durable cart records keyed (identifier, instance)  │
//! │  ModelResolver    - lazy lookup of external models by (type, key)      │
//! │                                                                         │
//! │  The cart issues no locking of its own: both stores are assumed        │
//! │  read-after-write consistent and single-writer-per-key. The record     │
//! │  gateway must reject (or serialize) concurrent inserts for the same    │
//! │  key; the cart's own store precondition is a read-then-write and is    │
//! │  NOT atomic against concurrent external writers.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All trait methods take `&self`; implementations use interior mutability
//! where they need it, so a cart can hold `Arc<dyn ...>` handles.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CartResult;

pub use memory::{MemoryRecords, MemoryResolver, MemorySession};

// =============================================================================
// Persisted Cart Record
// =============================================================================

/// A full cart state persisted under an external identifier.
///
/// ## Invariant
/// At most one live record exists per (identifier, instance) pair at any
/// time; `RecordGateway::insert` enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCartRecord {
    /// External key the cart was stored under (e.g., a user id).
    pub identifier: String,
    /// Named cart instance the record belongs to.
    pub instance: String,
    /// Serialized cart snapshot (JSON), sufficient for exact reconstruction.
    pub content: String,
    /// When the cart was first stored.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Session Gateway
// =============================================================================

/// Keyed live-state store scoped to the enclosing session/request context.
///
/// The key is the cart instance name; the payload is the serialized item
/// mapping. The cart writes through after every mutating call.
pub trait SessionGateway: Send + Sync {
    /// Reads the payload stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `payload` under `key`, replacing any previous value.
    fn put(&self, key: &str, payload: Vec<u8>);

    /// Removes the payload stored under `key`.
    fn delete(&self, key: &str);
}

// =============================================================================
// Record Gateway
// =============================================================================

/// Durable record store keyed by (identifier, instance).
pub trait RecordGateway: Send + Sync {
    /// Looks up the record for a (identifier, instance) pair.
    fn find(&self, identifier: &str, instance: &str) -> Option<PersistedCartRecord>;

    /// Inserts a record.
    ///
    /// ## Errors
    /// `CartError::DuplicateRecord` if a record already exists for the
    /// (identifier, instance) pair.
    fn insert(&self, record: PersistedCartRecord) -> CartResult<()>;

    /// Replaces the record for the pair, inserting if absent.
    fn update(&self, record: PersistedCartRecord);

    /// Deletes the record for the pair if present.
    fn delete(&self, identifier: &str, instance: &str);
}

// =============================================================================
// Model Resolver
// =============================================================================

/// Lazy resolver for external models referenced by cart rows.
///
/// Rows store only an opaque (type tag, key) reference; this collaborator
/// turns it into data when - and only when - a caller asks.
pub trait ModelResolver: Send + Sync {
    /// Whether the resolver knows the given type tag at all.
    ///
    /// `associate` consults this before recording a reference; it never
    /// fetches the referenced object.
    fn recognizes(&self, type_tag: &str) -> bool;

    /// Resolves a reference to the external object, if it exists.
    fn resolve(&self, type_tag: &str, key: &str) -> Option<serde_json::Value>;
}
