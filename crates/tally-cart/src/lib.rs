//! # Tally Cart
//!
//! The cart engine: session-backed mutable carts with content-derived row
//! identity, read-time tax/discount fallback, named instances, and a
//! store/restore/merge persistence protocol over pluggable gateways.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          tally-cart                                     │
//! │                                                                         │
//! │   input    normalization of the three add shapes into one ItemSpec      │
//! │   cart     the Cart itself: mutation, aggregates, persistence           │
//! │   events   CartEvent + EventSink (item.* / cart.* notifications)        │
//! │   gateway  SessionGateway / RecordGateway / ModelResolver traits        │
//! │            + in-memory implementations for tests and embedding          │
//! │   error    CartError over tally-core's CoreError                        │
//! │                                                                         │
//! │   pure value types (Money, Rate, RowId, CartItem, ...) ──► tally-core   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod error;
pub mod events;
pub mod gateway;
pub mod input;

pub use cart::Cart;
pub use error::{CartError, CartResult};
pub use events::{CartEvent, EventSink, MemorySink, NullSink};
pub use gateway::{
    MemoryRecords, MemoryResolver, MemorySession, ModelResolver, PersistedCartRecord,
    RecordGateway, SessionGateway,
};
pub use input::{Buyable, CartUpdate, ItemAttributes, ItemSpec};
