//! # Row Identity
//!
//! Content-derived identity for cart rows.
//!
//! ## Identity Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  rowId = SHA-256(product_id ‖ 0x00 ‖ canonical(options))[..16]          │
//! │                                                                         │
//! │  - Deterministic: same (product, options) always hashes the same        │
//! │  - Collision-resistant: 128 bits of a cryptographic digest              │
//! │  - Pure: no state, no side effects                                      │
//! │                                                                         │
//! │  The 0x00 separator keeps ("ab", "c=1;") and ("a", "bc=1;") distinct.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Adding the same product with the same options twice must land on the
//! same row; changing an option produces a different rowId, which is how
//! the cart decides between re-keying a row and merging two rows.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::options::CartItemOptions;

/// Content-derived identity of a cart row: 128 bits of a SHA-256 digest
/// over the product identifier and the canonical option serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId([u8; 16]);

impl RowId {
    /// Derives the row identity for a (product, options) pair.
    ///
    /// Pure and deterministic: equal inputs always yield the same RowId.
    pub fn derive(product_id: &str, options: &CartItemOptions) -> RowId {
        let mut hasher = Sha256::new();
        hasher.update(product_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(options.canonical().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        RowId(bytes)
    }

    /// Returns the raw identity bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Renders the identity as 32 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parses a RowId from its hex rendering.
    pub fn from_hex(s: &str) -> CoreResult<Self> {
        if s.len() != 32 {
            return Err(CoreError::InvalidRowId {
                raw: s.to_string(),
                reason: format!("must be 32 hex chars (got {})", s.len()),
            });
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| CoreError::InvalidRowId {
                raw: s.to_string(),
                reason: "contains invalid UTF-8".to_string(),
            })?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| CoreError::InvalidRowId {
                raw: s.to_string(),
                reason: format!("contains invalid hex: {}", hex),
            })?;
        }
        Ok(RowId(bytes))
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.to_hex())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for RowId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RowId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
