//! # Cart Item Options
//!
//! The option set attached to a cart row (size, color, engraving, ...).
//!
//! ## Options Affect Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ("SHIRT-1", {size: XL, color: red})  ──►  rowId A                      │
//! │  ("SHIRT-1", {size: XL, color: blue}) ──►  rowId B                      │
//! │  ("SHIRT-1", {color: red, size: XL})  ──►  rowId A (order irrelevant)   │
//! │                                                                         │
//! │  Two option sets are identity-equivalent iff their canonical            │
//! │  serializations are byte-equal. Canonical = keys sorted (free with      │
//! │  the BTreeMap backing), values stringified, delimiters escaped.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Option Value
// =============================================================================

/// A scalar option value.
///
/// Deserialization is untagged: JSON booleans become flags, integers become
/// integers, other numbers become decimals, strings become text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean option (e.g., gift wrap).
    Flag(bool),
    /// Whole-number option (e.g., length in cm).
    Integer(i64),
    /// Fractional option.
    Decimal(f64),
    /// Free-text option (e.g., color name).
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(value) => write!(f, "{value}"),
            OptionValue::Integer(value) => write!(f, "{value}"),
            OptionValue::Decimal(value) => write!(f, "{value}"),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

// =============================================================================
// Cart Item Options
// =============================================================================

/// An immutable mapping of option name → scalar value.
///
/// Backed by a `BTreeMap` so iteration (and therefore the canonical
/// serialization used for identity hashing) is always key-sorted,
/// independent of insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemOptions(BTreeMap<String, OptionValue>);

impl CartItemOptions {
    /// Creates an empty option set.
    pub fn new() -> Self {
        CartItemOptions(BTreeMap::new())
    }

    /// Looks up an option by name.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Looks up a text option by name.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(OptionValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Checks whether an option is present.
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of options in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Canonical serialization used for identity hashing.
    ///
    /// `key=value;` pairs in key order, with `\`, `=` and `;` inside keys
    /// and values escaped by a backslash. Deterministic and injective:
    /// equal option sets always produce byte-equal output regardless of
    /// insertion order, and distinct option sets never collide - a value
    /// containing a literal delimiter cannot masquerade as extra pairs.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            escape_into(&mut out, key);
            out.push('=');
            escape_into(&mut out, &value.to_string());
            out.push(';');
        }
        out
    }
}

/// Appends `raw` with the canonical delimiters (and the escape character
/// itself) backslash-escaped.
fn escape_into(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if matches!(ch, '\\' | '=' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for CartItemOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CartItemOptions(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
