// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical, order-stable, recursively hashable value model.
//!
//! [`Value`] is a tagged union over primitive scalars, ordered sequences,
//! unordered sets, and string-keyed mappings. Equality, ordering, and hashing
//! are defined over the *canonical form*: mapping keys sorted
//! lexicographically, set elements sorted by their own canonical rendering,
//! sequence order preserved. Two values built from differently-ordered inputs
//! therefore compare equal and fingerprint identically.
//!
//! # Numeric tags
//!
//! `Int` and `Float` are distinct tags. `Value::Int(1)` and
//! `Value::Float(1.0)` render differently in the canonical form (`1` vs
//! `1.0`) and never collide in equality or fingerprints. Booleans are their
//! own tag and are never coerced to `0`/`1`.

mod canon;
mod ops;

pub use canon::{fingerprint, EMPTY_MAPPING_FINGERPRINT};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A canonical value.
///
/// Construction is statically restricted to the supported tag set: native
/// containers convert through `From`/`FromIterator` impls, recursively. Values
/// are freely mutable while staged; any hash or fingerprint taken reflects the
/// state at call time (nothing is cached across mutation).
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent / null.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// UTF-8 string scalar.
    String(String),
    /// Ordered sequence; element order is significant.
    Sequence(Vec<Value>),
    /// Unordered set; element order is insignificant. Deduplicated by
    /// canonical rendering on construction via [`Value::set`].
    Set(Vec<Value>),
    /// String-keyed mapping; `BTreeMap` keeps keys lexicographically sorted
    /// by construction.
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Build a set from an iterator, deduplicating by canonical rendering.
    ///
    /// Insertion order of the surviving elements is kept internally; it is
    /// irrelevant to equality, ordering, and fingerprints.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for item in items {
            let value = item.into();
            if seen.insert(value.canonical_key()) {
                out.push(value);
            }
        }
        Self::Set(out)
    }

    /// Build an empty mapping.
    #[must_use]
    pub fn mapping() -> Self {
        Self::Mapping(BTreeMap::new())
    }

    /// Look up `key` when this value is a mapping.
    ///
    /// Returns `None` for absent keys and for non-mapping values.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Mutable variant of [`Value::get`].
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Self> {
        match self {
            Self::Mapping(map) => map.get_mut(key),
            _ => None,
        }
    }

    /// Insert `key` into a mapping, returning the previous value.
    ///
    /// Returns `None` (and inserts nothing) when this value is not a mapping.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Self>) -> Option<Self> {
        match self {
            Self::Mapping(map) => map.insert(key.into(), value.into()),
            _ => None,
        }
    }

    /// Remove `key` from a mapping, returning the removed value.
    pub fn remove(&mut self, key: &str) -> Option<Self> {
        match self {
            Self::Mapping(map) => map.remove(key),
            _ => None,
        }
    }

    /// Number of elements (mapping entries, sequence/set elements).
    ///
    /// Scalars report 0.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sequence(items) | Self::Set(items) => items.len(),
            Self::Mapping(map) => map.len(),
            _ => 0,
        }
    }

    /// Whether the value is an empty container (or any scalar).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View as `&str` when this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// View as `i64` when this is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// View as `f64` when this is a float.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// View as `bool` when this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View the element list of a sequence or set.
    #[must_use]
    pub fn as_items(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// View the entry map of a mapping.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

// Equality, ordering, and hashing are all defined over the canonical key so
// that differently-ordered inputs (mapping insertion order, set iteration
// order) collapse to the same identity.

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_key().cmp(&other.canonical_key())
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(items: BTreeSet<T>) -> Self {
        Self::set(items)
    }
}

impl<T: Into<Value>> From<HashSet<T>> for Value {
    fn from(items: HashSet<T>) -> Self {
        Self::set(items)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Self::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        Self::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> FromIterator<(String, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self::Mapping(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::Sequence(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            // Sets serialize as their canonically sorted sequence so export
            // output is deterministic regardless of insertion order.
            Self::Set(_) => self.canonical_form().serialize(serializer),
            Self::Mapping(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    entries.serialize_entry(key, value)?;
                }
                entries.end()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. mapping key order is canonical ───────────────────────────────

    #[test]
    fn mapping_key_order_is_irrelevant() {
        let a: Value = vec![("a".to_owned(), 1i64), ("b".to_owned(), 2i64)]
            .into_iter()
            .collect();
        let b: Value = vec![("b".to_owned(), 2i64), ("a".to_owned(), 1i64)]
            .into_iter()
            .collect();
        assert_eq!(a, b);
    }

    // ── 2. set element order is irrelevant, sequence order matters ──────

    #[test]
    fn set_order_irrelevant_sequence_order_significant() {
        let s1 = Value::set([3i64, 1, 2]);
        let s2 = Value::set([1i64, 2, 3]);
        assert_eq!(s1, s2);

        let q1 = Value::from(vec![3i64, 1, 2]);
        let q2 = Value::from(vec![1i64, 2, 3]);
        assert_ne!(q1, q2);
    }

    // ── 3. set equals its sorted sequence (cross-container canonical eq) ─

    #[test]
    fn set_equals_sorted_sequence() {
        let set = Value::set([2i64, 1]);
        let seq = Value::from(vec![1i64, 2]);
        assert_eq!(set, seq);
    }

    // ── 4. sets deduplicate on construction ─────────────────────────────

    #[test]
    fn set_deduplicates() {
        let set = Value::set([1i64, 1, 2]);
        assert_eq!(set.len(), 2);
    }

    // ── 5. int and float never collide ──────────────────────────────────

    #[test]
    fn int_float_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    // ── 6. mapping accessors ────────────────────────────────────────────

    #[test]
    fn mapping_accessors() {
        let mut v = Value::mapping();
        assert!(v.insert("name", "demo").is_none());
        assert_eq!(v.get("name").and_then(Value::as_str), Some("demo"));
        assert_eq!(v.len(), 1);
        let old = v.insert("name", "other").unwrap();
        assert_eq!(old.as_str(), Some("demo"));
        assert!(v.remove("name").is_some());
        assert!(v.is_empty());
        // Accessors on non-mappings are inert.
        let mut n = Value::Int(1);
        assert!(n.get("x").is_none());
        assert!(n.insert("x", 1i64).is_none());
    }

    // ── 7. nested structures compare canonically ────────────────────────

    #[test]
    fn nested_canonical_equality() {
        let mut inner_a = Value::mapping();
        inner_a.insert("x", Value::set(["b", "a"]));
        inner_a.insert("y", 0i64);
        let mut outer_a = Value::mapping();
        outer_a.insert("inner", inner_a);

        let mut inner_b = Value::mapping();
        inner_b.insert("y", 0i64);
        inner_b.insert("x", Value::set(["a", "b"]));
        let mut outer_b = Value::mapping();
        outer_b.insert("inner", inner_b);

        assert_eq!(outer_a, outer_b);
    }

    // ── 8. hash agrees with equality ────────────────────────────────────

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let a = Value::set([3i64, 1, 2]);
        let b = Value::set([2i64, 3, 1]);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
