// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural operations on values: recursive merge and empty-stripping.

use crate::Value;

impl Value {
    /// Merge `other` into `self`, recursively.
    ///
    /// Mapping entries merge key-by-key; for any non-mapping leaf (including
    /// sequences and sets, which are replaced whole rather than merged
    /// element-wise) the value from `other` wins.
    #[must_use]
    pub fn deep_merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Mapping(mut base), Self::Mapping(patch)) => {
                for (key, incoming) in patch {
                    let merged = match base.remove(&key) {
                        Some(existing) => existing.deep_merge(incoming),
                        None => incoming,
                    };
                    base.insert(key, merged);
                }
                Self::Mapping(base)
            }
            (_, other) => other,
        }
    }

    /// A copy with empty leaves removed, recursively.
    ///
    /// Mapping entries and sequence/set elements are dropped when their value
    /// is `Null`, `false`, an empty string, or an empty container (after its
    /// own stripping). Numeric zero is *not* empty and is retained. Supports
    /// producing a minimal canonical export for display or serialization.
    #[must_use]
    pub fn strip_empty(&self) -> Self {
        match self {
            Self::Sequence(items) => Self::Sequence(Self::strip_items(items)),
            Self::Set(items) => Self::Set(Self::strip_items(items)),
            Self::Mapping(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.strip_empty()))
                    .filter(|(_, v)| v.is_retained())
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    fn strip_items(items: &[Self]) -> Vec<Self> {
        items
            .iter()
            .map(Self::strip_empty)
            .filter(Self::is_retained)
            .collect()
    }

    // Retention rule: numbers always survive (zero included), containers
    // survive when non-empty, Null/false/"" do not.
    fn is_retained(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(_) | Self::Float(_) => true,
            Self::String(s) => !s.is_empty(),
            Self::Sequence(items) | Self::Set(items) => !items.is_empty(),
            Self::Mapping(map) => !map.is_empty(),
        }
    }
}
