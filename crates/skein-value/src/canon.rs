// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical form, canonical rendering, and SHA-256 fingerprints.
//!
//! The canonical key is a deterministic string rendering of the canonical
//! form; it is the single source of truth for equality, ordering, hashing,
//! and fingerprints. The grammar is fixed: `null`, `true`/`false`, integer
//! digits, shortest-roundtrip float rendering, double-quoted escaped strings,
//! `[..]` for sequences (and canonically sorted sets), `{"key":value,..}` for
//! mappings. Changing it invalidates every fingerprint ever produced.

use std::collections::HashMap;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::Value;

/// Fingerprint of the empty mapping (`{}`), fixed by the canonical grammar.
pub const EMPTY_MAPPING_FINGERPRINT: &str =
    "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

// Pure-function memo: identical canonical keys are hashed once per process.
// Correctness never depends on this table, only repeat-key throughput.
static MEMO: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// SHA-256 fingerprint of a value's canonical form.
///
/// Returns 64 lowercase hex characters. Structurally equal values fingerprint
/// identically regardless of mapping insertion order or set iteration order.
#[must_use]
pub fn fingerprint(value: &Value) -> String {
    let key = value.canonical_key();
    if let Some(hit) = MEMO.lock().get(&key) {
        return hit.clone();
    }
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    MEMO.lock().insert(key, digest.clone());
    digest
}

impl Value {
    /// The canonical form of this value.
    ///
    /// Sets become sequences sorted by their elements' canonical keys,
    /// mappings keep their (already sorted) key order, sequences are
    /// preserved as-is; everything is rebuilt recursively. The input is never
    /// mutated.
    #[must_use]
    pub fn canonical_form(&self) -> Self {
        match self {
            Self::Sequence(items) => {
                Self::Sequence(items.iter().map(Self::canonical_form).collect())
            }
            Self::Set(items) => {
                let mut forms: Vec<Self> = items.iter().map(Self::canonical_form).collect();
                forms.sort_by_key(Self::canonical_key);
                Self::Sequence(forms)
            }
            Self::Mapping(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.canonical_form()))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Deterministic string rendering of the canonical form.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    /// SHA-256 fingerprint of the canonical form; see [`fingerprint`].
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Float(x) => {
                // Shortest-roundtrip rendering; keeps 1.0 distinct from 1.
                let _ = write!(out, "{x:?}");
            }
            Self::String(s) => {
                let _ = write!(out, "{s:?}");
            }
            Self::Sequence(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Set(items) => {
                let mut keys: Vec<String> = items.iter().map(Self::canonical_key).collect();
                keys.sort();
                out.push('[');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(key);
                }
                out.push(']');
            }
            Self::Mapping(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{key:?}:");
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. empty mapping fingerprint is a fixed constant ────────────────

    #[test]
    fn empty_mapping_fingerprint_literal() {
        assert_eq!(Value::mapping().fingerprint(), EMPTY_MAPPING_FINGERPRINT);
    }

    // ── 2. fingerprints ignore mapping insertion order ──────────────────

    #[test]
    fn fingerprint_ignores_key_order() {
        let ab: Value = vec![("a".to_owned(), 1i64), ("b".to_owned(), 2i64)]
            .into_iter()
            .collect();
        let ba: Value = vec![("b".to_owned(), 2i64), ("a".to_owned(), 1i64)]
            .into_iter()
            .collect();
        assert_eq!(ab.fingerprint(), ba.fingerprint());
        // Known literal for {"a":1,"b":2} under the canonical grammar.
        assert_eq!(
            ab.fingerprint(),
            "43258cff783fe7036d8a43033f830adfc60ec037382473548ac742b888292777"
        );
    }

    // ── 3. set fingerprints match the sorted sequence ───────────────────

    #[test]
    fn set_fingerprint_matches_sorted_sequence() {
        let set = Value::set([2i64, 1]);
        let seq = Value::from(vec![1i64, 2]);
        assert_eq!(set.fingerprint(), seq.fingerprint());
        assert_eq!(
            set.fingerprint(),
            "49a64717d5d4cb19952e6eac2946415cf6879adacf9908e7d872332d32c6e684"
        );
    }

    // ── 4. repeated calls are stable (memo is invisible) ────────────────

    #[test]
    fn fingerprint_is_deterministic() {
        let v = Value::set(["x", "y"]);
        let first = v.fingerprint();
        let second = v.fingerprint();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    // ── 5. canonical form never mutates the input ───────────────────────

    #[test]
    fn canonical_form_is_pure() {
        let set = Value::set([3i64, 1, 2]);
        let before = format!("{set:?}");
        let form = set.canonical_form();
        assert_eq!(format!("{set:?}"), before);
        assert!(matches!(form, Value::Sequence(_)));
    }

    // ── 6. canonical grammar spot checks ────────────────────────────────

    #[test]
    fn canonical_grammar() {
        assert_eq!(Value::Null.canonical_key(), "null");
        assert_eq!(Value::Bool(false).canonical_key(), "false");
        assert_eq!(Value::Int(1).canonical_key(), "1");
        assert_eq!(Value::Float(1.0).canonical_key(), "1.0");
        assert_eq!(Value::from("a\"b").canonical_key(), "\"a\\\"b\"");
        assert_eq!(Value::from(vec![1i64, 2]).canonical_key(), "[1,2]");
        let mut map = Value::mapping();
        map.insert("k", Value::Null);
        assert_eq!(map.canonical_key(), "{\"k\":null}");
    }
}
