// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary backend: CBOR with tagged sets and extension values.
//!
//! Sets travel under tag 258 (the registered CBOR set tag) wrapping an
//! array; extension values travel as tagged byte strings in a private tag
//! range, `EXT_TAG_BASE + code`.

use std::collections::BTreeMap;

use ciborium::value::Value as Cbor;

use crate::record::Wire;
use crate::{CodecError, Result};

/// IANA-registered tag for mathematical sets.
const SET_TAG: u64 = 258;

/// Base of the private tag range carrying extension codes.
const EXT_TAG_BASE: u64 = 40_000;

pub(crate) fn encode(fields: &BTreeMap<String, Wire>) -> Result<Vec<u8>> {
    let value = cbor_of_map(fields);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&value, &mut buf)
        .map_err(|err| CodecError::Malformed(format!("cbor encode: {err}")))?;
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<BTreeMap<String, Wire>> {
    let value: Cbor = ciborium::de::from_reader(bytes)
        .map_err(|err| CodecError::Malformed(format!("cbor decode: {err}")))?;
    match value {
        Cbor::Map(entries) => map_of_cbor(entries),
        _ => Err(CodecError::Malformed(
            "top-level cbor value is not a map".to_owned(),
        )),
    }
}

fn cbor_of_map(fields: &BTreeMap<String, Wire>) -> Cbor {
    Cbor::Map(
        fields
            .iter()
            .map(|(k, v)| (Cbor::Text(k.clone()), cbor_of_wire(v)))
            .collect(),
    )
}

fn cbor_of_wire(wire: &Wire) -> Cbor {
    match wire {
        Wire::Null => Cbor::Null,
        Wire::Bool(b) => Cbor::Bool(*b),
        Wire::Int(n) => Cbor::Integer((*n).into()),
        Wire::Float(x) => Cbor::Float(*x),
        Wire::Text(s) => Cbor::Text(s.clone()),
        Wire::Seq(items) => Cbor::Array(items.iter().map(cbor_of_wire).collect()),
        Wire::Set(items) => Cbor::Tag(
            SET_TAG,
            Box::new(Cbor::Array(items.iter().map(cbor_of_wire).collect())),
        ),
        Wire::Map(map) => cbor_of_map(map),
        Wire::Ext { code, data, .. } => Cbor::Tag(
            EXT_TAG_BASE + u64::from(*code),
            Box::new(Cbor::Bytes(data.clone())),
        ),
    }
}

fn map_of_cbor(entries: Vec<(Cbor, Cbor)>) -> Result<BTreeMap<String, Wire>> {
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let Cbor::Text(key) = key else {
            return Err(CodecError::Malformed("non-string map key".to_owned()));
        };
        map.insert(key, wire_of_cbor(value)?);
    }
    Ok(map)
}

fn wire_of_cbor(value: Cbor) -> Result<Wire> {
    match value {
        Cbor::Null => Ok(Wire::Null),
        Cbor::Bool(b) => Ok(Wire::Bool(b)),
        Cbor::Integer(n) => i64::try_from(n)
            .map(Wire::Int)
            .map_err(|_| CodecError::Malformed("integer out of i64 range".to_owned())),
        Cbor::Float(x) => Ok(Wire::Float(x)),
        Cbor::Text(s) => Ok(Wire::Text(s)),
        Cbor::Bytes(_) => Err(CodecError::Malformed(
            "bare byte string outside an extension tag".to_owned(),
        )),
        Cbor::Array(items) => Ok(Wire::Seq(
            items
                .into_iter()
                .map(wire_of_cbor)
                .collect::<Result<Vec<_>>>()?,
        )),
        Cbor::Map(entries) => Ok(Wire::Map(map_of_cbor(entries)?)),
        Cbor::Tag(tag, inner) => wire_of_tag(tag, *inner),
        _ => Err(CodecError::Malformed("unsupported cbor value".to_owned())),
    }
}

fn wire_of_tag(tag: u64, inner: Cbor) -> Result<Wire> {
    if tag == SET_TAG {
        let Cbor::Array(items) = inner else {
            return Err(CodecError::Malformed("set tag on a non-array".to_owned()));
        };
        return Ok(Wire::Set(
            items
                .into_iter()
                .map(wire_of_cbor)
                .collect::<Result<Vec<_>>>()?,
        ));
    }
    if let Some(code) = tag.checked_sub(EXT_TAG_BASE) {
        if let Ok(code) = u8::try_from(code) {
            let Cbor::Bytes(data) = inner else {
                return Err(CodecError::Malformed(
                    "extension tag on a non-byte-string".to_owned(),
                ));
            };
            return Ok(Wire::Ext {
                code,
                data,
                display: String::new(),
            });
        }
    }
    Err(CodecError::Malformed(format!("unexpected cbor tag {tag}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. every wire shape survives the binary round trip ──────────────

    #[test]
    fn wire_round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert("null".to_owned(), Wire::Null);
        fields.insert("flag".to_owned(), Wire::Bool(true));
        fields.insert("count".to_owned(), Wire::Int(-7));
        fields.insert("ratio".to_owned(), Wire::Float(2.5));
        fields.insert("name".to_owned(), Wire::Text("skein".to_owned()));
        fields.insert(
            "seq".to_owned(),
            Wire::Seq(vec![Wire::Int(1), Wire::Int(2)]),
        );
        fields.insert(
            "set".to_owned(),
            Wire::Set(vec![Wire::Text("a".to_owned()), Wire::Text("b".to_owned())]),
        );
        fields.insert(
            "ext".to_owned(),
            Wire::Ext {
                code: 1,
                data: b"/tmp/x".to_vec(),
                display: String::new(),
            },
        );
        let bytes = encode(&fields).unwrap();
        assert_eq!(decode(&bytes).unwrap(), fields);
    }

    // ── 2. sets and sequences stay distinct on the wire ─────────────────

    #[test]
    fn set_tag_distinguishes() {
        let mut as_set = BTreeMap::new();
        as_set.insert("v".to_owned(), Wire::Set(vec![Wire::Int(1)]));
        let mut as_seq = BTreeMap::new();
        as_seq.insert("v".to_owned(), Wire::Seq(vec![Wire::Int(1)]));
        assert_ne!(encode(&as_set).unwrap(), encode(&as_seq).unwrap());
    }

    // ── 3. garbage bytes are malformed, not a panic ─────────────────────

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode(&[0xff, 0x00, 0x13]),
            Err(CodecError::Malformed(_))
        ));
    }
}
