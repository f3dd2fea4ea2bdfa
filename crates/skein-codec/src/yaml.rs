// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! YAML backend. Same flattening rules as the JSON backend: sets become
//! sequences, extension values become display strings.

use std::collections::BTreeMap;

use serde_yaml::Value as Yaml;

use crate::record::Wire;
use crate::{CodecError, Result};

pub(crate) fn encode(fields: &BTreeMap<String, Wire>) -> Result<Vec<u8>> {
    let value = yaml_of_map(fields);
    serde_yaml::to_string(&value)
        .map(String::into_bytes)
        .map_err(|err| CodecError::Malformed(format!("yaml encode: {err}")))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<BTreeMap<String, Wire>> {
    let value: Yaml = serde_yaml::from_slice(bytes)
        .map_err(|err| CodecError::Malformed(format!("yaml decode: {err}")))?;
    match value {
        Yaml::Mapping(entries) => map_of_yaml(entries),
        _ => Err(CodecError::Malformed(
            "top-level yaml value is not a mapping".to_owned(),
        )),
    }
}

fn yaml_of_map(fields: &BTreeMap<String, Wire>) -> Yaml {
    Yaml::Mapping(
        fields
            .iter()
            .map(|(k, v)| (Yaml::String(k.clone()), yaml_of_wire(v)))
            .collect(),
    )
}

fn yaml_of_wire(wire: &Wire) -> Yaml {
    match wire {
        Wire::Null => Yaml::Null,
        Wire::Bool(b) => Yaml::Bool(*b),
        Wire::Int(n) => Yaml::Number((*n).into()),
        Wire::Float(x) => Yaml::Number((*x).into()),
        Wire::Text(s) => Yaml::String(s.clone()),
        Wire::Seq(items) | Wire::Set(items) => {
            Yaml::Sequence(items.iter().map(yaml_of_wire).collect())
        }
        Wire::Map(map) => yaml_of_map(map),
        Wire::Ext { display, .. } => Yaml::String(display.clone()),
    }
}

fn map_of_yaml(entries: serde_yaml::Mapping) -> Result<BTreeMap<String, Wire>> {
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let Yaml::String(key) = key else {
            return Err(CodecError::Malformed("non-string mapping key".to_owned()));
        };
        map.insert(key, wire_of_yaml(value)?);
    }
    Ok(map)
}

fn wire_of_yaml(value: Yaml) -> Result<Wire> {
    match value {
        Yaml::Null => Ok(Wire::Null),
        Yaml::Bool(b) => Ok(Wire::Bool(b)),
        Yaml::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_f64()
                    .map(Wire::Float)
                    .ok_or_else(|| CodecError::Malformed(format!("unrepresentable number {n}")))
            },
            |i| Ok(Wire::Int(i)),
        ),
        Yaml::String(s) => Ok(Wire::Text(s)),
        Yaml::Sequence(items) => Ok(Wire::Seq(
            items
                .into_iter()
                .map(wire_of_yaml)
                .collect::<Result<Vec<_>>>()?,
        )),
        Yaml::Mapping(entries) => Ok(Wire::Map(map_of_yaml(entries)?)),
        Yaml::Tagged(_) => Err(CodecError::Malformed("unexpected yaml tag".to_owned())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. nested fields round-trip through text ────────────────────────

    #[test]
    fn round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), Wire::Text("demo".to_owned()));
        fields.insert(
            "nested".to_owned(),
            Wire::Map(BTreeMap::from([(
                "items".to_owned(),
                Wire::Seq(vec![Wire::Int(1), Wire::Float(2.5), Wire::Null]),
            )])),
        );
        let bytes = encode(&fields).unwrap();
        assert_eq!(decode(&bytes).unwrap(), fields);
    }

    // ── 2. output is a readable document ────────────────────────────────

    #[test]
    fn human_readable() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), Wire::Text("demo".to_owned()));
        let text = String::from_utf8(encode(&fields).unwrap()).unwrap();
        assert!(text.contains("name: demo"));
    }
}
