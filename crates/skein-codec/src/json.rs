// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON backend. Pretty-printed; sets flatten to arrays and extension
//! values appear as their display strings (the schema-driven reader
//! restores the typed forms on decode).

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::record::Wire;
use crate::{CodecError, Result};

pub(crate) fn encode(fields: &BTreeMap<String, Wire>) -> Result<Vec<u8>> {
    let value = json_of_map(fields)?;
    serde_json::to_vec_pretty(&value)
        .map_err(|err| CodecError::Malformed(format!("json encode: {err}")))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<BTreeMap<String, Wire>> {
    let value: Json = serde_json::from_slice(bytes)
        .map_err(|err| CodecError::Malformed(format!("json decode: {err}")))?;
    match value {
        Json::Object(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((k, wire_of_json(v))))
            .collect(),
        _ => Err(CodecError::Malformed(
            "top-level json value is not an object".to_owned(),
        )),
    }
}

fn json_of_map(fields: &BTreeMap<String, Wire>) -> Result<Json> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), json_of_wire(v)?)))
        .collect::<Result<serde_json::Map<String, Json>>>()
        .map(Json::Object)
}

fn json_of_wire(wire: &Wire) -> Result<Json> {
    match wire {
        Wire::Null => Ok(Json::Null),
        Wire::Bool(b) => Ok(Json::Bool(*b)),
        Wire::Int(n) => Ok(Json::from(*n)),
        Wire::Float(x) => serde_json::Number::from_f64(*x)
            .map(Json::Number)
            .ok_or_else(|| CodecError::Malformed(format!("non-finite float {x}"))),
        Wire::Text(s) => Ok(Json::String(s.clone())),
        // The human formats have no set container.
        Wire::Seq(items) | Wire::Set(items) => Ok(Json::Array(
            items.iter().map(json_of_wire).collect::<Result<Vec<_>>>()?,
        )),
        Wire::Map(map) => json_of_map(map),
        Wire::Ext { display, .. } => Ok(Json::String(display.clone())),
    }
}

fn wire_of_json(value: Json) -> Wire {
    match value {
        Json::Null => Wire::Null,
        Json::Bool(b) => Wire::Bool(b),
        Json::Number(n) => n
            .as_i64()
            .map_or_else(|| Wire::Float(n.as_f64().unwrap_or(f64::NAN)), Wire::Int),
        Json::String(s) => Wire::Text(s),
        Json::Array(items) => Wire::Seq(items.into_iter().map(wire_of_json).collect()),
        Json::Object(entries) => Wire::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, wire_of_json(v)))
                .collect(),
        ),
    }
}
