// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed-record multi-format codec.
//!
//! Records implement [`Record`]: a stable wire tag, a string identity, and
//! hand-written field encode/decode against [`FieldWriter`]/[`FieldReader`]
//! (wrapper writer/reader types keep the strict schema and extension
//! dispatch explicit, instead of hiding them behind derive).
//!
//! [`RecordCodec`] resolves two axes of polymorphism through registries it
//! owns (never process-wide singletons):
//!
//! - **Tagged-union decode** — the payload carries a `"type"` envelope field;
//!   [`RecordCodec::decode_any`] dispatches on it among registered record
//!   types, and decoding an unregistered tag fails with
//!   [`CodecError::UnknownVariant`].
//! - **Extension types** — field values outside the native scalar/container
//!   set (paths, versions) are registered for a small integer code and travel
//!   as CBOR-tagged byte strings in the binary format, or as their display
//!   strings in JSON/YAML (the schema-driven reader restores the typed form).
//!
//! Decoding validates that all required fields are present and rejects
//! unknown fields: forward/backward-incompatible payloads fail loudly rather
//! than silently accepting extra data.

mod cbor;
mod codec;
mod ext;
mod json;
mod record;
mod yaml;

pub use codec::{AnyRecord, RecordCodec};
pub use ext::{ExtensionRegistry, ExtensionType};
pub use record::{FieldReader, FieldWriter, Record};

use thiserror::Error;

/// Envelope field carrying the record tag.
pub const TAG_FIELD: &str = "type";

/// Wire formats supported by [`RecordCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Compact binary (CBOR). The default cache format.
    Binary,
    /// Human-readable JSON (pretty-printed), for debugging and export.
    Json,
    /// Human-readable YAML, for debugging and export.
    Yaml,
}

impl Format {
    /// File extension used by cache paths for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Binary => "cbor",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Codec failures.
///
/// `Schema`, `UnsupportedType`, and the registry misses are caller logic
/// errors, not transient conditions; nothing in the codec retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Missing required field, unknown field, or a field of the wrong shape.
    #[error("[SCHEMA] {0}")]
    Schema(String),
    /// The payload's type tag has no registered record type.
    #[error("[UNKNOWN_VARIANT] no record registered for tag {0:?}")]
    UnknownVariant(String),
    /// The payload carries an extension code with no registered type.
    #[error("[UNKNOWN_EXT_CODE] no extension registered for code {0}")]
    UnknownExtensionCode(u8),
    /// Encode-time: the extension type was never registered.
    #[error("[UNSUPPORTED_TYPE] extension type {0:?} is not registered")]
    UnsupportedType(&'static str),
    /// The bytes are not a well-formed payload in the chosen format.
    #[error("[MALFORMED] {0}")]
    Malformed(String),
}

/// Codec result alias.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Serialize a bare canonical value (no record envelope) in `format`, for
/// export and debugging. Sets render as their canonically sorted sequence.
///
/// # Errors
///
/// [`CodecError::Malformed`] when the value cannot be represented in the
/// chosen format (e.g. a non-finite float in JSON).
pub fn export_value(value: &skein_value::Value, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Binary => {
            let mut buf = Vec::new();
            ciborium::ser::into_writer(value, &mut buf)
                .map_err(|err| CodecError::Malformed(format!("cbor encode: {err}")))?;
            Ok(buf)
        }
        Format::Json => serde_json::to_vec_pretty(value)
            .map_err(|err| CodecError::Malformed(format!("json encode: {err}"))),
        Format::Yaml => serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|err| CodecError::Malformed(format!("yaml encode: {err}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod export_tests {
    use skein_value::Value;

    use super::*;

    // ── 1. exports are deterministic regardless of insertion order ──────

    #[test]
    fn export_is_canonical() {
        let a = Value::from_iter([
            ("tags".to_owned(), Value::set(["b", "a"])),
            ("n".to_owned(), Value::Int(1)),
        ]);
        let b = Value::from_iter([
            ("n".to_owned(), Value::Int(1)),
            ("tags".to_owned(), Value::set(["a", "b"])),
        ]);
        for format in [Format::Binary, Format::Json, Format::Yaml] {
            assert_eq!(
                export_value(&a, format).unwrap(),
                export_value(&b, format).unwrap()
            );
        }
    }

    // ── 2. yaml export is readable text ─────────────────────────────────

    #[test]
    fn yaml_export_readable() {
        let v = Value::from_iter([("name".to_owned(), Value::from("demo"))]);
        let text = String::from_utf8(export_value(&v, Format::Yaml).unwrap()).unwrap();
        assert!(text.contains("name: demo"));
    }
}
