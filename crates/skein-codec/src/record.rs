// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The [`Record`] trait and the strict-schema field writer/reader pair.
//!
//! Fields travel through an internal [`Wire`] tree shared by all format
//! backends. The writer canonicalizes sets (sorted by canonical key) so that
//! wire bytes are deterministic; the reader consumes fields by name and
//! rejects anything left over.

use std::collections::BTreeMap;

use skein_value::Value;

use crate::ext::{ExtensionRegistry, ExtensionType};
use crate::{CodecError, Result};

/// A typed record with a fixed field set.
///
/// `TAG` is the wire tag carried in the `"type"` envelope field and must be
/// unique within a codec's registry. `identity` renders the record to the
/// string used as part of its cache key. Runtime-only fields are simply not
/// written in `write_fields`; they are re-established after decode through
/// the store's async hook.
pub trait Record: Send + Sync + 'static {
    /// Stable wire tag for tagged-union dispatch.
    const TAG: &'static str;

    /// String identity used in cache keys.
    fn identity(&self) -> String;

    /// Write the declared fields.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedType`] from extension fields whose type is
    /// not registered.
    fn write_fields(&self, writer: &mut FieldWriter<'_>) -> Result<()>;

    /// Read the declared fields. Implementations should consume exactly the
    /// fields `write_fields` produces; the codec rejects leftovers.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] for missing or ill-shaped fields, plus any
    /// extension decode failures.
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self>
    where
        Self: Sized;
}

/// Internal wire tree shared by the CBOR/JSON/YAML backends.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Wire {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Seq(Vec<Wire>),
    /// Canonically sorted on construction; the binary format preserves the
    /// set tag, the human formats flatten to an array.
    Set(Vec<Wire>),
    Map(BTreeMap<String, Wire>),
    /// Extension value: registered code plus both payload forms.
    Ext {
        code: u8,
        data: Vec<u8>,
        display: String,
    },
}

pub(crate) fn wire_of_value(value: &Value) -> Wire {
    match value {
        Value::Null => Wire::Null,
        Value::Bool(b) => Wire::Bool(*b),
        Value::Int(n) => Wire::Int(*n),
        Value::Float(x) => Wire::Float(*x),
        Value::String(s) => Wire::Text(s.clone()),
        Value::Sequence(items) => Wire::Seq(items.iter().map(wire_of_value).collect()),
        Value::Set(items) => {
            let mut sorted: Vec<&Value> = items.iter().collect();
            sorted.sort_by_key(|v| v.canonical_key());
            Wire::Set(sorted.into_iter().map(wire_of_value).collect())
        }
        Value::Mapping(map) => Wire::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), wire_of_value(v)))
                .collect(),
        ),
    }
}

pub(crate) fn value_of_wire(wire: &Wire) -> Value {
    match wire {
        Wire::Null => Value::Null,
        Wire::Bool(b) => Value::Bool(*b),
        Wire::Int(n) => Value::Int(*n),
        Wire::Float(x) => Value::Float(*x),
        Wire::Text(s) => Value::String(s.clone()),
        Wire::Seq(items) => Value::Sequence(items.iter().map(value_of_wire).collect()),
        Wire::Set(items) => Value::Set(items.iter().map(value_of_wire).collect()),
        Wire::Map(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), value_of_wire(v)))
                .collect(),
        ),
        Wire::Ext { display, data, .. } => {
            if display.is_empty() {
                Value::String(String::from_utf8_lossy(data).into_owned())
            } else {
                Value::String(display.clone())
            }
        }
    }
}

/// Field sink handed to [`Record::write_fields`].
pub struct FieldWriter<'a> {
    exts: &'a ExtensionRegistry,
    fields: BTreeMap<String, Wire>,
}

impl<'a> FieldWriter<'a> {
    pub(crate) fn new(exts: &'a ExtensionRegistry) -> Self {
        Self {
            exts,
            fields: BTreeMap::new(),
        }
    }

    pub(crate) fn into_fields(self) -> BTreeMap<String, Wire> {
        self.fields
    }

    /// Write a native field.
    pub fn field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields
            .insert(name.to_owned(), wire_of_value(&value.into()));
    }

    /// Write a native field only when present (`None` is omitted entirely,
    /// and reads back as absent).
    pub fn opt_field<V: Into<Value>>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.field(name, value);
        }
    }

    /// Write an extension-typed field.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedType`] when `T` was never registered.
    pub fn ext_field<T: ExtensionType>(&mut self, name: &str, value: &T) -> Result<()> {
        let code = self
            .exts
            .code_of::<T>()
            .ok_or(CodecError::UnsupportedType(T::NAME))?;
        self.fields.insert(
            name.to_owned(),
            Wire::Ext {
                code,
                data: value.encode_ext(),
                display: value.encode_display(),
            },
        );
        Ok(())
    }

    /// Optional variant of [`FieldWriter::ext_field`].
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedType`] when `T` was never registered.
    pub fn opt_ext_field<T: ExtensionType>(&mut self, name: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.ext_field(name, value),
            None => Ok(()),
        }
    }
}

/// Field source handed to [`Record::read_fields`].
///
/// Every accessor consumes its field; [`FieldReader::finish`] (called by the
/// codec) rejects unconsumed fields, which is what makes the schema strict.
pub struct FieldReader<'a> {
    exts: &'a ExtensionRegistry,
    fields: BTreeMap<String, Wire>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(exts: &'a ExtensionRegistry, fields: BTreeMap<String, Wire>) -> Self {
        Self { exts, fields }
    }

    fn take(&mut self, name: &str) -> Result<Wire> {
        self.fields
            .remove(name)
            .ok_or_else(|| CodecError::Schema(format!("missing required field {name:?}")))
    }

    fn take_opt(&mut self, name: &str) -> Option<Wire> {
        self.fields.remove(name)
    }

    /// Consume a string field.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a string.
    pub fn str_field(&mut self, name: &str) -> Result<String> {
        match self.take(name)? {
            Wire::Text(s) => Ok(s),
            other => Err(shape_error(name, "string", &other)),
        }
    }

    /// Consume an optional string field.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when present but not a string.
    pub fn opt_str_field(&mut self, name: &str) -> Result<Option<String>> {
        match self.take_opt(name) {
            None | Some(Wire::Null) => Ok(None),
            Some(Wire::Text(s)) => Ok(Some(s)),
            Some(other) => Err(shape_error(name, "string", &other)),
        }
    }

    /// Consume an integer field.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not an integer.
    pub fn int_field(&mut self, name: &str) -> Result<i64> {
        match self.take(name)? {
            Wire::Int(n) => Ok(n),
            other => Err(shape_error(name, "integer", &other)),
        }
    }

    /// Consume a float field.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a float.
    pub fn float_field(&mut self, name: &str) -> Result<f64> {
        match self.take(name)? {
            Wire::Float(x) => Ok(x),
            other => Err(shape_error(name, "float", &other)),
        }
    }

    /// Consume a boolean field.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a boolean.
    pub fn bool_field(&mut self, name: &str) -> Result<bool> {
        match self.take(name)? {
            Wire::Bool(b) => Ok(b),
            other => Err(shape_error(name, "boolean", &other)),
        }
    }

    /// Consume any field as a canonical [`Value`].
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent.
    pub fn value_field(&mut self, name: &str) -> Result<Value> {
        Ok(value_of_wire(&self.take(name)?))
    }

    /// Consume a sequence field as its element values.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a sequence.
    pub fn seq_field(&mut self, name: &str) -> Result<Vec<Value>> {
        match self.take(name)? {
            Wire::Seq(items) => Ok(items.iter().map(value_of_wire).collect()),
            other => Err(shape_error(name, "sequence", &other)),
        }
    }

    /// Consume a set field. Accepts a plain sequence too, because the human
    /// formats cannot carry the set tag; the schema is what declares the
    /// container a set.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a set/sequence.
    pub fn set_field(&mut self, name: &str) -> Result<Vec<Value>> {
        match self.take(name)? {
            Wire::Set(items) | Wire::Seq(items) => {
                Ok(items.iter().map(value_of_wire).collect())
            }
            other => Err(shape_error(name, "set", &other)),
        }
    }

    /// Consume a mapping field as a canonical [`Value::Mapping`].
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when absent or not a mapping.
    pub fn mapping_field(&mut self, name: &str) -> Result<Value> {
        match self.take(name)? {
            map @ Wire::Map(_) => Ok(value_of_wire(&map)),
            other => Err(shape_error(name, "mapping", &other)),
        }
    }

    /// Consume an extension-typed field.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownExtensionCode`] for an unregistered wire code,
    /// [`CodecError::UnsupportedType`] when `T` itself is unregistered (human
    /// formats), [`CodecError::Schema`] on shape/type mismatch, plus `T`'s
    /// own decode failures.
    pub fn ext_field<T: ExtensionType>(&mut self, name: &str) -> Result<T> {
        match self.take(name)? {
            Wire::Ext { code, data, .. } => {
                self.exts.check_code::<T>(code)?;
                T::decode_ext(&data)
            }
            // Human formats carry extension values as display strings.
            Wire::Text(s) => {
                if self.exts.code_of::<T>().is_none() {
                    return Err(CodecError::UnsupportedType(T::NAME));
                }
                T::decode_display(&s)
            }
            other => Err(shape_error(name, T::NAME, &other)),
        }
    }

    /// Optional variant of [`FieldReader::ext_field`].
    ///
    /// # Errors
    ///
    /// As [`FieldReader::ext_field`], when the field is present.
    pub fn opt_ext_field<T: ExtensionType>(&mut self, name: &str) -> Result<Option<T>> {
        if self.fields.contains_key(name) {
            self.ext_field(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reject unconsumed fields (strict schema).
    pub(crate) fn finish(&self) -> Result<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
            Err(CodecError::Schema(format!(
                "unknown fields: {}",
                names.join(", ")
            )))
        }
    }
}

fn shape_error(name: &str, expected: &str, got: &Wire) -> CodecError {
    let shape = match got {
        Wire::Null => "null",
        Wire::Bool(_) => "boolean",
        Wire::Int(_) => "integer",
        Wire::Float(_) => "float",
        Wire::Text(_) => "string",
        Wire::Seq(_) => "sequence",
        Wire::Set(_) => "set",
        Wire::Map(_) => "mapping",
        Wire::Ext { .. } => "extension",
    };
    CodecError::Schema(format!("field {name:?}: expected {expected}, got {shape}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn registry() -> ExtensionRegistry {
        let mut reg = ExtensionRegistry::new();
        reg.register::<PathBuf>();
        reg
    }

    // ── 1. writer/reader round-trip over plain fields ───────────────────

    #[test]
    fn plain_round_trip() {
        let reg = registry();
        let mut writer = FieldWriter::new(&reg);
        writer.field("name", "demo");
        writer.field("count", 3i64);
        writer.field("ratio", 0.5f64);
        writer.field("live", true);
        writer.opt_field::<String>("absent", None);

        let mut reader = FieldReader::new(&reg, writer.into_fields());
        assert_eq!(reader.str_field("name").unwrap(), "demo");
        assert_eq!(reader.int_field("count").unwrap(), 3);
        assert!((reader.float_field("ratio").unwrap() - 0.5).abs() < f64::EPSILON);
        assert!(reader.bool_field("live").unwrap());
        assert_eq!(reader.opt_str_field("absent").unwrap(), None);
        reader.finish().unwrap();
    }

    // ── 2. missing and unknown fields are schema errors ─────────────────

    #[test]
    fn strict_schema() {
        let reg = registry();
        let mut writer = FieldWriter::new(&reg);
        writer.field("extra", 1i64);
        let mut reader = FieldReader::new(&reg, writer.into_fields());
        assert!(matches!(
            reader.str_field("needed"),
            Err(CodecError::Schema(_))
        ));
        assert!(matches!(reader.finish(), Err(CodecError::Schema(_))));
    }

    // ── 3. unregistered extension type fails at encode time ─────────────

    #[test]
    fn unregistered_extension_encode() {
        let reg = ExtensionRegistry::new();
        let mut writer = FieldWriter::new(&reg);
        let err = writer
            .ext_field("path", &PathBuf::from("/tmp"))
            .unwrap_err();
        assert_eq!(err, CodecError::UnsupportedType("path"));
    }

    // ── 4. sets canonicalize on write ───────────────────────────────────

    #[test]
    fn sets_canonicalize() {
        let reg = registry();
        let mut writer = FieldWriter::new(&reg);
        writer.field("tags", Value::set(["b", "a"]));
        let fields = writer.into_fields();
        let Some(Wire::Set(items)) = fields.get("tags").cloned() else {
            panic!("expected set wire");
        };
        assert_eq!(
            items,
            vec![Wire::Text("a".to_owned()), Wire::Text("b".to_owned())]
        );
    }
}
