// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! [`RecordCodec`]: the façade tying registries, field I/O, and the format
//! backends together.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::ext::{ExtensionRegistry, ExtensionType};
use crate::record::{FieldReader, FieldWriter, Record, Wire};
use crate::{cbor, json, yaml, CodecError, Format, Result, TAG_FIELD};

/// A decoded record of a tag known only at runtime.
///
/// Produced by [`RecordCodec::decode_any`]; downcast to the concrete type
/// once the caller has dispatched on [`AnyRecord::tag`].
pub struct AnyRecord {
    tag: &'static str,
    identity: String,
    inner: Box<dyn Any + Send + Sync>,
}

impl AnyRecord {
    /// The record's wire tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// The record's string identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether the payload is a `T`.
    #[must_use]
    pub fn is<T: Record>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrow the payload as a `T`, if that is what it is.
    #[must_use]
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Take the payload as a `T`, handing `self` back on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when the payload is not a `T`.
    pub fn downcast<T: Record>(self) -> std::result::Result<T, Self> {
        let Self {
            tag,
            identity,
            inner,
        } = self;
        inner.downcast().map(|boxed| *boxed).map_err(|inner| Self {
            tag,
            identity,
            inner,
        })
    }
}

// Manual impl: the erased payload is not Debug, so only the envelope is
// rendered.
impl fmt::Debug for AnyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyRecord")
            .field("tag", &self.tag)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

type DecodeFn = fn(&mut FieldReader<'_>) -> Result<AnyRecord>;

// Monomorphized per record type; the registry stores the resulting fn
// pointer so erased dispatch needs no trait objects.
fn decode_erased<T: Record>(reader: &mut FieldReader<'_>) -> Result<AnyRecord> {
    let record = T::read_fields(reader)?;
    Ok(AnyRecord {
        tag: T::TAG,
        identity: record.identity(),
        inner: Box::new(record),
    })
}

/// Multi-format record codec with instance-owned registries.
///
/// Each codec owns its own tag and extension registries; two codecs with
/// different registration histories are simply different codecs, and nothing
/// is process-global.
pub struct RecordCodec {
    exts: ExtensionRegistry,
    decoders: HashMap<&'static str, DecodeFn>,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec {
    /// Create a codec with the stock extension types pre-registered:
    /// [`PathBuf`] at code 1 and [`semver::Version`] at code 2.
    #[must_use]
    pub fn new() -> Self {
        let mut exts = ExtensionRegistry::new();
        exts.register::<PathBuf>();
        exts.register::<semver::Version>();
        Self {
            exts,
            decoders: HashMap::new(),
        }
    }

    /// Register a record type for [`RecordCodec::decode_any`] dispatch.
    /// Re-registering the same type is a no-op.
    pub fn register_record<T: Record>(&mut self) -> &mut Self {
        self.decoders.insert(T::TAG, decode_erased::<T>);
        self
    }

    /// Register an additional extension type, returning its code.
    pub fn register_extension<T: ExtensionType>(&mut self) -> u8 {
        self.exts.register::<T>()
    }

    /// Whether `tag` has a registered record type.
    #[must_use]
    pub fn knows_tag(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Encode `record` in `format`, wrapping its fields in the tag envelope.
    ///
    /// # Errors
    ///
    /// [`CodecError::Schema`] when the record writes the reserved envelope
    /// field itself, plus any failure from `write_fields`.
    pub fn encode<T: Record>(&self, record: &T, format: Format) -> Result<Vec<u8>> {
        let mut writer = FieldWriter::new(&self.exts);
        record.write_fields(&mut writer)?;
        let mut fields = writer.into_fields();
        if fields.contains_key(TAG_FIELD) {
            return Err(CodecError::Schema(format!(
                "record {:?} wrote the reserved field {TAG_FIELD:?}",
                T::TAG
            )));
        }
        fields.insert(TAG_FIELD.to_owned(), Wire::Text(T::TAG.to_owned()));
        match format {
            Format::Binary => cbor::encode(&fields),
            Format::Json => json::encode(&fields),
            Format::Yaml => yaml::encode(&fields),
        }
    }

    /// Decode `bytes` as a `T`.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] for bytes that are not a payload in
    /// `format`, [`CodecError::Schema`] for a missing tag, a tag naming a
    /// different record type, or field-shape violations.
    pub fn decode<T: Record>(&self, bytes: &[u8], format: Format) -> Result<T> {
        let (tag, mut reader) = self.open(bytes, format)?;
        if tag != T::TAG {
            return Err(CodecError::Schema(format!(
                "payload is tagged {tag:?}, expected {:?}",
                T::TAG
            )));
        }
        let record = T::read_fields(&mut reader)?;
        reader.finish()?;
        Ok(record)
    }

    /// Decode `bytes` as whichever registered record type its tag names.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownVariant`] for an unregistered tag, otherwise as
    /// [`RecordCodec::decode`].
    pub fn decode_any(&self, bytes: &[u8], format: Format) -> Result<AnyRecord> {
        let (tag, mut reader) = self.open(bytes, format)?;
        let decoder = self
            .decoders
            .get(tag.as_str())
            .ok_or_else(|| CodecError::UnknownVariant(tag.clone()))?;
        let record = decoder(&mut reader)?;
        reader.finish()?;
        Ok(record)
    }

    fn open(&self, bytes: &[u8], format: Format) -> Result<(String, FieldReader<'_>)> {
        let mut fields = match format {
            Format::Binary => cbor::decode(bytes),
            Format::Json => json::decode(bytes),
            Format::Yaml => yaml::decode(bytes),
        }?;
        let tag = match fields.remove(TAG_FIELD) {
            Some(Wire::Text(tag)) => tag,
            Some(_) => {
                return Err(CodecError::Schema(format!(
                    "envelope field {TAG_FIELD:?} is not a string"
                )))
            }
            None => {
                return Err(CodecError::Schema(format!(
                    "payload has no {TAG_FIELD:?} field"
                )))
            }
        };
        Ok((tag, FieldReader::new(&self.exts, fields)))
    }
}
