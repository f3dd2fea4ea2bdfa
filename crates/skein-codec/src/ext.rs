// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Extension-type registry: non-native field values keyed by small integer
//! codes.

use std::any::TypeId;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::{CodecError, Result};

/// A value type outside the native scalar/container set that records may
/// carry as fields.
///
/// The binary format writes `encode_ext` bytes under the type's registered
/// code; the human formats write `encode_display`. Both decode paths must
/// accept their own encoder's output.
pub trait ExtensionType: Sized + Send + Sync + 'static {
    /// Registry display name, used in error messages.
    const NAME: &'static str;

    /// Byte payload for the binary format.
    fn encode_ext(&self) -> Vec<u8>;

    /// Rebuild from the byte payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] when the payload is not a valid encoding.
    fn decode_ext(data: &[u8]) -> Result<Self>;

    /// String form for the human-readable formats. Defaults to the UTF-8
    /// reading of the byte payload.
    fn encode_display(&self) -> String {
        String::from_utf8_lossy(&self.encode_ext()).into_owned()
    }

    /// Rebuild from the string form. Defaults to decoding its bytes.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] when the string is not a valid encoding.
    fn decode_display(s: &str) -> Result<Self> {
        Self::decode_ext(s.as_bytes())
    }
}

impl ExtensionType for PathBuf {
    const NAME: &'static str = "path";

    fn encode_ext(&self) -> Vec<u8> {
        self.to_string_lossy().into_owned().into_bytes()
    }

    fn decode_ext(data: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(data)
            .map_err(|err| CodecError::Malformed(format!("path is not UTF-8: {err}")))?;
        Ok(Self::from(s))
    }
}

impl ExtensionType for semver::Version {
    const NAME: &'static str = "version";

    fn encode_ext(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    fn decode_ext(data: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(data)
            .map_err(|err| CodecError::Malformed(format!("version is not UTF-8: {err}")))?;
        s.parse()
            .map_err(|err| CodecError::Malformed(format!("bad version {s:?}: {err}")))
    }
}

struct ExtEntry {
    name: &'static str,
    type_id: TypeId,
}

/// Bijective map between extension types and their small integer codes.
///
/// Codes are assigned sequentially from 1 in registration order, so a stable
/// registration sequence yields stable wire bytes.
#[derive(Default)]
pub struct ExtensionRegistry {
    codes: HashMap<TypeId, u8>,
    entries: HashMap<u8, ExtEntry>,
    next: u8,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its code. Idempotent: re-registering returns
    /// the code assigned first.
    pub fn register<T: ExtensionType>(&mut self) -> u8 {
        let type_id = TypeId::of::<T>();
        if let Some(&code) = self.codes.get(&type_id) {
            return code;
        }
        self.next += 1;
        let code = self.next;
        self.codes.insert(type_id, code);
        self.entries.insert(
            code,
            ExtEntry {
                name: T::NAME,
                type_id,
            },
        );
        code
    }

    /// The code assigned to `T`, if registered.
    #[must_use]
    pub fn code_of<T: ExtensionType>(&self) -> Option<u8> {
        self.codes.get(&TypeId::of::<T>()).copied()
    }

    /// Whether `code` is registered at all.
    #[must_use]
    pub fn knows_code(&self, code: u8) -> bool {
        self.entries.contains_key(&code)
    }

    /// Verify that `code` is registered and names `T`.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownExtensionCode`] for an unregistered code;
    /// [`CodecError::Schema`] when the code belongs to a different type.
    pub fn check_code<T: ExtensionType>(&self, code: u8) -> Result<()> {
        let entry = self
            .entries
            .get(&code)
            .ok_or(CodecError::UnknownExtensionCode(code))?;
        if entry.type_id == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(CodecError::Schema(format!(
                "extension code {code} is {:?}, not {:?}",
                entry.name,
                T::NAME
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. codes are sequential from 1 and idempotent ───────────────────

    #[test]
    fn sequential_idempotent_codes() {
        let mut reg = ExtensionRegistry::new();
        assert_eq!(reg.register::<PathBuf>(), 1);
        assert_eq!(reg.register::<semver::Version>(), 2);
        assert_eq!(reg.register::<PathBuf>(), 1);
        assert_eq!(reg.code_of::<semver::Version>(), Some(2));
    }

    // ── 2. unknown code and type mismatch are distinct failures ────────

    #[test]
    fn check_code_failures() {
        let mut reg = ExtensionRegistry::new();
        reg.register::<PathBuf>();
        assert!(matches!(
            reg.check_code::<PathBuf>(9),
            Err(CodecError::UnknownExtensionCode(9))
        ));
        assert!(matches!(
            reg.check_code::<semver::Version>(1),
            Err(CodecError::Schema(_))
        ));
        assert!(reg.check_code::<PathBuf>(1).is_ok());
    }

    // ── 3. shipped extension types round-trip both encodings ────────────

    #[test]
    fn shipped_types_round_trip() {
        let path = PathBuf::from("/tmp/cache/db");
        assert_eq!(PathBuf::decode_ext(&path.encode_ext()).unwrap(), path);
        assert_eq!(PathBuf::decode_display(&path.encode_display()).unwrap(), path);

        let version: semver::Version = "1.2.3-rc.1".parse().unwrap();
        assert_eq!(
            semver::Version::decode_ext(&version.encode_ext()).unwrap(),
            version
        );
        assert!(semver::Version::decode_ext(b"not a version").is_err());
    }
}
