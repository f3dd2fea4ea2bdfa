// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Store configuration and its canonical fingerprint.

use std::path::PathBuf;

use skein_value::Value;

/// Runtime configuration for a [`crate::RecordStore`].
///
/// `options` is an arbitrary canonical-value mapping describing whatever
/// configuration affects cache validity; its [`skein_value::fingerprint`]
/// is suffixed into every cache path, so changing the options retires the
/// old entries wholesale instead of risking stale reads.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether caching is active at all. When `false`, `get` always misses
    /// and `put`/`delete` are no-ops.
    pub cache: bool,
    /// Cache root directory; entries live under `{root}/db/`.
    pub root: PathBuf,
    /// Configuration values folded into the cache key.
    pub options: Value,
}

impl StoreConfig {
    /// Configuration rooted at `root` with caching on and empty options.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            cache: true,
            root: root.into(),
            options: Value::Mapping(std::collections::BTreeMap::new()),
        }
    }

    /// Replace the option mapping.
    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Turn caching off.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.cache = false;
        self
    }

    /// SHA-256 fingerprint of the option mapping. Memoized per distinct
    /// canonical key, so repeated calls are cheap and never a suspension
    /// point.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        skein_value::fingerprint(&self.options)
    }

    /// The platform user cache directory for this application, when the
    /// platform exposes one.
    #[must_use]
    pub fn default_root() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "flyingrobots", "skein")
            .map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

impl Default for StoreConfig {
    /// Rooted at the platform cache directory, falling back to a `skein`
    /// directory under the system temp dir.
    fn default() -> Self {
        let root = Self::default_root().unwrap_or_else(|| std::env::temp_dir().join("skein"));
        Self::new(root)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. empty options fingerprint is the canonical empty-mapping hash ─

    #[test]
    fn empty_options_fingerprint() {
        let config = StoreConfig::new("/tmp/skein");
        assert_eq!(
            config.fingerprint(),
            skein_value::EMPTY_MAPPING_FINGERPRINT
        );
    }

    // ── 2. distinct options yield distinct fingerprints ─────────────────

    #[test]
    fn options_change_fingerprint() {
        let base = StoreConfig::new("/tmp/skein");
        let tuned = base
            .clone()
            .with_options(Value::from_iter([("level".to_owned(), Value::Int(2))]));
        assert_ne!(base.fingerprint(), tuned.fingerprint());
    }
}
