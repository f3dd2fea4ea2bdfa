// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The record cache itself.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use skein_codec::{Format, Record, RecordCodec};
use tokio::fs;
use tracing::{debug, error, warn};

use crate::{Result, StoreConfig, StoreError};

/// A record the store can hand back fully usable.
///
/// The store calls [`StoreRecord::restore_runtime_state`] after every
/// successful decode and before returning the record, so fields that are
/// deliberately excluded from the schema (handles, derived state) can be
/// re-established. Callers decoding outside the store must invoke the hook
/// themselves before relying on such fields.
#[async_trait]
pub trait StoreRecord: Record {
    /// Re-establish runtime-only state after decode. Defaults to a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::Restore`] (or any store error) when the state cannot
    /// be rebuilt; the failed record is not returned to the caller.
    async fn restore_runtime_state(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Content-addressed file cache for typed records.
///
/// Record lifecycle is a contract, not tracked state: a record starts
/// transient, `put` binds it to a path, `delete` ends the binding, and a
/// later `get` for the same key simply misses. Writes are not atomic and
/// there is no per-key locking; concurrent writers to one key race at the
/// filesystem level, last writer wins.
pub struct RecordStore {
    codec: RecordCodec,
    config: StoreConfig,
    format: Format,
}

impl RecordStore {
    /// A store writing the compact binary format.
    #[must_use]
    pub fn new(codec: RecordCodec, config: StoreConfig) -> Self {
        Self {
            codec,
            config,
            format: Format::Binary,
        }
    }

    /// Switch the wire format (and thereby the cache file extension).
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// The codec, for tag/extension registration at setup time.
    pub fn codec_mut(&mut self) -> &mut RecordCodec {
        &mut self.codec
    }

    /// The codec, read-only.
    #[must_use]
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The cache path for a `T` with `identity` under the active
    /// configuration: `{root}/db/{tag}/{identity}-{fingerprint}.{ext}`.
    #[must_use]
    pub fn key_path<T: Record>(&self, identity: &str) -> PathBuf {
        self.config
            .root
            .join("db")
            .join(T::TAG.to_lowercase())
            .join(format!(
                "{identity}-{}.{}",
                self.config.fingerprint(),
                self.format.extension()
            ))
    }

    /// Fetch the cached `T` with `identity`, if present and decodable.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] for filesystem failures other than "not found";
    /// restore-hook failures. Decode failures are not errors here: the entry
    /// is evicted and the call reports a miss.
    pub async fn get<T: StoreRecord>(&self, identity: &str) -> Result<Option<T>> {
        if !self.config.cache {
            return Ok(None);
        }
        self.get_at(&self.key_path::<T>(identity)).await
    }

    /// [`RecordStore::get`] against an explicit path.
    ///
    /// # Errors
    ///
    /// As [`RecordStore::get`].
    pub async fn get_at<T: StoreRecord>(&self, path: &Path) -> Result<Option<T>> {
        if !self.config.cache {
            return Ok(None);
        }
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "cache miss");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        match self.codec.decode::<T>(&bytes, self.format) {
            Ok(mut record) => {
                record.restore_runtime_state().await?;
                debug!(path = %path.display(), "cache hit");
                Ok(Some(record))
            }
            Err(err) => {
                // Never leave an undecodable entry behind to fail again.
                error!(path = %path.display(), %err, "evicting undecodable cache entry");
                if let Err(unlink) = fs::remove_file(path).await {
                    warn!(path = %path.display(), %unlink, "eviction unlink failed");
                }
                Ok(None)
            }
        }
    }

    /// Write `record` at its key path, overwriting any existing entry.
    /// Returns the bound path, or `None` when caching is disabled.
    ///
    /// # Errors
    ///
    /// [`StoreError::Codec`] on encode failure, [`StoreError::Io`] on write
    /// failure.
    pub async fn put<T: Record>(&self, record: &T) -> Result<Option<PathBuf>> {
        if !self.config.cache {
            return Ok(None);
        }
        let path = self.key_path::<T>(&record.identity());
        self.put_at(record, &path).await
    }

    /// [`RecordStore::put`] against an explicit path.
    ///
    /// # Errors
    ///
    /// As [`RecordStore::put`].
    pub async fn put_at<T: Record>(&self, record: &T, path: &Path) -> Result<Option<PathBuf>> {
        if !self.config.cache {
            return Ok(None);
        }
        let bytes = self.codec.encode(record, self.format)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, &bytes).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "cached record");
        Ok(Some(path.to_path_buf()))
    }

    /// Remove `record`'s cache entry. No-op when caching is disabled.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] for filesystem failures other than "not found".
    pub async fn delete<T: Record>(&self, record: &T) -> Result<()> {
        if !self.config.cache {
            return Ok(());
        }
        self.delete_path(&self.key_path::<T>(&record.identity()))
            .await
    }

    /// Remove the entry at `path`. Deleting an absent entry logs a warning
    /// and succeeds. Unlike `delete`, an explicit path is honored even when
    /// caching is disabled.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] for filesystem failures other than "not found".
    pub async fn delete_path(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "deleted cache entry");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "delete of absent cache entry");
                Ok(())
            }
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
