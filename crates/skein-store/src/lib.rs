// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content-addressed record cache plus the record-as-graph-node layer.
//!
//! [`RecordStore`] binds a [`skein_codec::RecordCodec`] to a filesystem
//! layout: one file per record instance at
//! `{root}/db/{tag}/{identity}-{config_fingerprint}.{ext}`. The
//! configuration fingerprint in the file name isolates entries per distinct
//! runtime configuration, so a stale entry written under one configuration
//! is never misread as valid for another.
//!
//! Failure policy at the store boundary: a missing file is an absent result,
//! never an error; an entry that fails to decode is **evicted** (unlinked,
//! logged at error level) and reported absent, so corrupted or incompatible
//! cache entries self-heal instead of failing on every retry. Everything
//! else propagates.
//!
//! [`Context`] composes the store with a [`skein_graph::Dag`] keyed by
//! [`NodeKey`], letting any record type double as a DAG node. One `Context`
//! per logical session; the graph is single-owner and not thread-safe.

mod config;
mod context;
mod store;

pub use config::StoreConfig;
pub use context::{Context, GraphRecord, NodeKey};
pub use store::{RecordStore, StoreRecord};

use std::path::PathBuf;

use thiserror::Error;

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Encode failure, or a decode failure outside the evicting `get` path.
    #[error("[STORE_CODEC] {0}")]
    Codec(#[from] skein_codec::CodecError),
    /// Filesystem failure other than "not found".
    #[error("[STORE_IO] {path}: {source}")]
    Io {
        /// Path the operation was addressing.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A record's post-decode restore hook failed.
    #[error("[STORE_RESTORE] {0}")]
    Restore(String),
}

/// Store result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
