// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cache behavior against a real (temporary) filesystem.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use async_trait::async_trait;
use skein_codec::{FieldReader, FieldWriter, Format, Record, RecordCodec};
use skein_store::{Context, GraphRecord, RecordStore, StoreConfig, StoreRecord};
use skein_value::Value;

#[derive(Debug, Clone, PartialEq)]
struct Bundle {
    name: String,
    version: semver::Version,
    source: PathBuf,
    // Runtime-only; never serialized, re-established by the restore hook.
    loaded: bool,
}

impl Bundle {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: "0.3.1".parse().unwrap(),
            source: PathBuf::from("/srv/bundles").join(name),
            loaded: false,
        }
    }
}

impl Record for Bundle {
    const TAG: &'static str = "bundle";

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn write_fields(&self, writer: &mut FieldWriter<'_>) -> skein_codec::Result<()> {
        writer.field("name", self.name.clone());
        writer.ext_field("version", &self.version)?;
        writer.ext_field("source", &self.source)?;
        Ok(())
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> skein_codec::Result<Self> {
        Ok(Self {
            name: reader.str_field("name")?,
            version: reader.ext_field("version")?,
            source: reader.ext_field("source")?,
            loaded: false,
        })
    }
}

#[async_trait]
impl StoreRecord for Bundle {
    async fn restore_runtime_state(&mut self) -> skein_store::Result<()> {
        self.loaded = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Tool {
    name: String,
}

impl Record for Tool {
    const TAG: &'static str = "tool";

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn write_fields(&self, writer: &mut FieldWriter<'_>) -> skein_codec::Result<()> {
        writer.field("name", self.name.clone());
        Ok(())
    }

    fn read_fields(reader: &mut FieldReader<'_>) -> skein_codec::Result<Self> {
        Ok(Self {
            name: reader.str_field("name")?,
        })
    }
}

#[async_trait]
impl StoreRecord for Tool {}

fn codec() -> RecordCodec {
    let mut codec = RecordCodec::new();
    codec.register_record::<Bundle>();
    codec.register_record::<Tool>();
    codec
}

fn store_at(root: &std::path::Path) -> RecordStore {
    RecordStore::new(codec(), StoreConfig::new(root))
}

// ── 1. put then get round-trips and runs the restore hook ───────────────

#[tokio::test]
async fn put_get_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    let bundle = Bundle::new("core");

    let path = store.put(&bundle).await.unwrap().unwrap();
    assert!(path.starts_with(dir.path().join("db").join("bundle")));
    assert!(path.extension().is_some_and(|ext| ext == "cbor"));

    let back: Bundle = store.get("core").await.unwrap().unwrap();
    assert_eq!(back.name, bundle.name);
    assert_eq!(back.version, bundle.version);
    assert_eq!(back.source, bundle.source);
    assert!(back.loaded, "restore hook must run after decode");
}

// ── 2. a missing entry is a miss, not an error ──────────────────────────

#[tokio::test]
async fn missing_entry_misses() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    assert!(store.get::<Bundle>("ghost").await.unwrap().is_none());
}

// ── 3. an undecodable entry is evicted and reported as a miss ───────────

#[tokio::test]
async fn corrupted_entry_evicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    let path = store.key_path::<Bundle>("core");
    tokio::fs::create_dir_all(path.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&path, b"not cbor at all").await.unwrap();

    assert!(store.get::<Bundle>("core").await.unwrap().is_none());
    assert!(!path.exists(), "evicted entry must be unlinked");
    // Self-healed: the next get is a clean miss.
    assert!(store.get::<Bundle>("core").await.unwrap().is_none());
}

// ── 4. entries from a different record type also evict on type mismatch ─

#[tokio::test]
async fn wrong_type_evicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    let tool = Tool {
        name: "hammer".to_owned(),
    };
    let bytes_path = store.key_path::<Bundle>("hammer");
    store.put_at(&tool, &bytes_path).await.unwrap();

    assert!(store.get::<Bundle>("hammer").await.unwrap().is_none());
    assert!(!bytes_path.exists());
}

// ── 5. config fingerprints isolate cache entries ────────────────────────

#[tokio::test]
async fn config_fingerprint_isolation() {
    let dir = tempfile::tempdir().unwrap();
    let plain = RecordStore::new(codec(), StoreConfig::new(dir.path()));
    let tuned = RecordStore::new(
        codec(),
        StoreConfig::new(dir.path())
            .with_options(Value::from_iter([("opt".to_owned(), Value::Bool(true))])),
    );
    assert_ne!(
        plain.key_path::<Bundle>("core"),
        tuned.key_path::<Bundle>("core")
    );

    plain.put(&Bundle::new("core")).await.unwrap();
    assert!(
        tuned.get::<Bundle>("core").await.unwrap().is_none(),
        "an entry written under one configuration must not satisfy another"
    );
    assert!(plain.get::<Bundle>("core").await.unwrap().is_some());
}

// ── 6. a disabled cache never reads or writes ───────────────────────────

#[tokio::test]
async fn disabled_cache_no_ops() {
    let dir = tempfile::tempdir().unwrap();
    let enabled = store_at(dir.path());
    let disabled = RecordStore::new(codec(), StoreConfig::new(dir.path()).disabled());
    let bundle = Bundle::new("core");

    assert!(disabled.put(&bundle).await.unwrap().is_none());
    enabled.put(&bundle).await.unwrap();
    // Even with the file on disk, a disabled store misses.
    assert!(disabled.get::<Bundle>("core").await.unwrap().is_none());

    // delete is a no-op, but delete_path honors an explicit path.
    disabled.delete(&bundle).await.unwrap();
    assert!(enabled.get::<Bundle>("core").await.unwrap().is_some());
    disabled
        .delete_path(&enabled.key_path::<Bundle>("core"))
        .await
        .unwrap();
    assert!(enabled.get::<Bundle>("core").await.unwrap().is_none());
}

// ── 7. delete is idempotent from the caller's perspective ───────────────

#[tokio::test]
async fn delete_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path());
    let bundle = Bundle::new("core");
    store.put(&bundle).await.unwrap();
    store.delete(&bundle).await.unwrap();
    // Already gone; warns but does not fail.
    store.delete(&bundle).await.unwrap();
    assert!(store.get::<Bundle>("core").await.unwrap().is_none());
}

// ── 8. human formats write readable files under their own extension ─────

#[tokio::test]
async fn human_format_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path()).with_format(Format::Yaml);
    let bundle = Bundle::new("core");
    let path = store.put(&bundle).await.unwrap().unwrap();
    assert!(path.extension().is_some_and(|ext| ext == "yaml"));

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(text.contains("name: core"));
    let back: Bundle = store.get("core").await.unwrap().unwrap();
    assert_eq!(back.name, "core");
}

// ── 9. records double as graph nodes through the context ────────────────

#[tokio::test]
async fn context_graph_linkage() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(store_at(dir.path()));
    let app = Bundle::new("app");
    let lib = Bundle::new("lib");
    let hammer = Tool {
        name: "hammer".to_owned(),
    };

    ctx.add_child(&app, &lib, None).unwrap();
    ctx.add_child(&lib, &hammer, None).unwrap();

    let children = ctx.children(&app);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].0, lib.node_key());

    let mut tools = ctx.descendants_tagged(&app, "tool");
    tools.sort_by(|a, b| a.identity.cmp(&b.identity));
    assert_eq!(tools, vec![hammer.node_key()]);

    let gens: Vec<Vec<_>> = ctx.generations().collect();
    assert_eq!(gens.len(), 3);
    assert_eq!(gens[0], vec![app.node_key()]);

    // Store and graph compose: the same records round-trip the cache.
    ctx.store().put(&app).await.unwrap();
    let back: Bundle = ctx.store().get("app").await.unwrap().unwrap();
    assert_eq!(back.node_key(), app.node_key());
}

// ── 10. duplicate and cycle-closing links fail without corrupting state ─

#[tokio::test]
async fn context_rejects_bad_links() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(store_at(dir.path()));
    let app = Bundle::new("app");
    let lib = Bundle::new("lib");

    ctx.add_child(&app, &lib, None).unwrap();
    assert!(ctx.add_child(&app, &lib, None).is_err());
    assert!(ctx.add_child(&lib, &app, None).is_err());
    // The rejected back-edge was rolled back.
    assert_eq!(ctx.graph().edge_count(), 1);
    assert_eq!(ctx.parents(&app).len(), 0);
}
