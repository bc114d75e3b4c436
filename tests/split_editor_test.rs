//! Integration tests for edits spanning both stores

use async_trait::async_trait;
use serde_json::{json, Value};
use splitstore::adapters::database::{RecordStore, RecordTables, SplitStores, StoreTransaction};
use splitstore::adapters::memory::MemoryStore;
use splitstore::config::parse_config;
use splitstore::config::RecordsConfig;
use splitstore::core::export::ExportMarkers;
use splitstore::core::updater::{SplitRecordEditor, Updater};
use splitstore::domain::{
    DemoFlag, RecordAttributes, RecordKey, RecordLookup, Result, SplitStoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const CONFIG: &str = r#"
[identifying]
connection_string = "postgresql://pii@localhost:5432/pii"

[deidentified]
connection_string = "postgresql://app@localhost:5432/app"

[records]
table_prefix = "fever"
record_type = "surveys"
export_marker_table = "fever_export_markers"
"#;

struct Fixture {
    stores: SplitStores,
    records: RecordsConfig,
    editor: SplitRecordEditor<Value, Value>,
    markers: ExportMarkers,
}

async fn fixture(stores: SplitStores) -> Fixture {
    let records = parse_config(CONFIG).unwrap().records;
    stores.ensure_tables(&records).await.unwrap();

    let editor = SplitRecordEditor::new(
        Updater::identifying(
            Arc::clone(&stores.identifying),
            records.identifying_tables().unwrap(),
        ),
        Updater::deidentified(
            Arc::clone(&stores.deidentified),
            records.deidentified_tables().unwrap(),
        )
        .unwrap(),
    )
    .unwrap();
    let markers = ExportMarkers::new(
        Arc::clone(&stores.deidentified),
        records.deidentified_tables().unwrap(),
    )
    .unwrap();

    Fixture {
        stores,
        records,
        editor,
        markers,
    }
}

/// Store that refuses new transactions while `offline` is set
struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
}

#[async_trait]
impl RecordStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn test_connection(&self) -> Result<()> {
        self.inner.test_connection().await
    }

    async fn ensure_tables(&self, tables: &RecordTables) -> Result<()> {
        self.inner.ensure_tables(tables).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SplitStoreError::Database("connection refused".to_string()));
        }
        self.inner.begin().await
    }
}

async fn ingest(fixture: &Fixture, raw_key: &str) {
    ingest_with(fixture, raw_key, false).await;
}

async fn ingest_with(fixture: &Fixture, raw_key: &str, deidentified_demo: bool) {
    let key = RecordKey::new(raw_key).unwrap();
    let device = json!({"installation": "inst-1"});
    fixture
        .editor
        .identifying()
        .ingest(&[RecordAttributes::new(
            key.clone(),
            device.clone(),
            json!({"email": "pat@example.com", "isDemo": false}),
        )])
        .await
        .unwrap();
    fixture
        .editor
        .deidentified()
        .ingest(&[RecordAttributes::new(
            key,
            device,
            json!({"symptoms": ["fever"], "isDemo": deidentified_demo}),
        )])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_load_resolves_both_projections() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest(&f, "a9c2f0e1").await;

    let record = f.editor.load(&"a9c2".parse().unwrap()).await.unwrap();
    assert_eq!(record.identifying.record_key, record.deidentified.record_key);
    assert_eq!(record.identifying.content["email"], "pat@example.com");
    assert_eq!(record.deidentified.content["symptoms"][0], "fever");
}

#[tokio::test]
async fn test_identifying_edit_invalidates_export() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest(&f, "a9c2f0e1").await;

    let record = f.editor.load(&"a9c2f0e1".parse().unwrap()).await.unwrap();
    f.markers
        .mark_exported(record.deidentified.row_id)
        .await
        .unwrap();

    let changed = f
        .editor
        .update_identifying(
            &record.identifying,
            json!({"email": "pat@example.org", "isDemo": false}),
        )
        .await
        .unwrap();
    assert!(changed);
    assert!(f
        .markers
        .exported_at(record.deidentified.row_id)
        .await
        .unwrap()
        .is_none());

    // The de-identified row itself is untouched
    let key = &record.deidentified.record_key;
    assert!(f
        .editor
        .deidentified()
        .load_backups(key)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(f.editor.identifying().load_backups(key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unchanged_identifying_edit_keeps_marker() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest(&f, "a9c2f0e1").await;

    let record = f.editor.load(&"a9c2f0e1".parse().unwrap()).await.unwrap();
    f.markers
        .mark_exported(record.deidentified.row_id)
        .await
        .unwrap();

    let changed = f
        .editor
        .update_identifying(&record.identifying, record.identifying.content.clone())
        .await
        .unwrap();
    assert!(!changed);
    assert!(f
        .markers
        .exported_at(record.deidentified.row_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_set_demo_on_both_projections() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest(&f, "a9c2f0e1").await;
    let lookup: RecordLookup = "a9c2f0e1".parse().unwrap();

    let change = f.editor.set_demo(&lookup, true).await.unwrap();
    assert!(change.identifying && change.deidentified);

    let record = f.editor.load(&lookup).await.unwrap();
    assert!(record.identifying.content.is_demo());
    assert!(record.deidentified.content.is_demo());

    let again = f.editor.set_demo(&lookup, true).await.unwrap();
    assert!(!again.any());
}

#[tokio::test]
async fn test_missing_identifying_row_is_lookup_failure() {
    let f = fixture(SplitStores::in_memory()).await;
    f.editor
        .deidentified()
        .ingest(&[RecordAttributes::new(
            RecordKey::new("orphan-1").unwrap(),
            json!({}),
            json!({}),
        )])
        .await
        .unwrap();

    let result = f.editor.load(&"orphan".parse().unwrap()).await;
    match result {
        Err(SplitStoreError::RecordNotFound { label, .. }) => assert_eq!(label, "PII"),
        other => panic!("expected missing PII row, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dry_run_copy_leaves_source_untouched() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest(&f, "a9c2f0e1").await;
    let key = RecordKey::new("a9c2f0e1").unwrap();

    let copy = f.stores.copy_into_memory(&f.records, &key).await.unwrap();
    let dry = fixture(copy).await;
    let lookup: RecordLookup = "a9c2f0e1".parse().unwrap();
    assert!(dry.editor.set_demo(&lookup, true).await.unwrap().any());

    let source = f.editor.load(&lookup).await.unwrap();
    assert!(!source.deidentified.content.is_demo());
    assert!(dry
        .editor
        .load(&lookup)
        .await
        .unwrap()
        .deidentified
        .content
        .is_demo());
    assert_eq!(dry.stores.identifying.name(), "memory");
}

#[tokio::test]
async fn test_failed_invalidation_is_retried_with_the_edit() {
    let deidentified = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        offline: AtomicBool::new(false),
    });
    let f = fixture(SplitStores {
        identifying: Arc::new(MemoryStore::new()),
        deidentified: Arc::clone(&deidentified) as Arc<dyn RecordStore>,
    })
    .await;
    ingest(&f, "a9c2f0e1").await;
    let lookup: RecordLookup = "a9c2f0e1".parse().unwrap();

    let record = f.editor.load(&lookup).await.unwrap();
    f.markers
        .mark_exported(record.deidentified.row_id)
        .await
        .unwrap();
    let edited = json!({"email": "pat@example.org", "isDemo": false});

    deidentified.offline.store(true, Ordering::SeqCst);
    let first = f
        .editor
        .update_identifying(&record.identifying, edited.clone())
        .await;
    deidentified.offline.store(false, Ordering::SeqCst);
    assert!(matches!(first, Err(SplitStoreError::Database(_))));

    // Nothing was written while the marker could not be deleted
    let reloaded = f.editor.load(&lookup).await.unwrap();
    assert_eq!(reloaded.identifying.content["email"], "pat@example.com");

    let changed = f
        .editor
        .update_identifying(&reloaded.identifying, edited)
        .await
        .unwrap();
    assert!(changed);
    assert!(f
        .markers
        .exported_at(record.deidentified.row_id)
        .await
        .unwrap()
        .is_none());
    let after = f.editor.load(&lookup).await.unwrap();
    assert_eq!(after.identifying.content["email"], "pat@example.org");
}

#[tokio::test]
async fn test_identifying_only_demo_change_invalidates_export() {
    let f = fixture(SplitStores::in_memory()).await;
    ingest_with(&f, "a9c2f0e1", true).await;
    let lookup: RecordLookup = "a9c2f0e1".parse().unwrap();

    let record = f.editor.load(&lookup).await.unwrap();
    f.markers
        .mark_exported(record.deidentified.row_id)
        .await
        .unwrap();

    let change = f.editor.set_demo(&lookup, true).await.unwrap();
    assert!(change.identifying);
    assert!(!change.deidentified);
    assert!(f
        .markers
        .exported_at(record.deidentified.row_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_demo_flag_on_non_object_content_is_rejected() {
    let f = fixture(SplitStores::in_memory()).await;
    let key = RecordKey::new("b71d0c44").unwrap();
    f.editor
        .identifying()
        .ingest(&[RecordAttributes::new(key.clone(), json!({}), json!({"email": "x"}))])
        .await
        .unwrap();
    f.editor
        .deidentified()
        .ingest(&[RecordAttributes::new(key, json!({}), json!(["fever"]))])
        .await
        .unwrap();

    let result = f.editor.set_demo(&"b71d".parse().unwrap(), true).await;
    assert!(matches!(result, Err(SplitStoreError::Validation(_))));
}
