#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use chrono::{TimeZone, Utc};
use recordsync_core::modules::config::parse_config;
use recordsync_core::modules::memory_store::MemoryRemoteStore;
use recordsync_core::modules::repository::LocalStore;
use recordsync_core::modules::sqlite_store::{LocalTable, SqliteDatabase, SqliteLocalStore};
use recordsync_core::modules::watermark::{MemoryWatermarkStore, WatermarkStore};
use recordsync_core::sync::{CollectingErrorSink, RecordBinding, Runner, RunnerConfig};
use recordsync_core::{Engine, SyncMapping};
use recordsync_types::{Attributes, FieldMapping};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sqlite_store() -> SqliteLocalStore {
    let db = SqliteDatabase::open_in_memory().expect("in-memory sqlite");
    let store = db.table(
        LocalTable::new("custom_objects", ["name", "example"]).expect("valid table"),
    );
    store.ensure_table().await.expect("table created");
    store
}

fn binding(local: SqliteLocalStore, remote: Arc<MemoryRemoteStore>) -> SyncMapping {
    RecordBinding::new("custom_objects", Arc::new(local), remote)
        .with_labels("custom_objects", "CustomObject__c")
        .add_mappings([
            FieldMapping::new("name", "Name"),
            FieldMapping::new("example", "Example_Field__c"),
        ])
        .expect("valid fields")
        .build()
        .expect("valid binding")
}

fn runner(sink: Arc<CollectingErrorSink>) -> Runner {
    Runner::new(Arc::new(MemoryWatermarkStore::new()), sink, RunnerConfig::default())
}

#[tokio::test]
async fn test_remote_record_lands_in_sqlite_with_translated_fields() {
    let local = sqlite_store().await;
    let remote = Arc::new(MemoryRemoteStore::new());
    let source = remote.insert(
        Attributes::from([
            ("Name".to_string(), json!("Custom object")),
            ("Example_Field__c".to_string(), json!("Some sample text")),
        ]),
        Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("valid stamp"),
    );
    let sink = Arc::new(CollectingErrorSink::new());
    let mapping = binding(local.clone(), remote.clone());

    let report = runner(sink.clone()).run(&mapping).await.expect("cycle runs");

    assert_eq!(report.created_local, 1);
    assert!(sink.is_empty());
    let stored = local
        .find_linked(&source.id)
        .await
        .expect("query succeeds")
        .expect("record linked to remote id");
    assert_eq!(stored.attributes["name"], json!("Custom object"));
    assert_eq!(stored.attributes["example"], json!("Some sample text"));
    assert_eq!(stored.remote_id.as_deref(), Some(source.id.as_str()));
    assert_eq!(stored.synchronized_at, Some(source.last_modified));
}

#[tokio::test]
async fn test_local_row_bootstraps_remote_and_settles() {
    let local = sqlite_store().await;
    let remote = Arc::new(MemoryRemoteStore::new());
    let row = local
        .create(
            &Attributes::from([
                ("name".to_string(), json!("From the app")),
                ("example".to_string(), json!("typed locally")),
            ]),
            None,
        )
        .await
        .expect("insert succeeds");
    let sink = Arc::new(CollectingErrorSink::new());
    let runner = runner(sink.clone());
    let mapping = binding(local.clone(), remote.clone());

    let first = runner.run(&mapping).await.expect("first cycle");
    assert_eq!(first.created_remote, 1);
    let linked = local.find(row.id).await.expect("query").expect("row exists");
    let remote_id = linked.remote_id.expect("row linked");
    assert_eq!(remote.get(&remote_id).expect("remote exists").fields["Name"], json!("From the app"));

    let remote_writes = remote.writes();
    let second = runner.run(&mapping).await.expect("second cycle");
    assert_eq!(second.writes(), 0);
    assert_eq!(remote.writes(), remote_writes);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_remote_edit_overwrites_sqlite_row() {
    let local = sqlite_store().await;
    let remote = Arc::new(MemoryRemoteStore::new());
    let at = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("valid stamp");
    let source = remote.insert(
        Attributes::from([
            ("Name".to_string(), json!("v1")),
            ("Example_Field__c".to_string(), json!("v1")),
        ]),
        at,
    );
    let sink = Arc::new(CollectingErrorSink::new());
    let runner = runner(sink.clone());
    let mapping = binding(local.clone(), remote.clone());
    runner.run(&mapping).await.expect("bootstrap cycle");

    // Millisecond stamps: step past the previous cycle's start.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let edited = remote
        .edit(&source.id, Attributes::from([("Name".to_string(), json!("v2"))]))
        .expect("remote record exists");
    let report = runner.run(&mapping).await.expect("sync cycle");

    assert_eq!(report.updated_local, 1);
    let stored = local.find_linked(&source.id).await.expect("query").expect("linked");
    assert_eq!(stored.attributes["name"], json!("v2"));
    assert_eq!(stored.synchronized_at, Some(edited.last_modified));
}

fn sf_record(id: &str, name: &str) -> serde_json::Value {
    json!({
        "attributes": { "type": "CustomObject__c" },
        "Id": id,
        "SystemModstamp": "2024-05-01T12:00:00.000+0000",
        "Name": name,
        "Example_Field__c": "Some sample text"
    })
}

#[tokio::test]
async fn test_engine_from_config_runs_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/data/v59.0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": 1,
            "done": true,
            "records": [sf_record("a0M000000000001", "Custom object")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let config = parse_config(
        &json!({
            "local": { "database_path": dir.path().join("sync.db") },
            "remote": { "base_url": server.uri(), "access_token": "token", "max_retries": 0 },
            "watermark_path": dir.path().join("watermarks.json"),
            "mappings": [{
                "name": "custom_objects",
                "local_table": "custom_objects",
                "remote_object": "CustomObject__c",
                "fields": [
                    { "local": "name", "remote": "Name" },
                    { "local": "example", "remote": "Example_Field__c" }
                ]
            }]
        })
        .to_string(),
    )
    .expect("config parses");
    config.validate().expect("config valid");

    let engine = Engine::from_config(&config).await.expect("engine builds");
    let reports = engine.run_once(None).await.expect("cycle runs");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].created_local, 1);
    assert_eq!(reports[0].errors, 0);
    let local = engine.mapping("custom_objects").expect("mapping exists").local();
    let linked = local
        .find_linked("a0M000000000001")
        .await
        .expect("lookup succeeds")
        .expect("record created");
    assert_eq!(linked.attribute("name"), Some(&json!("Custom object")));

    let again = engine.run_once(Some("custom_objects")).await.expect("second cycle");
    assert_eq!(again[0].writes(), 0);

    let marks = engine.runner().watermarks().all().await.expect("watermarks readable");
    assert_eq!(marks.get("custom_objects"), Some(&again[0].started_at));
    assert!(engine.run_once(Some("unknown")).await.is_err());
}
