//! Export and backup against in-memory and file-backed stores.

use chrono::{DateTime, Utc};
use routelog_core::{
    BackupScheduler, ExportConfig, Exporter, ManualClock, PagerConfig, ReadFailurePolicy,
};
use routelog_storage::{InMemoryKvStore, KeyValueStore, ObjectStore};
use routelog_testkit::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn export_returns_exactly_the_store() {
    let env = TestEnv::with_kv(InMemoryKvStore::with_entries([("a", "1"), ("b", "2"), ("c", "3")]));
    let bundle = env.exporter(ExportConfig::default()).export().await.unwrap();

    let expected: BTreeMap<String, String> = [("a", "1"), ("b", "2"), ("c", "3")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(bundle.entries, expected);
}

#[tokio::test]
async fn export_includes_snapshots_and_flags() {
    let env = TestEnv::new();
    env.seed_account("amy", "tok", Some("[1,2]")).await;
    env.snapshots().soft_delete("amy").await.unwrap();

    let bundle = env.exporter(ExportConfig::default()).export().await.unwrap();
    assert_eq!(bundle.len(), 4);
    assert!(bundle.entries.keys().any(|k| k.starts_with("deleted:user:amy:")));
    assert!(bundle.entries.keys().any(|k| k.starts_with("deleted:logs:tok:")));
}

#[tokio::test]
async fn export_skip_policy_over_faulty_store() {
    let kv = FaultyKv::new(InMemoryKvStore::with_entries([("a", "1"), ("b", "2"), ("c", "3")]))
        .fail_get("a")
        .vanish("c");
    let env = TestEnv::with_kv(kv);

    let strict = env.exporter(ExportConfig::default()).export().await;
    assert!(strict.is_err());

    let lenient = ExportConfig::new().with_read_failure_policy(ReadFailurePolicy::SkipUnreadable);
    let bundle = env.exporter(lenient).export().await.unwrap();
    assert_eq!(bundle.entries.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(bundle.skipped, vec!["a"]);
    assert_eq!(bundle.vanished, vec!["c"]);
}

#[tokio::test]
async fn two_backups_same_day_leave_one_blob() {
    let env = TestEnv::new();
    env.kv.put("a", "first", None).await.unwrap();
    let scheduler = env.scheduler(ExportConfig::default());

    scheduler.run_scheduled_backup(at("2024-05-01T03:00:00Z")).await.unwrap();
    env.kv.put("a", "second", None).await.unwrap();
    scheduler.run_scheduled_backup(at("2024-05-01T18:30:00Z")).await.unwrap();

    assert_eq!(env.objects.list_names().await.unwrap(), vec!["logs-2024-05-01.json"]);
    let blob = env.objects.get("logs-2024-05-01.json").await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob.bytes).unwrap();
    assert_eq!(value, serde_json::json!({ "a": "second" }));
}

#[tokio::test]
async fn scheduled_backup_swallows_failures() {
    let objects = Arc::new(FailingObjectStore::new());
    let kv = Arc::new(InMemoryKvStore::with_entries([("a", "1")]));
    let scheduler = BackupScheduler::new(
        Exporter::new(kv),
        objects.clone(),
        Arc::new(ManualClock::from_millis(T0_MILLIS)),
    );

    assert!(scheduler.run_scheduled_backup(at("2024-05-01T03:00:00Z")).await.is_none());
    assert_eq!(objects.attempts(), 1);
    // The admin path reports the same failure.
    assert!(scheduler.backup_now().await.is_err());
}

#[tokio::test]
async fn scheduled_backup_swallows_listing_failures() {
    let kv = FaultyKv::new(InMemoryKvStore::with_entries([("a", "1")]));
    kv.set_fail_lists(true);
    let env = TestEnv::with_kv(kv);

    let scheduler = env.scheduler(ExportConfig::default());
    assert!(scheduler.run_scheduled_backup(at("2024-05-01T03:00:00Z")).await.is_none());
    assert!(env.objects.is_empty());
}

#[tokio::test]
async fn file_backed_round_trip() {
    let stores = TempStores::new();
    for i in 0..25 {
        stores
            .kv
            .put(&format!("user:u{i:02}"), r#"{"password":"p"}"#, None)
            .await
            .unwrap();
    }

    let config = ExportConfig::new().with_pager(PagerConfig::new().with_page_size(4));
    let scheduler = BackupScheduler::new(
        Exporter::with_config(stores.kv.clone(), config),
        stores.objects.clone(),
        Arc::new(ManualClock::from_millis(T0_MILLIS)),
    );
    let receipt = scheduler.backup_now().await.unwrap();
    assert_eq!(receipt.name, "logs-2024-05-01.json");
    assert_eq!(receipt.entries, 25);

    let blob = stores.objects.get(&receipt.name).await.unwrap().unwrap();
    assert_eq!(blob.bytes.len(), receipt.bytes);
    assert!(stores.path().join("backups").join(&receipt.name).is_file());

    let mut streamed = Vec::new();
    Exporter::new(Arc::new(stores.reopen_kv()))
        .export_to_writer(&mut streamed)
        .await
        .unwrap();
    assert_eq!(streamed, blob.bytes);
}

#[tokio::test]
async fn scheduled_backup_sees_writes_from_other_handles() {
    let stores = TempStores::new();
    let scheduler = BackupScheduler::new(
        Exporter::new(stores.kv.clone()),
        stores.objects.clone(),
        Arc::new(ManualClock::from_millis(T0_MILLIS)),
    );

    // Another process writes to the same data file after the daemon started.
    let other = stores.reopen_kv();
    other.put("user:amy", "{}", None).await.unwrap();

    let receipt = scheduler
        .run_scheduled_backup(at("2024-05-02T03:00:00Z"))
        .await
        .unwrap();
    assert_eq!(receipt.entries, 1);

    let blob = stores.objects.get(&receipt.name).await.unwrap().unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_slice(&blob.bytes).unwrap();
    assert_eq!(parsed.get("user:amy").map(String::as_str), Some("{}"));
}
