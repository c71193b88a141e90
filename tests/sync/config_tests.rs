// Config directory loading tests.

use data_sync::config::{ConfigStore, SyncDirection, SyncType};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

#[tokio::test]
async fn test_load_dir_merges_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("10-files.json"),
        json!({ "Files": [{
            "Path": "/etc/app/app.conf",
            "SyncDirection": "Active2Passive",
            "SyncType": "Immediate"
        }] })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("20-dirs.json"),
        json!({ "Directories": [{
            "Path": "/var/lib/app",
            "SyncDirection": "Bidirectional",
            "SyncType": "Periodic",
            "Periodicity": "PT30S",
            "ExcludeFilesList": ["/var/lib/app/cache"]
        }] })
        .to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let store = ConfigStore::load_dir(dir.path()).await.unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.rejected().is_empty());

    let file = store.get(Path::new("/etc/app/app.conf")).unwrap();
    assert_eq!(file.direction, SyncDirection::Active2Passive);
    assert_eq!(file.sync_type, SyncType::Immediate);

    let tree = store.get(Path::new("/var/lib/app")).unwrap();
    assert_eq!(tree.periodicity(), Some(Duration::from_secs(30)));
    assert!(!tree.filter.admits(Path::new("cache/blob")));
    assert!(tree.filter.admits(Path::new("db/state")));
}

#[tokio::test]
async fn test_bad_document_and_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a-broken.json"), "{ not json").unwrap();
    std::fs::write(
        dir.path().join("b-mixed.json"),
        json!({ "Files": [
            { "Path": "relative/path", "SyncDirection": "Bidirectional", "SyncType": "Immediate" },
            { "Path": "/ok", "SyncDirection": "Bidirectional", "SyncType": "Periodic", "Periodicity": "PT1M" },
            { "Path": "/no-period", "SyncDirection": "Bidirectional", "SyncType": "Periodic" }
        ] })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("c-duplicate.json"),
        json!({ "Files": [
            { "Path": "/ok", "SyncDirection": "Active2Passive", "SyncType": "Immediate" }
        ] })
        .to_string(),
    )
    .unwrap();

    let store = ConfigStore::load_dir(dir.path()).await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.rejected().len(), 4);
    assert_eq!(store.get(Path::new("/ok")).unwrap().direction, SyncDirection::Bidirectional);
}

#[tokio::test]
async fn test_missing_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ConfigStore::load_dir(&dir.path().join("absent")).await.is_err());
}
