//! Integration tests for draft persistence on a file-backed store
//!
//! These tests exercise `DraftStore` over `FileStorage` the way the CLI uses
//! it: every operation goes through a JSON file in a temporary state
//! directory, and stores are reopened to check what actually landed on disk.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use wizard_drafts::config::Config;
use wizard_drafts::drafts::{DraftEnvelope, DraftStore};
use wizard_drafts::storage::{FileStorage, StorageBackend};

fn open_store(dir: &TempDir) -> (DraftStore, Arc<FileStorage>) {
    let storage = Arc::new(FileStorage::open(dir.path().join("drafts.json"), None).unwrap());
    (DraftStore::new(storage.clone()), storage)
}

fn stale_record(store: &DraftStore, id: &str, age: Duration) -> (String, String) {
    let envelope = DraftEnvelope {
        data: json!({ "title": "Forgotten plot" }),
        timestamp: (Utc::now() - age).timestamp_millis(),
        draft_id: id.to_string(),
        owner_id: "user-1".to_string(),
        wizard_type: "land".to_string(),
        current_step_id: Some("basic".to_string()),
        created_at: None,
    };
    (
        store.key("land", "user-1", id),
        serde_json::to_string(&envelope).unwrap(),
    )
}

#[test]
fn test_draft_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let payload = json!({ "title": "Sea view villa", "price": 250_000 });

    let id = {
        let (store, _) = open_store(&dir);
        store
            .save("property", "user-1", &payload, None, Some("location"))
            .unwrap()
    };

    let (store, _) = open_store(&dir);
    let draft = store.load_draft("property", "user-1", &id).unwrap();
    assert_eq!(draft.payload, payload);
    assert_eq!(draft.current_step_id.as_deref(), Some("location"));
    assert_eq!(draft.expires_at - draft.updated_at, Duration::hours(24));
}

#[test]
fn test_on_disk_record_shape() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open_store(&dir);
    store.save("blog", "user-9", &json!({ "title": "Hi" }), Some("d1"), None);

    let contents = std::fs::read_to_string(dir.path().join("drafts.json")).unwrap();
    let file: Value = serde_json::from_str(&contents).unwrap();
    let raw = file["wizard_draft_blog_user-9_d1"].as_str().unwrap();
    let record: Value = serde_json::from_str(raw).unwrap();

    assert_eq!(record["data"], json!({ "title": "Hi" }));
    assert_eq!(record["draftId"], "d1");
    assert_eq!(record["ownerId"], "user-9");
    assert_eq!(record["wizardType"], "blog");
    assert!(record["timestamp"].is_i64());
}

#[test]
fn test_sweep_on_reopened_store() {
    let dir = TempDir::new().unwrap();
    {
        let (store, storage) = open_store(&dir);
        let (key, raw) = stale_record(&store, "old", Duration::hours(25));
        storage.set(&key, &raw).unwrap();
        storage
            .set(&store.key("land", "user-1", "broken"), "{not valid json")
            .unwrap();
        storage.set("ui_theme", "dark").unwrap();
        store.save("land", "user-1", &json!({ "title": "Fresh" }), Some("fresh"), None);
    }

    let (store, storage) = open_store(&dir);
    assert_eq!(store.clear_expired_drafts(), 2);
    assert!(store.has_draft("land", "user-1", "fresh"));
    assert_eq!(storage.get("ui_theme").unwrap().as_deref(), Some("dark"));

    let (store, _) = open_store(&dir);
    assert_eq!(store.list_drafts("user-1", None).len(), 1);
}

#[test]
fn test_expired_draft_removed_on_load() {
    let dir = TempDir::new().unwrap();
    let (store, storage) = open_store(&dir);
    let (key, raw) = stale_record(&store, "old", Duration::hours(24) + Duration::milliseconds(1));
    storage.set(&key, &raw).unwrap();

    assert!(store.load("land", "user-1", "old").is_none());
    assert!(storage.get(&key).unwrap().is_none());
}

#[test]
fn test_full_file_store_keeps_working() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path().join("drafts.json"), Some(64)).unwrap());
    let store = DraftStore::new(storage.clone());

    let big = json!({ "description": "x".repeat(500) });
    let id = store.save("property", "user-1", &big, Some("d1"), None);
    assert_eq!(id.as_deref(), Some("d1"));
    assert!(!store.has_draft("property", "user-1", "d1"));
    assert!(storage.keys().unwrap().is_empty());
}

#[test]
fn test_config_controls_prefix_and_ttl() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.paths.state = dir.path().to_string_lossy().to_string();
    config.persistence.key_prefix = "listing".to_string();
    config.persistence.ttl_hours = 1;

    let store = config.draft_store().unwrap();
    assert_eq!(store.ttl(), Duration::hours(1));
    let id = store
        .save("property", "user-1", &json!({ "title": "Flat" }), None, None)
        .unwrap();

    let contents = std::fs::read_to_string(config.drafts_path()).unwrap();
    assert!(contents.contains(&format!("listing_property_user-1_{id}")));
}
