//! Draft persistence over a client-side key/value store.
//!
//! Drafts live under `{prefix}_{wizardType}_{ownerId}_{draftId}`. Nothing in
//! this module returns a storage error: when the backend is missing, failing
//! or full, operations log and fall back to `None`/`false`, so a wizard keeps
//! working without persistence.

mod record;
mod tentative;

pub use record::{DraftEnvelope, DraftSummary, WizardDraft};
pub use tentative::TentativeWrite;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::StorageBackend;

/// Default key namespace for drafts
pub const DEFAULT_KEY_PREFIX: &str = "wizard_draft";

/// Default draft lifetime since the last write
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Keyed CRUD for wizard drafts
pub struct DraftStore {
    backend: Option<Arc<dyn StorageBackend>>,
    key_prefix: String,
    ttl: Duration,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("available", &self.backend.is_some())
            .field("key_prefix", &self.key_prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Why a stored value could not be used as a draft
enum RecordState {
    Live(DraftEnvelope),
    Expired,
    Corrupt,
}

impl DraftStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// A store with no backend: every operation is a no-op
    pub fn unavailable() -> Self {
        Self {
            backend: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Storage key for a draft.
    ///
    /// Segments are joined with `_` unescaped. The key stays unambiguous only
    /// while `wizard_type` and `draft_id` contain no `_`, which [`Self::save`]
    /// enforces; `owner_id` may contain anything.
    pub fn key(&self, wizard_type: &str, owner_id: &str, draft_id: &str) -> String {
        format!("{}_{wizard_type}_{owner_id}_{draft_id}", self.key_prefix)
    }

    /// Persist a payload, creating the draft if needed.
    ///
    /// Returns the draft id, generating one when `draft_id` is `None`. A full
    /// store is logged and swallowed (the id is still returned); an
    /// unavailable or failing store yields `None`.
    pub fn save(
        &self,
        wizard_type: &str,
        owner_id: &str,
        payload: &Value,
        draft_id: Option<&str>,
        step_id: Option<&str>,
    ) -> Option<String> {
        let backend = self.backend.as_ref()?;

        let draft_id = draft_id
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if !is_key_segment(wizard_type) || !is_key_segment(&draft_id) {
            tracing::warn!(
                wizard_type,
                draft_id = %draft_id,
                "Draft not saved: wizard type and draft id must be non-empty and free of '_'"
            );
            return None;
        }
        let key = self.key(wizard_type, owner_id, &draft_id);

        let now = Utc::now().timestamp_millis();
        let previous = match self.read(backend.as_ref(), &key) {
            Some(RecordState::Live(envelope)) => Some(envelope),
            _ => None,
        };

        let envelope = DraftEnvelope {
            data: payload.clone(),
            // never move backwards, even if the clock does
            timestamp: previous
                .as_ref()
                .map_or(now, |p| now.max(p.timestamp.saturating_add(1))),
            draft_id: draft_id.clone(),
            owner_id: owner_id.to_string(),
            wizard_type: wizard_type.to_string(),
            current_step_id: step_id
                .map(ToString::to_string)
                .or_else(|| previous.as_ref().and_then(|p| p.current_step_id.clone())),
            created_at: Some(
                previous
                    .as_ref()
                    .map_or(now, |p| p.created_at.unwrap_or(p.timestamp)),
            ),
        };

        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize draft");
                return None;
            }
        };

        match backend.set(&key, &raw) {
            Ok(()) => {
                tracing::debug!(key = %key, "Draft saved");
                Some(draft_id)
            }
            Err(e) if e.is_quota_exceeded() => {
                // make room from expired drafts, then try once more
                if self.clear_expired_drafts() > 0 && backend.set(&key, &raw).is_ok() {
                    tracing::debug!(key = %key, "Draft saved after clearing expired drafts");
                    return Some(draft_id);
                }
                tracing::warn!(key = %key, error = %e, "Draft not saved: storage full");
                Some(draft_id)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Draft not saved: storage unavailable");
                None
            }
        }
    }

    /// Load a draft's payload
    pub fn load(&self, wizard_type: &str, owner_id: &str, draft_id: &str) -> Option<Value> {
        self.load_draft(wizard_type, owner_id, draft_id)
            .map(|draft| draft.payload)
    }

    /// Load a draft with its metadata.
    ///
    /// Missing, unparsable and mismatched records read as `None`. Expired
    /// records are deleted on the way.
    pub fn load_draft(
        &self,
        wizard_type: &str,
        owner_id: &str,
        draft_id: &str,
    ) -> Option<WizardDraft> {
        let backend = self.backend.as_ref()?;
        let key = self.key(wizard_type, owner_id, draft_id);

        match self.read(backend.as_ref(), &key)? {
            RecordState::Live(envelope) => Some(envelope.to_draft(self.ttl)),
            RecordState::Expired => {
                tracing::debug!(key = %key, "Draft expired, removing");
                self.remove_key(backend.as_ref(), &key);
                None
            }
            RecordState::Corrupt => None,
        }
    }

    /// Remove a draft. `false` only when storage could not be reached.
    pub fn delete(&self, wizard_type: &str, owner_id: &str, draft_id: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let key = self.key(wizard_type, owner_id, draft_id);
        self.remove_key(backend.as_ref(), &key)
    }

    pub fn has_draft(&self, wizard_type: &str, owner_id: &str, draft_id: &str) -> bool {
        self.load_draft(wizard_type, owner_id, draft_id).is_some()
    }

    /// Delete every expired or unreadable draft. Unrelated keys are left alone.
    ///
    /// Returns the number of records removed.
    pub fn clear_expired_drafts(&self) -> usize {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };

        let mut removed = 0;
        for key in self.draft_keys(backend.as_ref()) {
            match self.read(backend.as_ref(), &key) {
                Some(RecordState::Expired | RecordState::Corrupt) => {
                    if self.remove_key(backend.as_ref(), &key) {
                        removed += 1;
                    }
                }
                Some(RecordState::Live(_)) | None => {}
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Cleared expired drafts");
        }
        removed
    }

    /// Live drafts belonging to `owner_id`, newest first
    pub fn list_drafts(&self, owner_id: &str, wizard_type: Option<&str>) -> Vec<DraftSummary> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };

        let mut drafts: Vec<DraftSummary> = self
            .draft_keys(backend.as_ref())
            .into_iter()
            .filter_map(|key| match self.read(backend.as_ref(), &key)? {
                RecordState::Live(envelope) => Some(envelope),
                RecordState::Expired => {
                    self.remove_key(backend.as_ref(), &key);
                    None
                }
                RecordState::Corrupt => None,
            })
            .filter(|envelope| envelope.owner_id == owner_id)
            .filter(|envelope| wizard_type.map_or(true, |wt| envelope.wizard_type == wt))
            .map(|envelope| envelope.to_summary(self.ttl))
            .collect();

        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        drafts
    }

    /// Apply a save immediately, keeping the previous record for rollback
    pub fn begin_tentative(
        &self,
        wizard_type: &str,
        owner_id: &str,
        draft_id: &str,
        payload: &Value,
        step_id: Option<&str>,
    ) -> Option<TentativeWrite<'_>> {
        let backend = self.backend.as_ref()?;
        let key = self.key(wizard_type, owner_id, draft_id);
        let snapshot = self.snapshot(backend.as_ref(), &key)?;

        self.save(wizard_type, owner_id, payload, Some(draft_id), step_id)?;
        Some(TentativeWrite::new(self, key, snapshot))
    }

    /// Apply a delete immediately, keeping the previous record for rollback
    pub fn begin_tentative_delete(
        &self,
        wizard_type: &str,
        owner_id: &str,
        draft_id: &str,
    ) -> Option<TentativeWrite<'_>> {
        let backend = self.backend.as_ref()?;
        let key = self.key(wizard_type, owner_id, draft_id);
        let snapshot = self.snapshot(backend.as_ref(), &key)?;

        if !self.remove_key(backend.as_ref(), &key) {
            return None;
        }
        Some(TentativeWrite::new(self, key, snapshot))
    }

    /// Put a raw record back (or remove the key when there was none)
    pub(crate) fn restore_raw(&self, key: &str, snapshot: Option<&str>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let result = match snapshot {
            Some(raw) => backend.set(key, raw),
            None => backend.remove(key),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to restore draft snapshot");
                false
            }
        }
    }

    /// Raw value currently stored under `key`; outer `None` if storage failed
    fn snapshot(&self, backend: &dyn StorageBackend, key: &str) -> Option<Option<String>> {
        match backend.get(key) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to snapshot draft");
                None
            }
        }
    }

    /// Classify the record under `key`; `None` if absent or storage failed
    fn read(&self, backend: &dyn StorageBackend, key: &str) -> Option<RecordState> {
        let raw = match backend.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read draft");
                return None;
            }
        };

        let envelope = match DraftEnvelope::parse(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(key, error = %e, "Unreadable draft record");
                return Some(RecordState::Corrupt);
            }
        };

        if !envelope.has_valid_times(self.ttl) {
            tracing::debug!(key, "Draft record has out-of-range timestamps");
            return Some(RecordState::Corrupt);
        }

        if self.key(&envelope.wizard_type, &envelope.owner_id, &envelope.draft_id) != key {
            tracing::debug!(key, "Draft record does not match its key");
            return Some(RecordState::Corrupt);
        }

        if envelope.is_expired(Utc::now().timestamp_millis(), self.ttl) {
            return Some(RecordState::Expired);
        }

        Some(RecordState::Live(envelope))
    }

    fn draft_keys(&self, backend: &dyn StorageBackend) -> Vec<String> {
        let prefix = format!("{}_", self.key_prefix);
        match backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&prefix)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate draft keys");
                Vec::new()
            }
        }
    }

    fn remove_key(&self, backend: &dyn StorageBackend, key: &str) -> bool {
        match backend.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to remove draft");
                false
            }
        }
    }
}

/// Outer key segments must not contain the separator
fn is_key_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn store() -> (DraftStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        (DraftStore::new(Arc::new(storage.clone())), storage)
    }

    fn raw_record(wizard_type: &str, owner: &str, id: &str, age: Duration) -> String {
        serde_json::to_string(&DraftEnvelope {
            data: json!({ "title": "Old" }),
            timestamp: (Utc::now() - age).timestamp_millis(),
            draft_id: id.to_string(),
            owner_id: owner.to_string(),
            wizard_type: wizard_type.to_string(),
            current_step_id: None,
            created_at: None,
        })
        .unwrap()
    }

    #[test]
    fn test_key_scheme() {
        let (store, _) = store();
        assert_eq!(
            store.key("property", "user-1", "abc"),
            "wizard_draft_property_user-1_abc"
        );
        let store = store.with_key_prefix("listing");
        assert_eq!(store.key("land", "u", "1"), "listing_land_u_1");
    }

    #[test]
    fn test_save_generates_id_and_round_trips() {
        let (store, storage) = store();
        let payload = json!({ "title": "Villa", "price": 100_000 });

        let id = store.save("property", "user-1", &payload, None, Some("basic")).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(store.load("property", "user-1", &id), Some(payload));

        let raw = storage.get_raw(&store.key("property", "user-1", &id)).unwrap();
        let envelope = DraftEnvelope::parse(&raw).unwrap();
        assert_eq!(envelope.draft_id, id);
        assert_eq!(envelope.owner_id, "user-1");
        assert_eq!(envelope.wizard_type, "property");
        assert_eq!(envelope.current_step_id.as_deref(), Some("basic"));
    }

    #[test]
    fn test_save_is_idempotent_and_monotonic() {
        let (store, _) = store();
        let payload = json!({ "title": "Villa" });

        let id = store.save("property", "u", &payload, Some("d1"), None).unwrap();
        let first = store.load_draft("property", "u", &id).unwrap();
        store.save("property", "u", &payload, Some("d1"), None).unwrap();
        let second = store.load_draft("property", "u", &id).unwrap();

        assert_eq!(first.payload, second.payload);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.expires_at, second.updated_at + Duration::hours(24));
    }

    #[test]
    fn test_step_id_is_kept_when_not_given() {
        let (store, _) = store();
        store.save("blog", "u", &json!({}), Some("d1"), Some("seo"));
        store.save("blog", "u", &json!({ "a": 1 }), Some("d1"), None);
        let draft = store.load_draft("blog", "u", "d1").unwrap();
        assert_eq!(draft.current_step_id.as_deref(), Some("seo"));
    }

    #[test]
    fn test_ambiguous_key_segments_are_rejected() {
        let (store, storage) = store();
        assert_eq!(store.key("a_b", "c", "d1"), store.key("a", "b_c", "d1"));

        assert!(store.save("a_b", "c", &json!({}), Some("d1"), None).is_none());
        assert!(store.save("land", "u", &json!({}), Some("x_y"), None).is_none());
        assert!(store.save("land", "u", &json!({}), Some(""), None).is_none());
        assert!(storage.is_empty());

        // underscores in the owner are fine once the outer segments are clean
        let id = store.save("land", "user_1", &json!({ "a": 1 }), None, None).unwrap();
        assert_eq!(store.load("land", "user_1", &id), Some(json!({ "a": 1 })));
        assert!(store.load("land", "user", &id).is_none());
    }

    #[test]
    fn test_min_timestamp_record_reads_as_missing() {
        let (store, storage) = store();
        let key = store.key("property", "u", "d1");
        storage.insert_raw(
            &key,
            r#"{"data":{},"timestamp":-9223372036854775808,"draftId":"d1","ownerId":"u","wizardType":"property"}"#,
        );

        assert!(store.load("property", "u", "d1").is_none());
        assert!(store.list_drafts("u", None).is_empty());
        assert_eq!(store.clear_expired_drafts(), 1);
        assert!(storage.get_raw(&key).is_none());
    }

    #[test]
    fn test_max_timestamp_record_is_overwritten_on_save() {
        let (store, storage) = store();
        let key = store.key("property", "u", "d1");
        storage.insert_raw(
            &key,
            r#"{"data":{},"timestamp":9223372036854775807,"draftId":"d1","ownerId":"u","wizardType":"property"}"#,
        );

        assert!(store.load_draft("property", "u", "d1").is_none());
        let id = store.save("property", "u", &json!({ "title": "Fresh" }), Some("d1"), None);
        assert_eq!(id.as_deref(), Some("d1"));

        let draft = store.load_draft("property", "u", "d1").unwrap();
        assert_eq!(draft.payload, json!({ "title": "Fresh" }));
        assert!(draft.updated_at <= Utc::now());
    }

    #[test]
    fn test_owner_isolation() {
        let (store, _) = store();
        let id = store
            .save("property", "user-1", &json!({ "title": "Villa" }), None, None)
            .unwrap();
        assert!(store.load("property", "user-2", &id).is_none());
        assert!(store.load("land", "user-1", &id).is_none());
    }

    #[test]
    fn test_ttl_boundary() {
        let (store, storage) = store();
        let expired_key = store.key("property", "u", "old");
        let fresh_key = store.key("property", "u", "fresh");
        storage.insert_raw(
            &expired_key,
            &raw_record("property", "u", "old", Duration::hours(24) + Duration::milliseconds(1)),
        );
        storage.insert_raw(
            &fresh_key,
            &raw_record("property", "u", "fresh", Duration::hours(23) + Duration::minutes(59)),
        );

        assert!(store.load("property", "u", "old").is_none());
        assert!(storage.get_raw(&expired_key).is_none());
        assert_eq!(store.load("property", "u", "fresh"), Some(json!({ "title": "Old" })));
    }

    #[test]
    fn test_corrupt_record_reads_as_missing() {
        let (store, storage) = store();
        let key = store.key("property", "u", "bad");
        storage.insert_raw(&key, "{not valid json");
        assert!(store.load("property", "u", "bad").is_none());
        assert!(!store.has_draft("property", "u", "bad"));
    }

    #[test]
    fn test_record_under_wrong_key_is_corrupt() {
        let (store, storage) = store();
        storage.insert_raw(
            &store.key("property", "user-2", "d1"),
            &raw_record("property", "user-1", "d1", Duration::zero()),
        );
        assert!(store.load("property", "user-2", "d1").is_none());
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let storage = MemoryStorage::with_capacity(16);
        let store = DraftStore::new(Arc::new(storage.clone()));
        let id = store.save("property", "u", &json!({ "title": "Villa" }), Some("d1"), None);
        assert_eq!(id.as_deref(), Some("d1"));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_quota_retry_after_sweep() {
        let (probe, _) = store();
        let stale = raw_record("property", "u", "old", Duration::hours(48));
        let stale_key = probe.key("property", "u", "old");
        let capacity = stale_key.len() + stale.len() + 64;

        let storage = MemoryStorage::with_capacity(capacity);
        storage.insert_raw(&stale_key, &stale);
        let store = DraftStore::new(Arc::new(storage.clone()));

        let id = store.save("property", "u", &json!({ "title": "New" }), Some("d2"), None);
        assert_eq!(id.as_deref(), Some("d2"));
        assert!(storage.get_raw(&stale_key).is_none());
        assert_eq!(store.load("property", "u", "d2"), Some(json!({ "title": "New" })));
    }

    #[test]
    fn test_unavailable_backend_degrades() {
        let store = DraftStore::new(Arc::new(MemoryStorage::unavailable()));
        assert!(store.save("property", "u", &json!({}), None, None).is_none());
        assert!(store.load("property", "u", "d1").is_none());
        assert!(!store.delete("property", "u", "d1"));
        assert!(!store.has_draft("property", "u", "d1"));
        assert_eq!(store.clear_expired_drafts(), 0);
        assert!(store.list_drafts("u", None).is_empty());

        let store = DraftStore::unavailable();
        assert!(!store.is_available());
        assert!(store.save("property", "u", &json!({}), None, None).is_none());
        assert!(store.begin_tentative_delete("property", "u", "d1").is_none());
    }

    #[test]
    fn test_delete() {
        let (store, _) = store();
        let id = store.save("land", "u", &json!({}), None, None).unwrap();
        assert!(store.has_draft("land", "u", &id));
        assert!(store.delete("land", "u", &id));
        assert!(!store.has_draft("land", "u", &id));
    }

    #[test]
    fn test_clear_expired_leaves_live_and_unrelated_keys() {
        let (store, storage) = store();
        let live = store.save("blog", "u", &json!({ "title": "Hi" }), None, None).unwrap();
        storage.insert_raw(
            &store.key("blog", "u", "old"),
            &raw_record("blog", "u", "old", Duration::hours(30)),
        );
        storage.insert_raw(&store.key("blog", "u", "junk"), "{not valid json");
        storage.insert_raw("theme", "dark");

        assert_eq!(store.clear_expired_drafts(), 2);
        assert!(store.has_draft("blog", "u", &live));
        assert_eq!(storage.get_raw("theme").as_deref(), Some("dark"));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_list_drafts_filters_and_orders() {
        let (store, storage) = store();
        storage.insert_raw(
            &store.key("property", "u", "older"),
            &raw_record("property", "u", "older", Duration::hours(2)),
        );
        store.save("property", "u", &json!({}), Some("newer"), None);
        store.save("land", "u", &json!({}), Some("land-1"), None);
        store.save("property", "someone-else", &json!({}), Some("x"), None);

        let all: Vec<String> = store.list_drafts("u", None).into_iter().map(|d| d.id).collect();
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&"x".to_string()));

        let property: Vec<String> = store
            .list_drafts("u", Some("property"))
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(property, vec!["newer", "older"]);
    }

    #[test]
    fn test_tentative_write_rollback_restores_previous() {
        let (store, _) = store();
        store.save("property", "u", &json!({ "title": "Before" }), Some("d1"), None);

        let tentative = store
            .begin_tentative("property", "u", "d1", &json!({ "title": "After" }), None)
            .unwrap();
        assert_eq!(store.load("property", "u", "d1"), Some(json!({ "title": "After" })));

        assert!(tentative.rollback());
        assert_eq!(store.load("property", "u", "d1"), Some(json!({ "title": "Before" })));
    }

    #[test]
    fn test_tentative_write_rollback_of_new_draft_removes_it() {
        let (store, _) = store();
        let tentative = store
            .begin_tentative("property", "u", "fresh", &json!({ "title": "New" }), None)
            .unwrap();
        assert!(store.has_draft("property", "u", "fresh"));
        tentative.rollback();
        assert!(!store.has_draft("property", "u", "fresh"));
    }

    #[test]
    fn test_tentative_delete_confirm_and_rollback() {
        let (store, _) = store();
        store.save("blog", "u", &json!({ "title": "Hi" }), Some("d1"), None);

        let tentative = store.begin_tentative_delete("blog", "u", "d1").unwrap();
        assert!(!store.has_draft("blog", "u", "d1"));
        tentative.rollback();
        assert!(store.has_draft("blog", "u", "d1"));

        let tentative = store.begin_tentative_delete("blog", "u", "d1").unwrap();
        tentative.confirm();
        assert!(!store.has_draft("blog", "u", "d1"));
    }
}
