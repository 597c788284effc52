use super::DraftStore;

/// A draft write that has already been applied but can still be undone.
///
/// Holds the raw record that was under the key beforehand. `confirm` keeps
/// the new state; `rollback` puts the old record back, or removes the key if
/// there was none.
#[must_use = "a tentative write should be confirmed or rolled back"]
#[derive(Debug)]
pub struct TentativeWrite<'a> {
    store: &'a DraftStore,
    key: String,
    snapshot: Option<String>,
}

impl<'a> TentativeWrite<'a> {
    pub(super) fn new(store: &'a DraftStore, key: String, snapshot: Option<String>) -> Self {
        Self {
            store,
            key,
            snapshot,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a record existed before the write
    pub fn had_previous(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn confirm(self) {
        tracing::debug!(key = %self.key, "Tentative draft write confirmed");
    }

    /// Restore the previous record. `false` if storage refused.
    pub fn rollback(self) -> bool {
        let restored = self.store.restore_raw(&self.key, self.snapshot.as_deref());
        if restored {
            tracing::debug!(key = %self.key, "Tentative draft write rolled back");
        }
        restored
    }
}
