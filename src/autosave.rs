//! Debounced draft persistence.
//!
//! Each `(wizard type, owner, draft)` has at most one pending save. Scheduling
//! a newer request aborts the previous timer and resolves its [`PendingSave`]
//! with [`AutoSaveError::Superseded`], so a burst of edits produces exactly
//! one write carrying the last payload.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::drafts::DraftStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveError {
    /// A newer request replaced this one before it fired. Not a failure.
    #[error("auto-save superseded by a newer edit")]
    Superseded,

    #[error("draft could not be persisted")]
    NotPersisted,
}

impl AutoSaveError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// What to persist once the debounce window elapses
#[derive(Debug, Clone, PartialEq)]
pub struct AutoSaveRequest {
    pub wizard_type: String,
    pub owner_id: String,
    pub draft_id: Option<String>,
    pub step_id: Option<String>,
    pub payload: Value,
}

impl AutoSaveRequest {
    pub fn new(wizard_type: impl Into<String>, owner_id: impl Into<String>, payload: Value) -> Self {
        Self {
            wizard_type: wizard_type.into(),
            owner_id: owner_id.into(),
            draft_id: None,
            step_id: None,
            payload,
        }
    }

    pub fn draft(mut self, draft_id: impl Into<String>) -> Self {
        self.draft_id = Some(draft_id.into());
        self
    }

    pub fn step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    fn pending_key(&self) -> PendingKey {
        (
            self.wizard_type.clone(),
            self.owner_id.clone(),
            self.draft_id.clone(),
        )
    }
}

type SaveResult = Result<String, AutoSaveError>;
type PendingKey = (String, String, Option<String>);

/// Resolves to the draft id once the debounced save lands
#[derive(Debug)]
pub struct PendingSave {
    rx: oneshot::Receiver<SaveResult>,
}

impl Future for PendingSave {
    type Output = SaveResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // a dropped resolver means the timer was torn down without firing
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AutoSaveError::Superseded)))
    }
}

struct PendingEntry {
    generation: u64,
    request: AutoSaveRequest,
    resolver: oneshot::Sender<SaveResult>,
    handle: JoinHandle<()>,
}

/// Debounced scheduler in front of a [`DraftStore`]
pub struct AutoSavePipeline {
    store: Arc<DraftStore>,
    pending: Arc<Mutex<HashMap<PendingKey, PendingEntry>>>,
    generation: AtomicU64,
}

impl AutoSavePipeline {
    pub fn new(store: Arc<DraftStore>) -> Self {
        Self {
            store,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<DraftStore> {
        &self.store
    }

    /// Schedule a save after `delay` without further edits.
    ///
    /// Must be called within a tokio runtime. Scheduling happens before this
    /// returns, so calls are ordered as the caller made them.
    pub fn auto_save(&self, request: AutoSaveRequest, delay: Duration) -> PendingSave {
        let (resolver, rx) = oneshot::channel();
        let key = request.pending_key();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut pending = lock(&self.pending);

        if let Some(previous) = pending.remove(&key) {
            previous.handle.abort();
            let _ = previous.resolver.send(Err(AutoSaveError::Superseded));
            tracing::debug!(
                wizard_type = %key.0,
                owner_id = %key.1,
                draft_id = ?key.2,
                "Pending auto-save superseded"
            );
        }

        let handle = tokio::spawn(fire_after(
            delay,
            key.clone(),
            generation,
            Arc::clone(&self.pending),
            Arc::clone(&self.store),
        ));

        pending.insert(
            key,
            PendingEntry {
                generation,
                request,
                resolver,
                handle,
            },
        );

        PendingSave { rx }
    }

    /// Number of saves waiting on their debounce timer
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Persist every pending request now instead of waiting for its timer.
    ///
    /// Returns how many requests were flushed.
    pub fn flush_all(&self) -> usize {
        let mut pending = lock(&self.pending);
        let entries: Vec<PendingEntry> = pending.drain().map(|(_, entry)| entry).collect();
        let flushed = entries.len();

        for entry in entries {
            entry.handle.abort();
            let result = persist(&self.store, &entry.request);
            let _ = entry.resolver.send(result);
        }

        if flushed > 0 {
            tracing::debug!(flushed, "Flushed pending auto-saves");
        }
        flushed
    }
}

impl std::fmt::Debug for AutoSavePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSavePipeline")
            .field("store", &self.store)
            .field("pending", &self.pending_count())
            .finish()
    }
}

async fn fire_after(
    delay: Duration,
    key: PendingKey,
    generation: u64,
    pending: Arc<Mutex<HashMap<PendingKey, PendingEntry>>>,
    store: Arc<DraftStore>,
) {
    tokio::time::sleep(delay).await;

    // The write happens under the lock so a newer request cannot be
    // scheduled between the generation check and the save.
    let mut entries = lock(&pending);
    let current = entries
        .get(&key)
        .is_some_and(|entry| entry.generation == generation);
    if !current {
        return;
    }
    let Some(entry) = entries.remove(&key) else {
        return;
    };

    let result = persist(&store, &entry.request);
    let _ = entry.resolver.send(result);
}

fn persist(store: &DraftStore, request: &AutoSaveRequest) -> SaveResult {
    store
        .save(
            &request.wizard_type,
            &request.owner_id,
            &request.payload,
            request.draft_id.as_deref(),
            request.step_id.as_deref(),
        )
        .ok_or(AutoSaveError::NotPersisted)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
