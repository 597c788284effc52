//! UI-facing facade over one wizard run.
//!
//! A [`WizardSession`] owns the accumulated payload, the navigator and a
//! handle on the draft store, and hands the finished payload to a
//! [`PublishWorkflow`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::autosave::{AutoSavePipeline, AutoSaveRequest, PendingSave};
use crate::drafts::{DraftStore, DraftSummary, WizardDraft};
use crate::navigation::StepNavigator;
use crate::payload::set_path;
use crate::validation::{ValidationResult, WizardValidator};
use crate::wizard::{StepDefinition, WizardConfig};

/// The payload handed off when a wizard completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub wizard_type: String,
    pub owner_id: String,
    pub draft_id: String,
    pub payload: Value,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("wizard is incomplete ({} error(s))", .0.errors.len())]
    Incomplete(ValidationResult),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Turns a completed submission into a real entity
#[async_trait]
pub trait PublishWorkflow: Send + Sync {
    /// Publish and return the id of the created entity
    async fn publish(&self, submission: Submission) -> Result<String, PublishError>;
}

/// One user's pass through one wizard
pub struct WizardSession {
    config: Arc<WizardConfig>,
    owner_id: String,
    draft_id: String,
    data: Value,
    validator: WizardValidator,
    navigator: StepNavigator,
    store: Arc<DraftStore>,
    autosave: AutoSavePipeline,
}

impl WizardSession {
    /// Start a fresh draft
    pub fn new(config: Arc<WizardConfig>, owner_id: impl Into<String>, store: Arc<DraftStore>) -> Self {
        Self::with_payload(
            config,
            owner_id.into(),
            Uuid::new_v4().to_string(),
            Value::Object(Map::new()),
            store,
        )
    }

    /// Reopen a saved draft, placing the cursor where the user left off
    pub fn resume(
        config: Arc<WizardConfig>,
        owner_id: impl Into<String>,
        draft_id: &str,
        store: Arc<DraftStore>,
    ) -> Option<Self> {
        let owner_id = owner_id.into();
        let draft = store.load_draft(config.wizard_type(), &owner_id, draft_id)?;

        let mut session = Self::with_payload(
            config,
            owner_id,
            draft.id,
            draft.payload,
            store,
        );
        let step = session
            .navigator
            .resume_at(draft.current_step_id.as_deref(), &session.data);
        tracing::info!(
            wizard_type = session.config.wizard_type(),
            draft_id = %session.draft_id,
            step,
            "Resumed draft"
        );
        Some(session)
    }

    fn with_payload(
        config: Arc<WizardConfig>,
        owner_id: String,
        draft_id: String,
        data: Value,
        store: Arc<DraftStore>,
    ) -> Self {
        let mut navigator = StepNavigator::new(Arc::clone(&config));
        navigator.refresh(&data);
        Self {
            autosave: AutoSavePipeline::new(Arc::clone(&store)),
            config,
            owner_id,
            draft_id,
            data,
            validator: WizardValidator::new(),
            navigator,
            store,
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn navigator(&self) -> &StepNavigator {
        &self.navigator
    }

    pub fn current_step(&self) -> &StepDefinition {
        self.navigator.current_step_definition()
    }

    /// Write one field and report its validation message, if any
    pub fn set_field(&mut self, field: &str, value: Value) -> Option<String> {
        let step_id = self.current_step().id.clone();
        let message = self.validate_field(&step_id, field, value.clone());
        set_path(&mut self.data, field, value);
        self.navigator.refresh(&self.data);
        message
    }

    /// Merge a partial payload into the current data
    pub fn merge(&mut self, patch: &Value) {
        if let Some(fields) = patch.as_object() {
            for (field, value) in fields {
                set_path(&mut self.data, field, value.clone());
            }
        }
        self.navigator.refresh(&self.data);
    }

    pub fn validate_step(&self, step_id: &str) -> ValidationResult {
        self.validator
            .validate_step(step_id, &self.data, self.config.schema_for(step_id))
    }

    pub fn validate_all_steps(&self) -> ValidationResult {
        self.validator.validate_all_steps(&self.data, &self.config)
    }

    pub fn can_proceed_to_next_step(&self) -> bool {
        self.validator
            .can_proceed_to_next_step(&self.current_step().id, &self.data, &self.config)
    }

    pub fn can_complete(&self) -> bool {
        self.validator.can_complete(&self.data, &self.config)
    }

    pub fn validate_field(&self, step_id: &str, field: &str, value: Value) -> Option<String> {
        self.validator
            .validate_field(step_id, field, value, &self.data, &self.config)
    }

    pub fn overall_progress(&self) -> f64 {
        self.navigator.get_overall_progress(&self.data)
    }

    pub fn next_incomplete_step(&self) -> Option<&StepDefinition> {
        self.navigator.get_next_incomplete_step(&self.data)
    }

    pub fn next(&mut self) -> bool {
        self.navigator.next(&self.data)
    }

    pub fn previous(&mut self) -> bool {
        self.navigator.previous(&self.data)
    }

    pub fn skip(&mut self) -> bool {
        self.navigator.skip(&self.data)
    }

    pub fn navigate_to(&mut self, step: usize) -> bool {
        self.navigator.navigate_to(step, &self.data)
    }

    /// Persist now. `None` when storage is unavailable.
    pub fn save_draft(&self) -> Option<String> {
        self.store.save(
            self.config.wizard_type(),
            &self.owner_id,
            &self.data,
            Some(&self.draft_id),
            Some(&self.current_step().id),
        )
    }

    /// Schedule a debounced save using the wizard's configured interval
    pub fn auto_save_draft(&self) -> PendingSave {
        let delay = Duration::from_millis(self.config.persistence().auto_save_interval_ms);
        let request = AutoSaveRequest::new(
            self.config.wizard_type(),
            self.owner_id.clone(),
            self.data.clone(),
        )
        .draft(self.draft_id.clone())
        .step(self.current_step().id.clone());
        self.autosave.auto_save(request, delay)
    }

    /// Schedule an auto-save only when the wizard has auto-save enabled
    pub fn auto_save_if_enabled(&self) -> Option<PendingSave> {
        self.config
            .persistence()
            .auto_save
            .then(|| self.auto_save_draft())
    }

    pub fn pending_auto_saves(&self) -> usize {
        self.autosave.pending_count()
    }

    pub fn load_draft(&self, draft_id: &str) -> Option<WizardDraft> {
        self.store
            .load_draft(self.config.wizard_type(), &self.owner_id, draft_id)
    }

    /// Drop this session's draft from storage
    pub fn delete_draft(&self) -> bool {
        self.store
            .delete(self.config.wizard_type(), &self.owner_id, &self.draft_id)
    }

    /// This owner's drafts for the same wizard, newest first
    pub fn list_drafts(&self) -> Vec<DraftSummary> {
        self.store
            .list_drafts(&self.owner_id, Some(self.config.wizard_type()))
    }

    pub fn clear_expired_drafts(&self) -> usize {
        self.store.clear_expired_drafts()
    }

    /// Validate everything and hand the payload to `workflow`.
    ///
    /// The draft is removed tentatively before publishing and restored if the
    /// workflow fails, so a rejected submission leaves the draft intact.
    pub async fn complete(&self, workflow: &dyn PublishWorkflow) -> Result<String, PublishError> {
        if !self.can_complete() {
            return Err(PublishError::Incomplete(self.validate_all_steps()));
        }

        // land the latest edits before the draft is removed
        self.autosave.flush_all();

        let wizard_type = self.config.wizard_type();
        let tentative =
            self.store
                .begin_tentative_delete(wizard_type, &self.owner_id, &self.draft_id);

        let submission = Submission {
            wizard_type: wizard_type.to_string(),
            owner_id: self.owner_id.clone(),
            draft_id: self.draft_id.clone(),
            payload: self.data.clone(),
        };

        match workflow.publish(submission).await {
            Ok(entity_id) => {
                if let Some(tentative) = tentative {
                    tentative.confirm();
                }
                tracing::info!(
                    wizard_type,
                    draft_id = %self.draft_id,
                    entity_id = %entity_id,
                    "Wizard published"
                );
                Ok(entity_id)
            }
            Err(e) => {
                if let Some(tentative) = tentative {
                    tentative.rollback();
                }
                tracing::warn!(
                    wizard_type,
                    draft_id = %self.draft_id,
                    error = %e,
                    "Publish failed, draft restored"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for WizardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSession")
            .field("wizard_type", &self.config.wizard_type())
            .field("owner_id", &self.owner_id)
            .field("draft_id", &self.draft_id)
            .field("step", &self.navigator.current_step())
            .finish_non_exhaustive()
    }
}
