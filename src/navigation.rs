//! Step navigation state machine.
//!
//! Step numbers are 1-based, matching what the UI shows. The navigator keeps
//! a per-step status and a cursor, but every gating decision revalidates the
//! payload it is given rather than trusting cached statuses.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::payload::{get_path, is_present};
use crate::validation::{ValidationResult, WizardValidator};
use crate::wizard::{StepDefinition, WizardConfig};

/// Where a step stands with respect to the current payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Valid,
    Invalid,
}

impl StepStatus {
    pub fn label(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not started",
            StepStatus::InProgress => "in progress",
            StepStatus::Valid => "valid",
            StepStatus::Invalid => "invalid",
        }
    }
}

/// Cursor and statuses for one wizard run
#[derive(Debug, Clone)]
pub struct StepNavigator {
    config: Arc<WizardConfig>,
    validator: WizardValidator,
    statuses: Vec<StepStatus>,
    /// 0-based index into the step list
    cursor: usize,
}

impl StepNavigator {
    pub fn new(config: Arc<WizardConfig>) -> Self {
        let statuses = vec![StepStatus::NotStarted; config.steps().len()];
        let mut navigator = Self {
            config,
            validator: WizardValidator::new(),
            statuses,
            cursor: 0,
        };
        navigator.statuses[0] = StepStatus::InProgress;
        navigator
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn step_count(&self) -> usize {
        self.statuses.len()
    }

    /// Current step number (1-based)
    pub fn current_step(&self) -> usize {
        self.cursor + 1
    }

    pub fn current_step_definition(&self) -> &StepDefinition {
        &self.config.steps()[self.cursor]
    }

    pub fn status(&self, step: usize) -> Option<StepStatus> {
        step.checked_sub(1).and_then(|i| self.statuses.get(i)).copied()
    }

    pub fn statuses(&self) -> &[StepStatus] {
        &self.statuses
    }

    pub fn is_on_terminal_step(&self) -> bool {
        self.cursor + 1 == self.step_count()
    }

    /// Whether the user may jump from step `current` to step `target`.
    ///
    /// Going back, staying put and jumping to the terminal step are always
    /// allowed. Going forward requires every step from `current` through
    /// `target` to be valid, optional or skippable.
    pub fn can_navigate_to_step(&self, target: usize, current: usize, data: &Value) -> bool {
        let count = self.step_count();
        if !(1..=count).contains(&target) || !(1..=count).contains(&current) {
            return false;
        }
        if target <= current || target == count {
            return true;
        }

        self.config.steps()[current - 1..target]
            .iter()
            .all(|step| !step.is_blocking() || self.check(step, data).is_valid())
    }

    /// Move the cursor to `target` if allowed
    pub fn navigate_to(&mut self, target: usize, data: &Value) -> bool {
        if !self.can_navigate_to_step(target, self.current_step(), data) {
            tracing::debug!(
                wizard_type = self.config.wizard_type(),
                from = self.current_step(),
                to = target,
                "Navigation blocked"
            );
            return false;
        }
        self.cursor = target - 1;
        self.refresh(data);
        true
    }

    /// Advance one step if the current one lets the user proceed
    pub fn next(&mut self, data: &Value) -> bool {
        if self.is_on_terminal_step() {
            return false;
        }
        let step_id = self.current_step_definition().id.clone();
        if !self
            .validator
            .can_proceed_to_next_step(&step_id, data, &self.config)
        {
            self.refresh(data);
            return false;
        }
        self.cursor += 1;
        self.refresh(data);
        true
    }

    /// Skip the current step when the wizard allows skipping and the step
    /// is skippable or optional
    pub fn skip(&mut self, data: &Value) -> bool {
        if self.is_on_terminal_step()
            || !self.config.navigation().allow_skip
            || self.current_step_definition().is_blocking()
        {
            return false;
        }
        self.cursor += 1;
        self.refresh(data);
        true
    }

    pub fn previous(&mut self, data: &Value) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.refresh(data);
        true
    }

    /// Recompute every step's status from `data`
    pub fn refresh(&mut self, data: &Value) {
        let statuses: Vec<StepStatus> = self
            .config
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let result = self.check(step, data);
                if result.is_valid() {
                    StepStatus::Valid
                } else if index == self.cursor {
                    StepStatus::InProgress
                } else if self.touched(step, data) {
                    StepStatus::Invalid
                } else {
                    StepStatus::NotStarted
                }
            })
            .collect();
        self.statuses = statuses;
    }

    /// Put the cursor on the first incomplete step, or the terminal step
    /// when every step validates. Returns the new step number.
    pub fn resume(&mut self, data: &Value) -> usize {
        let target = self
            .get_next_incomplete_step(data)
            .and_then(|step| self.config.step_index(&step.id))
            .unwrap_or(self.step_count() - 1);
        self.cursor = target;
        self.refresh(data);
        self.current_step()
    }

    /// Resume at a saved step id, falling back to [`Self::resume`] when the
    /// id is unknown or an earlier step is no longer satisfied
    pub fn resume_at(&mut self, step_id: Option<&str>, data: &Value) -> usize {
        let saved = step_id.and_then(|id| self.config.step_index(id));
        match saved {
            Some(index) if self.steps_satisfied(index, data) => {
                self.cursor = index;
                self.refresh(data);
                self.current_step()
            }
            _ => self.resume(data),
        }
    }

    /// First step, in declared order, whose validation fails
    pub fn get_next_incomplete_step(&self, data: &Value) -> Option<&StepDefinition> {
        self.config
            .steps()
            .iter()
            .find(|step| !self.check(step, data).is_valid())
    }

    /// Overall completion as a percentage (0–100).
    ///
    /// Each step scores the share of its declared fields that are filled in
    /// without error; steps are weighted equally.
    pub fn get_overall_progress(&self, data: &Value) -> f64 {
        let steps = self.config.steps();
        let total: f64 = steps.iter().map(|step| self.step_progress(step, data)).sum();
        total / steps.len() as f64
    }

    /// Completion of a single step (0–100)
    pub fn step_progress(&self, step: &StepDefinition, data: &Value) -> f64 {
        let fields = self
            .config
            .schema_for(&step.id)
            .map(|schema| schema.declared_fields())
            .unwrap_or_default();

        if fields.is_empty() {
            return if self.config.is_terminal(&step.id) {
                100.0
            } else {
                0.0
            };
        }

        let result = self.check(step, data);
        let complete = fields
            .iter()
            .filter(|field| is_present(get_path(data, field)) && result.error_for(field).is_none())
            .count();

        complete as f64 * 100.0 / fields.len() as f64
    }

    /// Every step before index `end` is valid, optional or skippable
    fn steps_satisfied(&self, end: usize, data: &Value) -> bool {
        self.config.steps()[..end]
            .iter()
            .all(|step| !step.is_blocking() || self.check(step, data).is_valid())
    }

    fn touched(&self, step: &StepDefinition, data: &Value) -> bool {
        self.config
            .schema_for(&step.id)
            .map(|schema| schema.declared_fields())
            .unwrap_or_default()
            .iter()
            .any(|field| is_present(get_path(data, field)))
    }

    fn check(&self, step: &StepDefinition, data: &Value) -> ValidationResult {
        self.validator
            .validate_step(&step.id, data, self.config.schema_for(&step.id))
    }
}
