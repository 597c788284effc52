//! Step and whole-wizard validation.
//!
//! Validation failures are data, never errors: every operation here returns
//! a [`ValidationResult`] or a plain answer, whatever the schema does.

mod messages;

pub use messages::format_error_message;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::set_path;
use crate::schema::{Schema, Violation};
use crate::wizard::WizardConfig;

/// Key used for failures that belong to the step as a whole
pub const STEP_ERROR_KEY: &str = "_step";

/// Namespace for violations reported by the final schema
pub const FINAL_NAMESPACE: &str = "final";

/// Message fragments that downgrade a violation to a warning
const SOFT_SIGNALS: [&str; 3] = ["optional", "recommended", "suggested"];

/// Field → message maps for blocking errors and advisory warnings.
///
/// Validity is derived from `errors` alone; warnings never affect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error; the first message for a field wins
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Record a warning; the first message for a field wins
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Fold another result in, prefixing its keys with `namespace.`
    pub fn merge_namespaced(&mut self, namespace: &str, other: ValidationResult) {
        for (field, message) in other.errors {
            self.add_error(format!("{namespace}.{field}"), message);
        }
        for (field, message) in other.warnings {
            self.add_warning(format!("{namespace}.{field}"), message);
        }
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn warning_for(&self, field: &str) -> Option<&str> {
        self.warnings.get(field).map(String::as_str)
    }
}

/// Stateless validation orchestrator
#[derive(Debug, Clone, Copy, Default)]
pub struct WizardValidator;

impl WizardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a payload against one step's schema.
    ///
    /// A missing schema, or one that fails to evaluate, yields a single
    /// step-level error under [`STEP_ERROR_KEY`].
    pub fn validate_step(
        &self,
        step_id: &str,
        data: &Value,
        schema: Option<&dyn Schema>,
    ) -> ValidationResult {
        let mut result = ValidationResult::valid();

        let Some(schema) = schema else {
            tracing::warn!(step = step_id, "No schema available for step");
            result.add_error(STEP_ERROR_KEY, step_failure_message(step_id));
            return result;
        };

        let outcome = match schema.validate(data) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(step = step_id, error = %e, "Step schema failed to evaluate");
                result.add_error(STEP_ERROR_KEY, step_failure_message(step_id));
                return result;
            }
        };

        for violation in outcome.violations {
            let field = match violation.field() {
                f if f.is_empty() => STEP_ERROR_KEY.to_string(),
                f => f,
            };
            if is_warning(&violation) {
                result.add_warning(field, violation.message);
            } else {
                result.add_error(field, violation.message);
            }
        }

        result
    }

    /// Validate every declared step plus the final schema.
    /// Keys are namespaced `stepId.field` and `final.field`.
    pub fn validate_all_steps(&self, data: &Value, config: &WizardConfig) -> ValidationResult {
        let mut result = ValidationResult::valid();

        for step in config.steps() {
            let step_result = self.validate_step(&step.id, data, config.schema_for(&step.id));
            result.merge_namespaced(&step.id, step_result);
        }

        let final_result = self.validate_step(FINAL_NAMESPACE, data, Some(config.final_schema()));
        result.merge_namespaced(FINAL_NAMESPACE, final_result);

        result
    }

    /// Optional and skippable steps always let the user move on
    pub fn can_proceed_to_next_step(
        &self,
        current_step_id: &str,
        data: &Value,
        config: &WizardConfig,
    ) -> bool {
        let Some(step) = config.step(current_step_id) else {
            return false;
        };
        if !step.is_blocking() {
            return true;
        }
        self.validate_step(current_step_id, data, config.schema_for(current_step_id))
            .is_valid()
    }

    /// Every blocking step validates and the final schema accepts the payload
    pub fn can_complete(&self, data: &Value, config: &WizardConfig) -> bool {
        let steps_valid = config
            .steps()
            .iter()
            .filter(|step| step.is_blocking())
            .all(|step| {
                self.validate_step(&step.id, data, config.schema_for(&step.id))
                    .is_valid()
            });

        steps_valid
            && self
                .validate_step(FINAL_NAMESPACE, data, Some(config.final_schema()))
                .is_valid()
    }

    /// Check a single field as if `value` had just been typed into it.
    ///
    /// Returns the formatted message of the first violation on `field` (or
    /// beneath it), or `None` when the field is fine. An unknown step yields
    /// the step-level failure message.
    pub fn validate_field(
        &self,
        step_id: &str,
        field: &str,
        value: Value,
        data: &Value,
        config: &WizardConfig,
    ) -> Option<String> {
        let Some(schema) = config.schema_for(step_id) else {
            tracing::warn!(step = step_id, field, "No schema available for field");
            return Some(step_failure_message(step_id));
        };

        let mut candidate = data.clone();
        set_path(&mut candidate, field, value);

        match schema.validate(&candidate) {
            Ok(outcome) => outcome
                .violations
                .iter()
                .find(|v| v.touches(field))
                .map(|v| format_error_message(field, &v.message)),
            Err(e) => {
                tracing::warn!(step = step_id, field, error = %e, "Field validation failed");
                Some(step_failure_message(step_id))
            }
        }
    }
}

fn is_warning(violation: &Violation) -> bool {
    if violation.kind.is_size_bound() {
        return true;
    }
    let message = violation.message.to_lowercase();
    SOFT_SIGNALS.iter().any(|signal| message.contains(signal))
}

fn step_failure_message(step_id: &str) -> String {
    format!("Step '{step_id}' could not be validated")
}
