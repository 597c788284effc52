//! Schema capability consumed by the wizard validator.
//!
//! The validator never talks to a concrete schema library. Anything that can
//! turn a JSON payload into a list of [`Violation`]s implements [`Schema`];
//! [`JsonSchema`] is the adapter shipped with the crate.

mod json;

pub use json::JsonSchema;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a schema that could not be built or evaluated
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema failed to compile: {0}")]
    Compile(String),

    #[error("schema failed to evaluate: {0}")]
    Evaluation(String),
}

/// The kind of constraint a violation broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Required,
    Type,
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    Minimum,
    Maximum,
    Pattern,
    Format,
    Enum,
    Other,
}

impl ConstraintKind {
    /// Size and length bounds are reported as warnings rather than errors
    pub fn is_size_bound(self) -> bool {
        matches!(
            self,
            Self::MinLength
                | Self::MaxLength
                | Self::MinItems
                | Self::MaxItems
                | Self::Minimum
                | Self::Maximum
        )
    }
}

/// A single failed constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Path segments from the payload root to the offending value
    pub path: Vec<String>,
    pub kind: ConstraintKind,
    pub message: String,
}

impl Violation {
    pub fn new(path: Vec<String>, kind: ConstraintKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Dotted field name, e.g. `address.city`. Empty for root-level violations.
    pub fn field(&self) -> String {
        self.path.join(".")
    }

    /// True if the violation sits on `field` or anywhere beneath it
    pub fn touches(&self, field: &str) -> bool {
        let own = self.field();
        own == field
            || own
                .strip_prefix(field)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Result of running a schema: `ok` exactly when there are no violations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOutcome {
    pub violations: Vec<Violation>,
}

impl SchemaOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_violations(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validation capability supplied per step and for the merged payload
pub trait Schema: Send + Sync {
    /// Validate a payload. `Err` means the schema itself is broken, not the data.
    fn validate(&self, data: &Value) -> Result<SchemaOutcome, SchemaError>;

    /// Top-level fields the schema declares (required and optional)
    fn declared_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bounds() {
        assert!(ConstraintKind::MinLength.is_size_bound());
        assert!(ConstraintKind::MaxItems.is_size_bound());
        assert!(ConstraintKind::Minimum.is_size_bound());
        assert!(!ConstraintKind::Required.is_size_bound());
        assert!(!ConstraintKind::Type.is_size_bound());
        assert!(!ConstraintKind::Pattern.is_size_bound());
    }

    #[test]
    fn test_violation_touches() {
        let v = Violation::new(
            vec!["address".into(), "city".into()],
            ConstraintKind::Required,
            "Required",
        );
        assert_eq!(v.field(), "address.city");
        assert!(v.touches("address"));
        assert!(v.touches("address.city"));
        assert!(!v.touches("addr"));
        assert!(!v.touches("address.cityname"));
    }

    #[test]
    fn test_outcome_ok() {
        assert!(SchemaOutcome::ok().is_ok());
        let outcome = SchemaOutcome::with_violations(vec![Violation::new(
            vec!["title".into()],
            ConstraintKind::Required,
            "Required",
        )]);
        assert!(!outcome.is_ok());
    }
}
