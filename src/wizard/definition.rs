use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::{JsonSchema, Schema, SchemaError};

/// Errors raised by a wizard definition that cannot be used
#[derive(Error, Debug)]
pub enum WizardConfigError {
    #[error("wizard '{0}' declares no steps")]
    NoSteps(String),

    #[error("wizard type '{0}' must be non-empty and must not contain '_'")]
    InvalidWizardType(String),

    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),

    #[error("step '{0}' has no schema")]
    MissingSchema(String),

    #[error("wizard '{0}' has no final schema")]
    MissingFinalSchema(String),

    #[error("invalid schema for '{target}': {source}")]
    Schema {
        target: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to parse wizard definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One page of a wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub can_skip: bool,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            optional: false,
            can_skip: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn skippable(mut self) -> Self {
        self.can_skip = true;
        self
    }

    /// Optional or skippable steps never block forward movement
    pub fn is_blocking(&self) -> bool {
        !self.optional && !self.can_skip
    }
}

/// Draft persistence settings for a wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSettings {
    #[serde(default = "default_true")]
    pub auto_save: bool,
    /// Debounce window for auto-save, in milliseconds
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval_ms: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_auto_save_interval() -> u64 {
    2000
}

fn default_key_prefix() -> String {
    crate::drafts::DEFAULT_KEY_PREFIX.to_string()
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            auto_save: default_true(),
            auto_save_interval_ms: default_auto_save_interval(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Step navigation settings for a wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSettings {
    #[serde(default = "default_true")]
    pub allow_skip: bool,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            allow_skip: true,
            show_progress: true,
        }
    }
}

/// A complete, checked wizard definition.
///
/// Every declared step is guaranteed to have a schema, so lookups during
/// validation cannot miss.
#[derive(Clone)]
pub struct WizardConfig {
    wizard_type: String,
    steps: Vec<StepDefinition>,
    schemas: HashMap<String, Arc<dyn Schema>>,
    final_schema: Arc<dyn Schema>,
    persistence: PersistenceSettings,
    navigation: NavigationSettings,
}

impl fmt::Debug for WizardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardConfig")
            .field("wizard_type", &self.wizard_type)
            .field("steps", &self.steps)
            .field("persistence", &self.persistence)
            .field("navigation", &self.navigation)
            .finish_non_exhaustive()
    }
}

impl WizardConfig {
    pub fn builder(wizard_type: impl Into<String>) -> WizardConfigBuilder {
        WizardConfigBuilder {
            wizard_type: wizard_type.into(),
            steps: Vec::new(),
            schemas: HashMap::new(),
            final_schema: None,
            persistence: PersistenceSettings::default(),
            navigation: NavigationSettings::default(),
        }
    }

    /// Build a wizard from a JSON definition whose schemas are JSON Schema documents
    pub fn from_json(definition: &str) -> Result<Self, WizardConfigError> {
        let doc: WizardDocument = serde_json::from_str(definition)?;

        let mut builder = Self::builder(doc.wizard_type)
            .persistence(doc.persistence)
            .navigation(doc.navigation);

        for step in doc.steps {
            let schema = JsonSchema::compile(&step.schema).map_err(|source| {
                WizardConfigError::Schema {
                    target: step.definition.id.clone(),
                    source,
                }
            })?;
            builder = builder.step(step.definition, Arc::new(schema));
        }

        if let Some(final_schema) = doc.final_schema {
            let schema =
                JsonSchema::compile(&final_schema).map_err(|source| WizardConfigError::Schema {
                    target: "final".to_string(),
                    source,
                })?;
            builder = builder.final_schema(Arc::new(schema));
        }

        builder.build()
    }

    pub fn wizard_type(&self) -> &str {
        &self.wizard_type
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// 0-based position of a step in declared order
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn schema_for(&self, step_id: &str) -> Option<&dyn Schema> {
        self.schemas.get(step_id).map(AsRef::as_ref)
    }

    pub fn final_schema(&self) -> &dyn Schema {
        self.final_schema.as_ref()
    }

    /// The last declared step (preview/summary)
    pub fn terminal_step(&self) -> &StepDefinition {
        // build() rejects wizards without steps
        &self.steps[self.steps.len() - 1]
    }

    pub fn is_terminal(&self, step_id: &str) -> bool {
        self.terminal_step().id == step_id
    }

    pub fn persistence(&self) -> &PersistenceSettings {
        &self.persistence
    }

    pub fn navigation(&self) -> &NavigationSettings {
        &self.navigation
    }

    /// Same wizard with different persistence settings
    pub fn with_persistence(mut self, persistence: PersistenceSettings) -> Self {
        self.persistence = persistence;
        self
    }

    /// Same wizard with different navigation settings
    pub fn with_navigation(mut self, navigation: NavigationSettings) -> Self {
        self.navigation = navigation;
        self
    }
}

/// Incrementally assembles a [`WizardConfig`]
pub struct WizardConfigBuilder {
    wizard_type: String,
    steps: Vec<StepDefinition>,
    schemas: HashMap<String, Arc<dyn Schema>>,
    final_schema: Option<Arc<dyn Schema>>,
    persistence: PersistenceSettings,
    navigation: NavigationSettings,
}

impl WizardConfigBuilder {
    pub fn step(mut self, definition: StepDefinition, schema: Arc<dyn Schema>) -> Self {
        self.schemas.insert(definition.id.clone(), schema);
        self.steps.push(definition);
        self
    }

    /// Declare a step without a schema. `build()` will reject it.
    pub fn step_without_schema(mut self, definition: StepDefinition) -> Self {
        self.steps.push(definition);
        self
    }

    pub fn final_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.final_schema = Some(schema);
        self
    }

    pub fn persistence(mut self, persistence: PersistenceSettings) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn navigation(mut self, navigation: NavigationSettings) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn build(self) -> Result<WizardConfig, WizardConfigError> {
        // `_` separates the segments of a draft key
        if self.wizard_type.is_empty() || self.wizard_type.contains('_') {
            return Err(WizardConfigError::InvalidWizardType(self.wizard_type));
        }
        if self.steps.is_empty() {
            return Err(WizardConfigError::NoSteps(self.wizard_type));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(WizardConfigError::DuplicateStep(step.id.clone()));
            }
            if !self.schemas.contains_key(&step.id) {
                return Err(WizardConfigError::MissingSchema(step.id.clone()));
            }
        }

        let final_schema = self
            .final_schema
            .ok_or_else(|| WizardConfigError::MissingFinalSchema(self.wizard_type.clone()))?;

        Ok(WizardConfig {
            wizard_type: self.wizard_type,
            steps: self.steps,
            schemas: self.schemas,
            final_schema,
            persistence: self.persistence,
            navigation: self.navigation,
        })
    }
}

/// On-disk shape of a wizard definition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WizardDocument {
    wizard_type: String,
    steps: Vec<StepDocument>,
    #[serde(default)]
    final_schema: Option<Value>,
    #[serde(default)]
    persistence: PersistenceSettings,
    #[serde(default)]
    navigation: NavigationSettings,
}

#[derive(Debug, Deserialize)]
struct StepDocument {
    #[serde(flatten)]
    definition: StepDefinition,
    #[serde(default = "empty_object_schema")]
    schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(doc: Value) -> Arc<dyn Schema> {
        Arc::new(JsonSchema::compile(&doc).unwrap())
    }

    #[test]
    fn test_builder_happy_path() {
        let config = WizardConfig::builder("property")
            .step(StepDefinition::new("basic", "Basic"), schema(json!({})))
            .step(
                StepDefinition::new("media", "Media").skippable(),
                schema(json!({})),
            )
            .step(StepDefinition::new("preview", "Preview"), schema(json!({})))
            .final_schema(schema(json!({})))
            .build()
            .unwrap();

        assert_eq!(config.wizard_type(), "property");
        assert_eq!(config.steps().len(), 3);
        assert_eq!(config.step_index("media"), Some(1));
        assert!(!config.step("media").unwrap().is_blocking());
        assert!(config.step("basic").unwrap().is_blocking());
        assert_eq!(config.terminal_step().id, "preview");
        assert!(config.is_terminal("preview"));
        assert!(config.schema_for("basic").is_some());
        assert!(config.schema_for("nope").is_none());
    }

    #[test]
    fn test_missing_schema_is_rejected() {
        let result = WizardConfig::builder("blog")
            .step_without_schema(StepDefinition::new("content", "Content"))
            .final_schema(schema(json!({})))
            .build();
        assert!(matches!(result, Err(WizardConfigError::MissingSchema(id)) if id == "content"));
    }

    #[test]
    fn test_duplicate_step_is_rejected() {
        let result = WizardConfig::builder("blog")
            .step(StepDefinition::new("content", "Content"), schema(json!({})))
            .step(StepDefinition::new("content", "Again"), schema(json!({})))
            .final_schema(schema(json!({})))
            .build();
        assert!(matches!(result, Err(WizardConfigError::DuplicateStep(_))));
    }

    #[test]
    fn test_wizard_type_with_separator_is_rejected() {
        let result = WizardConfig::builder("land_plot")
            .step(StepDefinition::new("basic", "Basic"), schema(json!({})))
            .final_schema(schema(json!({})))
            .build();
        assert!(matches!(result, Err(WizardConfigError::InvalidWizardType(t)) if t == "land_plot"));
    }

    #[test]
    fn test_empty_and_final_schema_checks() {
        let result = WizardConfig::builder("blog")
            .final_schema(schema(json!({})))
            .build();
        assert!(matches!(result, Err(WizardConfigError::NoSteps(_))));

        let result = WizardConfig::builder("blog")
            .step(StepDefinition::new("content", "Content"), schema(json!({})))
            .build();
        assert!(matches!(result, Err(WizardConfigError::MissingFinalSchema(_))));
    }

    #[test]
    fn test_from_json() {
        let config = WizardConfig::from_json(
            r#"{
                "wizardType": "land",
                "steps": [
                    { "id": "basic", "title": "Basic", "schema": { "required": ["title"] } },
                    { "id": "media", "title": "Media", "optional": true },
                    { "id": "preview", "title": "Preview" }
                ],
                "finalSchema": { "required": ["title"] },
                "persistence": { "autoSaveIntervalMs": 500 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.wizard_type(), "land");
        assert!(config.step("media").unwrap().optional);
        assert_eq!(config.persistence().auto_save_interval_ms, 500);
        assert!(config.persistence().auto_save);
        assert_eq!(config.persistence().key_prefix, "wizard_draft");
        assert!(config.navigation().show_progress);
    }

    #[test]
    fn test_from_json_reports_bad_schema() {
        let result = WizardConfig::from_json(
            r#"{
                "wizardType": "land",
                "steps": [{ "id": "basic", "title": "Basic", "schema": { "type": 5 } }],
                "finalSchema": {}
            }"#,
        );
        assert!(matches!(
            result,
            Err(WizardConfigError::Schema { target, .. }) if target == "basic"
        ));
    }
}
