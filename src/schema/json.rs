//! JSON Schema adapter built on the `jsonschema` crate

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError as JsonSchemaError, Validator as JsonValidator};
use serde_json::Value;

use super::{ConstraintKind, Schema, SchemaError, SchemaOutcome, Violation};

/// Keyword a schema node may carry to override the generated message
const ERROR_MESSAGE_KEYWORD: &str = "errorMessage";

/// Compiled JSON Schema
pub struct JsonSchema {
    raw: Value,
    compiled: JsonValidator,
}

impl std::fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchema").field("raw", &self.raw).finish()
    }
}

impl JsonSchema {
    /// Compile a schema document. `format` keywords are asserted, not just annotated.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let compiled = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self {
            raw: schema.clone(),
            compiled,
        })
    }

    /// The schema document this adapter was compiled from
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn to_violation(&self, data: &Value, error: &JsonSchemaError) -> Violation {
        let mut path = pointer_segments(error.instance_path.as_str());
        let schema_path = error.schema_path.as_str();

        let (kind, message) = match &error.kind {
            ValidationErrorKind::Required { property } => {
                path.push(
                    property
                        .as_str()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| property.to_string()),
                );
                return Violation::new(path, ConstraintKind::Required, "Required");
            }
            ValidationErrorKind::Type { .. } => {
                let expected = self
                    .raw
                    .pointer(schema_path)
                    .map(describe_expected_type)
                    .unwrap_or_else(|| "value".to_string());
                let received = data
                    .pointer(error.instance_path.as_str())
                    .map(json_type_name)
                    .unwrap_or("undefined");
                (
                    ConstraintKind::Type,
                    format!("Expected {expected}, received {received}"),
                )
            }
            ValidationErrorKind::MinLength { limit } => (
                ConstraintKind::MinLength,
                format!("String must contain at least {limit} character(s)"),
            ),
            ValidationErrorKind::MaxLength { limit } => (
                ConstraintKind::MaxLength,
                format!("String must contain at most {limit} character(s)"),
            ),
            ValidationErrorKind::MinItems { limit } => (
                ConstraintKind::MinItems,
                format!("Array must contain at least {limit} element(s)"),
            ),
            ValidationErrorKind::MaxItems { limit } => (
                ConstraintKind::MaxItems,
                format!("Array must contain at most {limit} element(s)"),
            ),
            ValidationErrorKind::Minimum { limit } => (
                ConstraintKind::Minimum,
                format!("Number must be greater than or equal to {limit}"),
            ),
            ValidationErrorKind::Maximum { limit } => (
                ConstraintKind::Maximum,
                format!("Number must be less than or equal to {limit}"),
            ),
            ValidationErrorKind::ExclusiveMinimum { limit } => (
                ConstraintKind::Minimum,
                format!("Number must be greater than {limit}"),
            ),
            ValidationErrorKind::ExclusiveMaximum { limit } => (
                ConstraintKind::Maximum,
                format!("Number must be less than {limit}"),
            ),
            ValidationErrorKind::Pattern { .. } => {
                (ConstraintKind::Pattern, "Invalid format".to_string())
            }
            ValidationErrorKind::Format { format } => {
                let message = match format.as_str() {
                    "email" => "Invalid email".to_string(),
                    "uri" | "url" => "Invalid url".to_string(),
                    other => format!("Invalid {other}"),
                };
                (ConstraintKind::Format, message)
            }
            ValidationErrorKind::Enum { .. } => {
                (ConstraintKind::Enum, "Invalid enum value".to_string())
            }
            _ => (ConstraintKind::Other, error.to_string()),
        };

        // A custom message on the failing schema node wins
        let message = self
            .raw
            .pointer(parent_pointer(schema_path))
            .and_then(|node| node.get(ERROR_MESSAGE_KEYWORD))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or(message);

        Violation::new(path, kind, message)
    }
}

impl Schema for JsonSchema {
    fn validate(&self, data: &Value) -> Result<SchemaOutcome, SchemaError> {
        let violations: Vec<Violation> = self
            .compiled
            .iter_errors(data)
            .map(|e| self.to_violation(data, &e))
            .collect();
        Ok(SchemaOutcome::with_violations(violations))
    }

    fn declared_fields(&self) -> Vec<String> {
        self.raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Split a JSON pointer (`/a/b~1c`) into unescaped segments
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Pointer to the schema node that owns the failing keyword
fn parent_pointer(pointer: &str) -> &str {
    pointer.rfind('/').map(|idx| &pointer[..idx]).unwrap_or("")
}

fn describe_expected_type(type_keyword: &Value) -> String {
    match type_keyword {
        Value::String(s) => s.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "value".to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
