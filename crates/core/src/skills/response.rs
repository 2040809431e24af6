//! # Response Validation
//!
//! Turns the collaborator's raw answer into a JSON value that is known to
//! carry every required top-level field of the stage's shape. Element-level
//! checking is left to the typed decode that follows.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::shape::{FieldKind, ShapeDescriptor};
use crate::error::ValidationError;

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)\A\s*```[\w+-]*[ \t]*\r?\n?(.*?)\s*```\s*\z").ok())
        .as_ref()
}

/// Remove a surrounding triple-backtick fence (with optional language tag).
/// Unfenced text is returned trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    match fence_pattern()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
    {
        Some(body) => body.as_str().trim(),
        None => raw.trim(),
    }
}

/// Parse `raw` and check it against `shape`.
///
/// - Unparseable text → [`ValidationError::Malformed`]
/// - A required field absent (or `null`) → [`ValidationError::IncompleteShape`]
/// - A required array field holding something else → [`ValidationError::WrongKind`]
pub fn validate(raw: &str, shape: &ShapeDescriptor) -> Result<Value, ValidationError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return match shape.required_fields().next() {
            Some(first) => Err(ValidationError::IncompleteShape {
                field: first.name.clone(),
            }),
            None => Ok(value),
        };
    };

    for field in shape.required_fields() {
        match object.get(&field.name) {
            None | Some(Value::Null) => {
                return Err(ValidationError::IncompleteShape {
                    field: field.name.clone(),
                })
            }
            Some(v) if field.kind == FieldKind::Array && !v.is_array() => {
                return Err(ValidationError::WrongKind {
                    field: field.name.clone(),
                    expected: FieldKind::Array,
                })
            }
            Some(_) => {}
        }
    }

    Ok(value)
}
