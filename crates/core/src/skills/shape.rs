//! # Response Shapes
//!
//! A `ShapeDescriptor` is the response contract for one stage: which
//! top-level fields the collaborator must return, what kind each one is,
//! and a one-line description used when composing the prompt.
//!
//! Descriptors are derived from the typed stage outputs with `schemars`,
//! so the doc comments on those structs are the single source of truth for
//! field descriptions.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON kind of a top-level response field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    fn from_schema(schema: &Value) -> FieldKind {
        let ty = match schema.get("type") {
            Some(Value::String(ty)) => ty.as_str(),
            // ["string", "null"] and friends: first non-null entry wins
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .unwrap_or("object"),
            _ => "object",
        };
        match ty {
            "string" => FieldKind::String,
            "number" => FieldKind::Number,
            "integer" => FieldKind::Integer,
            "boolean" => FieldKind::Boolean,
            "array" => FieldKind::Array,
            _ => FieldKind::Object,
        }
    }

    /// Lowercase JSON type name
    pub fn json_type(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let article = match self {
            FieldKind::Array | FieldKind::Integer | FieldKind::Object => "an",
            _ => "a",
        };
        write!(f, "{article} {}", self.json_type())
    }
}

/// One top-level field of a response shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
    pub required: bool,
}

/// Response contract for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Name of the typed output (e.g. "CompetitorAnalysis")
    pub name: String,
    /// Top-level fields in declaration order
    pub fields: Vec<FieldSpec>,
    /// JSON Schema of the whole response with every `$ref` inlined
    pub schema: Value,
}

impl ShapeDescriptor {
    /// Derive the descriptor for a typed output
    pub fn of<T: JsonSchema>() -> Self {
        let root = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
        let name = root
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| T::schema_name().into_owned());
        let schema = inline_refs(&root, &root);

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(field, sub)| FieldSpec {
                        name: field.clone(),
                        kind: FieldKind::from_schema(sub),
                        description: one_line(
                            sub.get("description").and_then(Value::as_str).unwrap_or(""),
                        ),
                        required: required.contains(&field.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            fields,
            schema,
        }
    }

    /// Fields the collaborator must always return
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Human-readable contract, one line per field, for prompt embedding
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| {
                let mut line = format!("- `{}` ({})", f.name, f.kind.json_type());
                if let Some(items) = self.item_fields(&f.name) {
                    line.push_str(&format!(" of objects with {}", items.join(", ")));
                }
                if !f.description.is_empty() {
                    line.push_str(": ");
                    line.push_str(&f.description);
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Property names of the objects inside an array field, if any
    fn item_fields(&self, field: &str) -> Option<Vec<String>> {
        let props = self
            .schema
            .pointer(&format!("/properties/{field}/items/properties"))?
            .as_object()?;
        Some(props.keys().map(|k| format!("`{k}`")).collect())
    }
}

/// Collapse a multi-line doc comment into a single line
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every `{"$ref": "#/$defs/X"}` with the referenced definition and
/// drop the definition tables, so providers that do not understand JSON
/// Schema references still receive the full structure.
fn inline_refs(node: &Value, root: &Value) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                if let Some(resolved) = target
                    .strip_prefix('#')
                    .and_then(|pointer| root.pointer(pointer))
                {
                    let mut merged = match inline_refs(resolved, root) {
                        Value::Object(m) => m,
                        other => return other,
                    };
                    // Sibling keywords such as "description" override the target's
                    for (k, v) in map.iter().filter(|(k, _)| k.as_str() != "$ref") {
                        merged.insert(k.clone(), inline_refs(v, root));
                    }
                    return Value::Object(merged);
                }
            }
            let inlined: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "$defs" | "definitions" | "$schema"))
                .map(|(k, v)| (k.clone(), inline_refs(v, root)))
                .collect();
            Value::Object(inlined)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| inline_refs(v, root)).collect()),
        other => other.clone(),
    }
}
