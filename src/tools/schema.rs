//! JSON Schema fragments for tool descriptors

use serde_json::{Map, Value, json};

pub fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

pub fn string_default(description: &str, default: &str) -> Value {
    json!({"type": "string", "description": description, "default": default})
}

pub fn one_of(description: &str, values: &[&str], default: &str) -> Value {
    json!({"type": "string", "description": description, "enum": values, "default": default})
}

pub fn integer(description: &str, min: u32, max: u32, default: Option<u32>) -> Value {
    let mut schema = json!({
        "type": "integer",
        "description": description,
        "minimum": min,
        "maximum": max,
    });
    if let Some(default) = default {
        schema["default"] = json!(default);
    }
    schema
}

pub fn number(description: &str, min: f64, max: f64, default: f64) -> Value {
    json!({
        "type": "number",
        "description": description,
        "minimum": min,
        "maximum": max,
        "default": default,
    })
}

pub fn boolean(description: &str, default: bool) -> Value {
    json!({"type": "boolean", "description": description, "default": default})
}

pub fn object(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
