//! Configuration-schema shape validation.

use serde_json::Value;

/// Validate that a tool's configuration schema is an OpenAPI-3.0-shaped
/// document.
///
/// Requires a JSON object with top-level `openapi`, `info`, and `paths`
/// keys, where `info` carries `title` and `version`. Every violation is
/// collected so the caller can report all of them at once.
pub fn validate_configuration_schema(schema: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let object = match schema.as_object() {
        Some(object) => object,
        None => {
            errors.push(format!(
                "configuration schema must be a JSON object, got {}",
                json_type_name(schema)
            ));
            return Err(errors);
        }
    };

    if !object.contains_key("openapi") {
        errors.push("missing required key: 'openapi'".to_string());
    }

    match object.get("info") {
        None => errors.push("missing required key: 'info'".to_string()),
        Some(info) => match info.as_object() {
            None => errors.push(format!(
                "'info' must be an object, got {}",
                json_type_name(info)
            )),
            Some(info) => {
                if !info.contains_key("title") {
                    errors.push("missing required key: 'info.title'".to_string());
                }
                if !info.contains_key("version") {
                    errors.push("missing required key: 'info.version'".to_string());
                }
            }
        },
    }

    if !object.contains_key("paths") {
        errors.push("missing required key: 'paths'".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Returns a human-readable name for the JSON type of a value.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
