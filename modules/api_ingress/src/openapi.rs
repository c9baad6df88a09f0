use std::path::Path;

use serde_json::{json, Map, Value};

use crate::AppInfo;

/// Load the YAML API document and apply the defaults served on `/?spec`.
///
/// An unreadable or malformed file is logged and replaced by an empty
/// document, so the service still starts.
pub fn load_spec(path: &Path, info: &AppInfo) -> Value {
    let loaded = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_yaml::from_str::<Value>(&text).map_err(|e| e.to_string()));

    let doc = match loaded {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            tracing::warn!(target: "spec", path = %path.display(), kind = %kind(&other), "spec is not a mapping, ignoring");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(target: "spec", path = %path.display(), "Could not load the API document: {e}");
            Map::new()
        }
    };
    with_defaults(doc, info)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn with_defaults(mut doc: Map<String, Value>, info: &AppInfo) -> Value {
    doc.entry("swagger").or_insert_with(|| json!("2.0"));

    let info_obj = doc.entry("info").or_insert_with(|| {
        json!({
            "title": info.name,
            "description": info.description,
        })
    });
    if !info_obj.is_object() {
        *info_obj = json!({ "title": info.name });
    }
    if let Some(obj) = info_obj.as_object_mut() {
        obj.insert("version".to_string(), json!(info.version));
    }

    doc.entry("paths").or_insert_with(|| json!({}));
    Value::Object(doc)
}
