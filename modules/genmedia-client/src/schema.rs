use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Types that can be requested as a structured JSON reply.
///
/// Gemini's `responseJsonSchema` accepts plain JSON Schema but rejects
/// `$ref` indirection, so definitions are inlined and schemars metadata
/// (`$schema`, `title`, `definitions`) is dropped.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn response_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        inline_refs(&mut value);
        strip_metadata(&mut value);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn strip_metadata(value: &mut Value) {
    match value {
        Value::Object(map) => {
            // "title" is only metadata when it holds a string; a property
            // literally named "title" holds an object schema.
            if matches!(map.get("title"), Some(Value::String(_))) {
                map.remove("title");
            }
            for (_, v) in map.iter_mut() {
                strip_metadata(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                strip_metadata(item);
            }
        }
        _ => {}
    }
}

fn inline_refs(value: &mut Value) {
    let definitions = if let Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(type_name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    if let Some(only) = all_of.into_iter().next() {
                        *value = only;
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}
