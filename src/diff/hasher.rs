//! AF-016: BLAKE3 fingerprints of canonical JSON for resources and documents.

use crate::core::types::Document;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Rebuild `value` with every object's keys sorted.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), canonicalize(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Fingerprint any JSON value, independent of key order.
pub fn hash_value(value: &Value) -> String {
    hash_string(&canonical_json(value))
}

/// Fingerprint one resource fragment.
pub fn fingerprint_resource(fragment: &Map<String, Value>) -> String {
    hash_value(&Value::Object(fragment.clone()))
}

/// Fingerprint a whole document. Resource order is significant.
pub fn fingerprint_document(document: &Document) -> String {
    let resources: Vec<String> = document.resources.iter().map(fingerprint_resource).collect();
    let sections = [
        hash_string(&document.schema),
        hash_string(&document.content_version),
        hash_value(&section_value(&document.parameters)),
        hash_value(&section_value(&document.variables)),
        hash_value(&section_value(&document.outputs)),
    ];
    let mut components: Vec<&str> = sections.iter().map(String::as_str).collect();
    components.extend(resources.iter().map(String::as_str));
    composite_hash(&components)
}

/// An envelope section as a JSON object.
pub fn section_value(section: &IndexMap<String, Value>) -> Value {
    Value::Object(section.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
