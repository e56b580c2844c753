//! AF-014: Structural checks over an assembled or prior document.

use super::config::ValidationError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Top-level keys, in wire order.
pub const DOCUMENT_KEYS: [&str; 6] = [
    "$schema",
    "contentVersion",
    "parameters",
    "variables",
    "resources",
    "outputs",
];

static PARAMETER_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"parameters\('((?:[^']|'')*)'\)").expect("static regex"));
static VARIABLE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"variables\('((?:[^']|'')*)'\)").expect("static regex"));
static RESOURCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[resourceId\('([^']+)',\s*((?:'(?:[^']|'')*'\s*,\s*)*'(?:[^']|'')*')\)\]$")
        .expect("static regex")
});
static NAME_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^']|'')*)'").expect("static regex"));

/// Validate a document. Returns a list of errors (empty = valid).
pub fn validate_document(document: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let Some(root) = document.as_object() else {
        errors.push(ValidationError::new("document must be a JSON object"));
        return errors;
    };

    let present: Vec<&str> = root
        .keys()
        .map(String::as_str)
        .filter(|k| DOCUMENT_KEYS.contains(k))
        .collect();
    for key in DOCUMENT_KEYS {
        if !root.contains_key(key) {
            errors.push(ValidationError::new(format!("missing top-level key '{}'", key)));
        }
    }
    let expected: Vec<&str> = DOCUMENT_KEYS
        .iter()
        .copied()
        .filter(|k| present.contains(k))
        .collect();
    if present != expected {
        errors.push(ValidationError::new(format!(
            "top-level keys out of order: {}",
            present.join(", ")
        )));
    }

    let declared = |section: &str| -> HashSet<String> {
        root.get(section)
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    };
    let parameters = declared("parameters");
    let variables = declared("variables");

    let resources: &[Value] = match root.get("resources") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            errors.push(ValidationError::new("'resources' must be an array"));
            &[]
        }
        None => &[],
    };

    let mut ids: HashSet<(String, String)> = HashSet::new();
    for (i, resource) in resources.iter().enumerate() {
        let label = resource
            .get("name")
            .and_then(Value::as_str)
            .map(|n| format!("resource '{}'", n))
            .unwrap_or_else(|| format!("resource #{}", i));
        for key in ["type", "apiVersion", "name"] {
            if !resource.get(key).is_some_and(Value::is_string) {
                errors.push(ValidationError::new(format!(
                    "{} has no string '{}'",
                    label, key
                )));
            }
        }
        if let (Some(t), Some(n)) = (
            resource.get("type").and_then(Value::as_str),
            resource.get("name").and_then(Value::as_str),
        ) {
            ids.insert((t.to_string(), n.to_string()));
        }
    }

    for resource in resources {
        let label = resource
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");
        let Some(deps) = resource.get("dependsOn") else {
            continue;
        };
        let Some(deps) = deps.as_array() else {
            errors.push(ValidationError::new(format!(
                "resource '{}' dependsOn must be an array",
                label
            )));
            continue;
        };
        for dep in deps {
            let Some(dep) = dep.as_str() else {
                errors.push(ValidationError::new(format!(
                    "resource '{}' has a non-string dependsOn entry",
                    label
                )));
                continue;
            };
            // Expression names cannot be checked statically.
            let Some(caps) = RESOURCE_ID.captures(dep) else {
                continue;
            };
            // child resources pass one name segment per level
            let name: Vec<String> = NAME_SEGMENT
                .captures_iter(&caps[2])
                .map(|segment| segment[1].replace("''", "'"))
                .collect();
            let target = (caps[1].to_string(), name.join("/"));
            if !ids.contains(&target) {
                errors.push(ValidationError::new(format!(
                    "resource '{}' depends on missing resource {}/{}",
                    label, target.0, target.1
                )));
            }
        }
    }

    let mut strings = Vec::new();
    collect_strings(document, &mut strings);
    let mut reported = HashSet::new();
    for s in strings {
        check_refs(s, &PARAMETER_REF, &parameters, "parameter", &mut reported, &mut errors);
        check_refs(s, &VARIABLE_REF, &variables, "variable", &mut reported, &mut errors);
    }

    errors
}

fn check_refs(
    text: &str,
    pattern: &Regex,
    declared: &HashSet<String>,
    what: &str,
    reported: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    if !text.starts_with('[') {
        return;
    }
    for caps in pattern.captures_iter(text) {
        let name = caps[1].replace("''", "'");
        if !declared.contains(&name) && reported.insert(format!("{}:{}", what, name)) {
            errors.push(ValidationError::new(format!(
                "undeclared {} '{}'",
                what, name
            )));
        }
    }
}

fn collect_strings<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(resources: Value) -> Value {
        json!({
            "$schema": "s",
            "contentVersion": "1.0.0.0",
            "parameters": { "location": { "type": "string" } },
            "variables": { "prefix": "app" },
            "resources": resources,
            "outputs": {}
        })
    }

    #[test]
    fn test_af014_valid_document() {
        let d = doc(json!([
            { "type": "Microsoft.Web/serverfarms", "apiVersion": "2022-09-01", "name": "plan",
              "location": "[parameters('location')]" },
            { "type": "Microsoft.Web/sites", "apiVersion": "2022-09-01", "name": "[variables('prefix')]",
              "dependsOn": ["[resourceId('Microsoft.Web/serverfarms', 'plan')]"] }
        ]));
        assert!(validate_document(&d).is_empty(), "{:?}", validate_document(&d));
    }

    #[test]
    fn test_af014_missing_and_misordered_keys() {
        let d = json!({ "contentVersion": "1", "$schema": "s", "resources": [] });
        let errors = validate_document(&d);
        assert!(errors.iter().any(|e| e.message.contains("missing top-level key 'parameters'")));
        assert!(errors.iter().any(|e| e.message.contains("out of order")));
    }

    #[test]
    fn test_af014_resource_fields_required() {
        let d = doc(json!([{ "type": "Microsoft.Web/sites", "name": 3 }]));
        let errors = validate_document(&d);
        assert!(errors.iter().any(|e| e.message.contains("no string 'apiVersion'")));
        assert!(errors.iter().any(|e| e.message.contains("resource #0 has no string 'name'")));
    }

    #[test]
    fn test_af014_dangling_depends_on() {
        let d = doc(json!([
            { "type": "Microsoft.Web/sites", "apiVersion": "v", "name": "app",
              "dependsOn": ["[resourceId('Microsoft.Web/serverfarms', 'ghost')]"] }
        ]));
        let errors = validate_document(&d);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing resource Microsoft.Web/serverfarms/ghost"));
    }

    #[test]
    fn test_af014_child_depends_on_segments() {
        let d = doc(json!([
            { "type": "Microsoft.Network/virtualNetworks/subnets", "apiVersion": "v", "name": "vnet/web" },
            { "type": "Microsoft.Web/sites", "apiVersion": "v", "name": "app",
              "dependsOn": [
                "[resourceId('Microsoft.Network/virtualNetworks/subnets', 'vnet', 'web')]",
                "[resourceId('Microsoft.Network/virtualNetworks/subnets', 'vnet', 'db')]"
              ] }
        ]));
        let errors = validate_document(&d);
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0]
            .message
            .contains("missing resource Microsoft.Network/virtualNetworks/subnets/vnet/db"));
    }

    #[test]
    fn test_af014_undeclared_references_reported_once() {
        let d = doc(json!([
            { "type": "t", "apiVersion": "v", "name": "a",
              "location": "[parameters('region')]", "sku": "[parameters('region')]",
              "tag": "[variables('missing')]" }
        ]));
        let errors = validate_document(&d);
        assert_eq!(errors.len(), 2, "{:?}", errors);
    }

    #[test]
    fn test_af014_not_an_object() {
        assert_eq!(validate_document(&json!([])).len(), 1);
    }
}
