//! AF-011: Document assembly: envelope plus ordered fragments.

use super::types::{Document, Envelope};
use serde_json::{Map, Value};

/// Wrap ordered fragments in the ARM envelope.
pub fn assemble(envelope: &Envelope, resources: Vec<Map<String, Value>>) -> Document {
    Document {
        schema: envelope.schema.clone(),
        content_version: envelope.content_version.clone(),
        parameters: envelope.parameters.clone(),
        variables: envelope.variables.clone(),
        resources,
        outputs: envelope.outputs.clone(),
    }
}

/// Two-space indented JSON with a trailing newline.
pub fn render(document: &Document) -> String {
    // Document holds only strings, maps and JSON values; serialization
    // cannot fail.
    let mut out = serde_json::to_string_pretty(document).unwrap_or_default();
    out.push('\n');
    out
}
