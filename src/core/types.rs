//! AF-001: Core types shared by every pipeline stage.
//!
//! Discovery output, the resolved graph, the project config and the
//! assembled ARM document. Config and document types derive
//! Serialize/Deserialize; discovery types hold unevaluated `syn` trees.

use super::catalog::{ResourceKind, DEFAULT_CATALOG_ROOT};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Discovery
// ============================================================================

/// Where a declaration lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A top-level declaration recognized as an infrastructure resource.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
    /// Declaration name, unique within a run
    pub name: String,

    /// Catalog-resolved kind
    pub kind: ResourceKind,

    /// Provenance
    pub location: SourceLocation,

    /// Unevaluated literal tree
    pub value: syn::Expr,

    /// Bare names mentioned by the value, in first-mention order
    pub dependencies: IndexSet<String>,
}

/// A top-level value that is not a resource. Only used for inlining.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub location: SourceLocation,
    pub value: syn::Expr,
}

/// Everything one discovery run produced.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Resources in declaration order (files sorted by path)
    pub resources: Vec<DiscoveredResource>,

    /// Non-resource top-level values
    pub bindings: Vec<Binding>,

    /// Number of source files parsed
    pub files: usize,
}

// ============================================================================
// Resolution
// ============================================================================

/// `from` must be created after `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// Creation order plus the edges it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGraph {
    /// Every resource name; each edge target precedes its source
    pub order: Vec<String>,

    /// Edges between resources, in declaration order of their source
    pub edges: Vec<DependencyEdge>,
}

impl ResolvedGraph {
    /// Edge targets of `name`, in resolved order.
    pub fn depends_on(&self, name: &str) -> Vec<&str> {
        let targets: IndexSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.from == name)
            .map(|e| e.to.as_str())
            .collect();
        self.order
            .iter()
            .map(String::as_str)
            .filter(|n| targets.contains(n))
            .collect()
    }

    /// Position of `name` in the order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

// ============================================================================
// Document
// ============================================================================

pub const DEFAULT_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#";
pub const DEFAULT_CONTENT_VERSION: &str = "1.0.0.0";

/// Envelope sections that surround the resources array.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub schema: String,
    pub content_version: String,
    pub parameters: IndexMap<String, serde_json::Value>,
    pub variables: IndexMap<String, serde_json::Value>,
    pub outputs: IndexMap<String, serde_json::Value>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            content_version: DEFAULT_CONTENT_VERSION.to_string(),
            parameters: IndexMap::new(),
            variables: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }
}

/// The assembled deployment template. Field order is the wire key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$schema")]
    pub schema: String,

    #[serde(rename = "contentVersion")]
    pub content_version: String,

    #[serde(default)]
    pub parameters: IndexMap<String, serde_json::Value>,

    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,

    #[serde(default)]
    pub resources: Vec<serde_json::Map<String, serde_json::Value>>,

    #[serde(default)]
    pub outputs: IndexMap<String, serde_json::Value>,
}

// ============================================================================
// armforge.yaml
// ============================================================================

/// Root project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable project name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Source root, relative to the config file
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Artifact path, relative to the config file
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Template content version
    #[serde(default = "default_content_version")]
    pub content_version: String,

    /// Crate path the resource-kind modules live under
    #[serde(default = "default_catalog_root")]
    pub catalog_root: String,

    /// Glob patterns (relative to the source root) skipped by discovery
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Template parameters, copied verbatim
    #[serde(default)]
    pub parameters: IndexMap<String, serde_json::Value>,

    /// Template variables, copied verbatim
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,

    /// Template outputs, copied verbatim
    #[serde(default)]
    pub outputs: IndexMap<String, serde_json::Value>,
}

fn default_source() -> PathBuf {
    PathBuf::from("infra")
}

fn default_output() -> PathBuf {
    PathBuf::from("azuredeploy.json")
}

fn default_content_version() -> String {
    DEFAULT_CONTENT_VERSION.to_string()
}

fn default_catalog_root() -> String {
    DEFAULT_CATALOG_ROOT.to_string()
}

impl ProjectConfig {
    /// Envelope sections declared by this project.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            content_version: self.content_version.clone(),
            parameters: self.parameters.clone(),
            variables: self.variables.clone(),
            outputs: self.outputs.clone(),
            ..Envelope::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_af001_config_parse() {
        let yaml = r#"
version: "1.0"
name: web-stack
source: src/infra
parameters:
  location:
    type: string
    defaultValue: westeurope
exclude: ["generated/**"]
"#;
        let config: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.name, "web-stack");
        assert_eq!(config.source, PathBuf::from("src/infra"));
        assert_eq!(config.output, PathBuf::from("azuredeploy.json"));
        assert_eq!(config.catalog_root, "armforge::azure");
        assert_eq!(config.exclude, vec!["generated/**"]);
        assert_eq!(config.parameters["location"]["defaultValue"], "westeurope");
    }

    #[test]
    fn test_af001_config_defaults() {
        let config: ProjectConfig = serde_yaml_ng::from_str("version: \"1.0\"\nname: x\n").unwrap();
        assert_eq!(config.source, PathBuf::from("infra"));
        assert_eq!(config.content_version, "1.0.0.0");
        assert!(config.parameters.is_empty());
    }

    #[test]
    fn test_af001_envelope_from_config() {
        let yaml = r#"
version: "1.0"
name: x
content_version: 2.1.0.0
variables:
  prefix: app
"#;
        let config: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let env = config.envelope();
        assert_eq!(env.schema, DEFAULT_SCHEMA);
        assert_eq!(env.content_version, "2.1.0.0");
        assert_eq!(env.variables["prefix"], "app");
    }

    #[test]
    fn test_af001_document_key_order() {
        let doc = Document {
            schema: DEFAULT_SCHEMA.to_string(),
            content_version: DEFAULT_CONTENT_VERSION.to_string(),
            parameters: IndexMap::new(),
            variables: IndexMap::new(),
            resources: vec![],
            outputs: IndexMap::new(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        let keys = ["$schema", "contentVersion", "parameters", "variables", "resources", "outputs"];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_af001_depends_on_follows_order() {
        let graph = ResolvedGraph {
            order: vec!["c".into(), "b".into(), "a".into()],
            edges: vec![
                DependencyEdge { from: "a".into(), to: "b".into() },
                DependencyEdge { from: "a".into(), to: "c".into() },
            ],
        };
        assert_eq!(graph.depends_on("a"), vec!["c", "b"]);
        assert!(graph.depends_on("c").is_empty());
        assert_eq!(graph.position("a"), Some(2));
    }

    #[test]
    fn test_af001_location_display() {
        assert_eq!(SourceLocation::new("infra/app.rs", 7).to_string(), "infra/app.rs:7");
    }
}
