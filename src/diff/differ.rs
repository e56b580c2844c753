//! AF-017: Differ: compare a fresh document to a prior artifact.
//!
//! Two views: a line diff of the rendered text (LCS) and a semantic diff
//! that matches resources by `(type, name)` regardless of position and
//! compares them by canonical fingerprint.

use super::hasher;
use crate::core::types::Document;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One line of a text diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Same(String),
    Added(String),
    Removed(String),
}

impl fmt::Display for LineChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same(l) => write!(f, "  {}", l),
            Self::Added(l) => write!(f, "+ {}", l),
            Self::Removed(l) => write!(f, "- {}", l),
        }
    }
}

/// Longest-common-subsequence diff over lines.
pub fn line_diff(old: &str, new: &str) -> Vec<LineChange> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(LineChange::Same(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(LineChange::Removed(a[i].to_string()));
            i += 1;
        } else {
            out.push(LineChange::Added(b[j].to_string()));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| LineChange::Removed(l.to_string())));
    out.extend(b[j..].iter().map(|l| LineChange::Added(l.to_string())));
    out
}

/// True if any line changed.
pub fn has_line_changes(changes: &[LineChange]) -> bool {
    changes.iter().any(|c| !matches!(c, LineChange::Same(_)))
}

/// What a change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A resource, identified by provider type and name
    Resource { kind: String, name: String },
    /// An envelope section such as `parameters`
    Section(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { kind, name } => write!(f, "{}/{}", kind, name),
            Self::Section(name) => write!(f, "${}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    /// Top-level keys whose values differ
    Modified { keys: Vec<String> },
}

/// A single semantic finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub target: Target,
    pub kind: ChangeKind,
}

impl fmt::Display for ResourceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChangeKind::Added => write!(f, "+ {}", self.target),
            ChangeKind::Removed => write!(f, "- {}", self.target),
            ChangeKind::Modified { keys } if keys.is_empty() => write!(f, "~ {}", self.target),
            ChangeKind::Modified { keys } => {
                write!(f, "~ {} ({})", self.target, keys.join(", "))
            }
        }
    }
}

fn resource_target(fragment: &Map<String, Value>) -> Target {
    let field = |key: &str| {
        fragment
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Target::Resource {
        kind: field("type"),
        name: field("name"),
    }
}

fn changed_keys(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = new
        .iter()
        .filter(|(k, v)| old.get(k.as_str()).map(hasher::hash_value) != Some(hasher::hash_value(v)))
        .map(|(k, _)| k.clone())
        .collect();
    keys.extend(old.keys().filter(|k| !new.contains_key(k.as_str())).cloned());
    keys
}

/// Semantic diff: envelope sections first, then resources in the new
/// document's order, then removals in the old document's order.
pub fn semantic_diff(old: &Document, new: &Document) -> Vec<ResourceChange> {
    let mut changes = Vec::new();

    let sections = [
        ("schema", Value::from(old.schema.as_str()), Value::from(new.schema.as_str())),
        (
            "contentVersion",
            Value::from(old.content_version.as_str()),
            Value::from(new.content_version.as_str()),
        ),
        (
            "parameters",
            hasher::section_value(&old.parameters),
            hasher::section_value(&new.parameters),
        ),
        (
            "variables",
            hasher::section_value(&old.variables),
            hasher::section_value(&new.variables),
        ),
        (
            "outputs",
            hasher::section_value(&old.outputs),
            hasher::section_value(&new.outputs),
        ),
    ];
    for (name, before, after) in &sections {
        if hasher::hash_value(before) != hasher::hash_value(after) {
            let keys = match (before, after) {
                (Value::Object(b), Value::Object(a)) => changed_keys(b, a),
                _ => Vec::new(),
            };
            changes.push(ResourceChange {
                target: Target::Section((*name).to_string()),
                kind: ChangeKind::Modified { keys },
            });
        }
    }

    let previous: HashMap<Target, &Map<String, Value>> = old
        .resources
        .iter()
        .map(|r| (resource_target(r), r))
        .collect();
    let mut seen = HashSet::new();
    for fragment in &new.resources {
        let target = resource_target(fragment);
        seen.insert(target.clone());
        match previous.get(&target) {
            None => changes.push(ResourceChange {
                target,
                kind: ChangeKind::Added,
            }),
            Some(prior) => {
                if hasher::fingerprint_resource(prior) != hasher::fingerprint_resource(fragment) {
                    changes.push(ResourceChange {
                        kind: ChangeKind::Modified {
                            keys: changed_keys(prior, fragment),
                        },
                        target,
                    });
                }
            }
        }
    }
    for fragment in &old.resources {
        let target = resource_target(fragment);
        if !seen.contains(&target) {
            changes.push(ResourceChange {
                target,
                kind: ChangeKind::Removed,
            });
        }
    }
    changes
}
