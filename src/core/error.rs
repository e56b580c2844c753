//! AF-007: Pipeline error taxonomy.
//!
//! Parse and dependency failures abort the whole run and carry enough
//! location or cycle context for the CLI to report them. Synthesis has no
//! error variant: it degrades by omission.

use super::types::SourceLocation;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the pipeline can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A source file under the root is not valid Rust.
    #[error("{}:{line}:{column}: parse error: {message}", .file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Two resources share a name within one run.
    #[error("duplicate resource name '{name}' (declared at {first} and {second})")]
    DuplicateName {
        name: String,
        first: SourceLocation,
        second: SourceLocation,
    },

    /// The reference graph contains a cycle. Members are in path order.
    #[error("dependency cycle detected: {}", cycle_path(.members))]
    Dependency { members: Vec<String> },

    /// A local file could not be read or written.
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project config is unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A prior artifact is not valid JSON.
    #[error("invalid document {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn cycle_path(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {}", members.join(" -> "), first),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_af007_cycle_message_closes_loop() {
        let err = Error::Dependency {
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c -> a");
    }

    #[test]
    fn test_af007_self_cycle_message() {
        let err = Error::Dependency {
            members: vec!["solo".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: solo -> solo");
    }

    #[test]
    fn test_af007_parse_message_names_file() {
        let err = Error::Parse {
            file: PathBuf::from("infra/net.rs"),
            line: 4,
            column: 12,
            message: "expected `;`".into(),
        };
        assert_eq!(err.to_string(), "infra/net.rs:4:12: parse error: expected `;`");
    }

    #[test]
    fn test_af007_duplicate_message_has_both_locations() {
        let err = Error::DuplicateName {
            name: "LOGS".into(),
            first: SourceLocation::new("a.rs", 3),
            second: SourceLocation::new("b.rs", 9),
        };
        let msg = err.to_string();
        assert!(msg.contains("a.rs:3"));
        assert!(msg.contains("b.rs:9"));
    }
}
