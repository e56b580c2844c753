//! AF-013: armforge.yaml parsing and validation.
//!
//! Parses armforge.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Name must not be empty
//! - Exclude globs must compile
//! - Parameter definitions must carry a `type`

use super::error::{Error, Result};
use super::types::ProjectConfig;
use std::path::{Path, PathBuf};

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse an armforge.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_config(&content)
}

/// Parse an armforge.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<ProjectConfig> {
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Config(format!("YAML parse error: {}", e)))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &ProjectConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError::new(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        )));
    }

    if config.name.trim().is_empty() {
        errors.push(ValidationError::new("name must not be empty"));
    }

    if config.catalog_root.trim().is_empty() {
        errors.push(ValidationError::new("catalog_root must not be empty"));
    }

    for pattern in &config.exclude {
        if let Err(e) = glob::Pattern::new(pattern) {
            errors.push(ValidationError::new(format!(
                "exclude pattern '{}' is invalid: {}",
                pattern, e
            )));
        }
    }

    for (name, definition) in &config.parameters {
        let has_type = definition
            .get("type")
            .and_then(|t| t.as_str())
            .is_some_and(|t| !t.is_empty());
        if !has_type {
            errors.push(ValidationError::new(format!(
                "parameter '{}' has no type",
                name
            )));
        }
    }

    for (name, definition) in &config.outputs {
        if definition.get("type").is_none() || definition.get("value").is_none() {
            errors.push(ValidationError::new(format!(
                "output '{}' needs both type and value",
                name
            )));
        }
    }

    errors
}

/// Source root and artifact path, resolved against the config's directory.
pub fn project_paths(config: &ProjectConfig, config_path: &Path) -> (PathBuf, PathBuf) {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    (base.join(&config.source), base.join(&config.output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_af013_parse_minimal() {
        let config = parse_config("version: \"1.0\"\nname: minimal\n").unwrap();
        assert_eq!(config.name, "minimal");
        assert_eq!(config.source, PathBuf::from("infra"));
        assert_eq!(config.output, PathBuf::from("azuredeploy.json"));
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_af013_bad_version() {
        let config = parse_config("version: \"2.0\"\nname: x\n").unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("version must be")));
    }

    #[test]
    fn test_af013_empty_name() {
        let config = parse_config("version: \"1.0\"\nname: \"  \"\n").unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("name must not be empty")));
    }

    #[test]
    fn test_af013_invalid_exclude_glob() {
        let yaml = r#"
version: "1.0"
name: x
exclude: ["generated/**", "[broken"]
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("[broken"));
    }

    #[test]
    fn test_af013_parameter_without_type() {
        let yaml = r#"
version: "1.0"
name: x
parameters:
  location:
    type: string
  sku:
    defaultValue: B1
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("parameter 'sku' has no type"));
    }

    #[test]
    fn test_af013_output_needs_value() {
        let yaml = r#"
version: "1.0"
name: x
outputs:
  endpoint:
    type: string
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("output 'endpoint'")));
    }

    #[test]
    fn test_af013_parse_file_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("armforge.yaml");
        std::fs::write(&path, "version: \"1.0\"\nname: file-test\nsource: src/infra\n").unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.name, "file-test");
        let (source, output) = project_paths(&config, &path);
        assert_eq!(source, dir.path().join("src/infra"));
        assert_eq!(output, dir.path().join("azuredeploy.json"));
    }

    #[test]
    fn test_af013_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_config_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_af013_parse_invalid_yaml() {
        let result = parse_config("not: [valid: yaml: {{");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
