//! AF-015: Artifact files: load a prior document, save (atomic).

use super::error::{Error, Result};
use super::types::Document;
use std::path::Path;

/// Load a prior artifact. Returns None if the file doesn't exist.
pub fn read_document(path: &Path) -> Result<Option<Document>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let document = serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(document))
}

/// Load a prior artifact as untyped JSON, for validation of foreign files.
pub fn read_value(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Save rendered document text atomically (write to temp, then rename).
pub fn write_document(path: &Path, rendered: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, rendered).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembler::{assemble, render};
    use crate::core::types::Envelope;

    #[test]
    fn test_af015_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("azuredeploy.json");
        let doc = assemble(&Envelope::default(), Vec::new());
        write_document(&path, &render(&doc)).unwrap();
        assert_eq!(read_document(&path).unwrap(), Some(doc));
        assert!(!dir.path().join("out").join("azuredeploy.json.tmp").exists());
    }

    #[test]
    fn test_af015_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_document(&dir.path().join("none.json")).unwrap(), None);
    }

    #[test]
    fn test_af015_overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        write_document(&path, "old").unwrap();
        write_document(&path, "{}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_af015_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(read_document(&path), Err(Error::Json { .. })));
        assert!(matches!(read_value(&path), Err(Error::Json { .. })));
    }
}
