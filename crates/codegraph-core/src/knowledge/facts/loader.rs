//! Fact batch loading from JSON or YAML documents.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::ModuleFacts;
use crate::knowledge::error::KnowledgeError;

/// Extensions recognized when loading a directory of fact files.
const FACT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// The complete fact stream for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct FactBatch {
    /// Decoded module fact sets
    pub modules: Vec<ModuleFacts>,
    /// Elements of the stream that were not module fact sets
    pub rejected: Vec<String>,
}

impl FactBatch {
    pub fn new(modules: Vec<ModuleFacts>) -> Self {
        Self {
            modules,
            rejected: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Parse a JSON document (a module fact set, a list of them, or
    /// `{"modules": [...]}`).
    pub fn from_json_str(content: &str) -> Result<Self, KnowledgeError> {
        let value: Value = serde_json::from_str(content)?;
        Ok(Self::from_value(value))
    }

    /// Parse a YAML document with the same shapes as [`from_json_str`](Self::from_json_str).
    pub fn from_yaml_str(content: &str) -> Result<Self, KnowledgeError> {
        let value: Value = serde_yaml::from_str(content)?;
        Ok(Self::from_value(value))
    }

    /// Interpret an already-parsed document.
    pub fn from_value(value: Value) -> Self {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) if obj.get("modules").map(Value::is_array).unwrap_or(false) => {
                match obj.remove("modules") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                }
            }
            single => vec![single],
        };

        let mut batch = Self::default();
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<ModuleFacts>(item) {
                Ok(module) => batch.modules.push(module),
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed module fact set");
                    batch.rejected.push(format!("module #{}: {}", index, err));
                }
            }
        }
        batch
    }

    /// Load a single fact file; the format follows the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| KnowledgeError::io(path, e))?;

        let batch = match extension(path).as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            _ => Self::from_json_str(&content)?,
        };
        debug!(path = %path.display(), modules = batch.modules.len(), "loaded fact file");
        Ok(batch)
    }

    /// Load every fact file in a directory (non-recursive, sorted by name).
    ///
    /// Unreadable or unparsable files are skipped with a warning. Loading fails
    /// only when no file could be read at all.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| KnowledgeError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                extension(p)
                    .map(|ext| FACT_EXTENSIONS.contains(&ext.as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut batch = Self::default();
        let mut loaded = 0usize;
        for file in &files {
            match Self::from_path(file) {
                Ok(part) => {
                    loaded += 1;
                    batch.merge(part);
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "skipping unreadable fact file");
                    batch.rejected.push(format!("{}: {}", file.display(), err));
                }
            }
        }

        if loaded == 0 {
            return Err(KnowledgeError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no readable fact files"),
            ));
        }
        Ok(batch)
    }

    /// Load a file or a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_path(path)
        }
    }

    pub fn merge(&mut self, other: FactBatch) {
        self.modules.extend(other.modules);
        self.rejected.extend(other.rejected);
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_module_document() {
        let batch = FactBatch::from_json_str(r#"{"module_name": "A", "functions": []}"#).unwrap();
        assert_eq!(batch.modules.len(), 1);
        assert_eq!(batch.modules[0].module_name, "A");
    }

    #[test]
    fn test_module_list_with_bad_entry() {
        let batch = FactBatch::from_json_str(r#"[{"module": "A"}, 7, {"name": "B"}]"#).unwrap();
        assert_eq!(batch.modules.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.modules[1].module_name, "B");
    }

    #[test]
    fn test_yaml_modules_key() {
        let yaml = "modules:\n  - module_name: A\n    functions:\n      - name: f\n";
        let batch = FactBatch::from_yaml_str(yaml).unwrap();
        assert_eq!(batch.modules.len(), 1);
        assert_eq!(batch.modules[0].functions.len(), 1);
    }

    #[test]
    fn test_load_directory_skips_broken_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"module_name": "A"}"#).unwrap();
        fs::write(dir.path().join("b.yaml"), "module_name: B\n").unwrap();
        fs::write(dir.path().join("c.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let batch = FactBatch::load(dir.path()).unwrap();
        let names: Vec<&str> = batch.modules.iter().map(|m| m.module_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(batch.rejected.len(), 1);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(FactBatch::from_dir(dir.path()).is_err());
    }
}
