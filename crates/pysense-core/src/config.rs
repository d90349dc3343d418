//! Manager configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cap on values yielded per inference session
pub const DEFAULT_MAX_INFERRED: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directories searched for absolute imports, after the importing file's directory
    pub search_paths: Vec<PathBuf>,
    pub max_inferred: usize,
    /// Run registered transforms on freshly built modules
    pub apply_transforms: bool,
    /// Ask the syntax adapter to honour annotation comments
    pub type_comments: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            max_inferred: DEFAULT_MAX_INFERRED,
            apply_transforms: true,
            type_comments: true,
        }
    }
}

impl ManagerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.max_inferred, 100);
        assert!(config.apply_transforms);
        assert!(config.type_comments);
        assert!(config.search_paths.is_empty());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"search_paths": ["/opt/lib"], "max_inferred": 7}}"#).unwrap();

        let config = ManagerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.search_paths, vec![PathBuf::from("/opt/lib")]);
        assert_eq!(config.max_inferred, 7);
        assert!(config.apply_transforms);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ManagerConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }
}
