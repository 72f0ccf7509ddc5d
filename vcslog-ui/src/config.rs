use anyhow::{Context, Result};
use graph::SortType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log view settings, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Commits requested per background read
    pub page_size: usize,
    pub detail_cache_capacity: usize,
    pub sort: SortType,
    /// Collapse every long enough fragment after each load
    pub hide_long_branches: bool,
    pub long_edges_hidden: bool,
    pub min_fragment_len: usize,
    /// Ref names whose heads win lane and color assignment, best first
    pub head_priority: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            detail_cache_capacity: 150,
            sort: SortType::LogOrder,
            hide_long_branches: false,
            long_edges_hidden: false,
            min_fragment_len: 1,
            head_priority: vec!["HEAD".into(), "main".into(), "master".into()],
        }
    }
}

impl LogConfig {
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig::load(&dir.path().join("vcslog.toml")).unwrap();
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = LogConfig::from_toml_str(
            r#"
            page_size = 50
            sort = "date"
            head_priority = ["trunk"]
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.sort, SortType::Date);
        assert_eq!(config.head_priority, vec!["trunk".to_string()]);
        assert_eq!(config.detail_cache_capacity, 150);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vcslog.toml");
        std::fs::write(&path, "page_size = \"lots\"").unwrap();
        assert!(LogConfig::load(&path).is_err());
    }
}
