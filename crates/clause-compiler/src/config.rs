//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! full_rebuild_threshold = 64
//! self_name = "self"
//! color_diagnostics = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// An incremental rebuild touching more definitions than this becomes
    /// a full rebuild.
    pub full_rebuild_threshold: Option<usize>,
    /// Identifier bound to the `self` record in class-scoped expressions.
    pub self_name: String,
    pub color_diagnostics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            full_rebuild_threshold: None,
            self_name: "self".to_string(),
            color_diagnostics: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Whether an invalidation of `count` definitions should rebuild
    /// everything.
    pub fn prefers_full_rebuild(&self, count: usize) -> bool {
        self.full_rebuild_threshold
            .is_some_and(|threshold| count > threshold)
    }
}
