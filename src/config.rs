use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub(crate) const READ_BUFFER_SIZE :usize = 16 * 1024 * 1024;

/// Magic bytes at the head of an adjacency cache file.
pub(crate) const CACHE_MAGIC :&[u8; 4] = b"FCDG";

pub(crate) const CACHE_VERSION :u32 = 1;

/// Candidates popped in the first round of the batched loop.
pub const DEFAULT_INITIAL_SCOPE :usize = 64;

/// Candidates popped in every later round of the batched loop.
pub const DEFAULT_SUBSEQUENT_SCOPE :usize = 2;

/// Below this many communities the initial scan stays on the current thread.
pub(crate) const PARALLEL_SCAN_THRESHOLD :usize = 4 * 1024;

/// Which optimization loop to run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Single best pair per step.
    #[default]
    Cnm,
    /// Batched rounds of disjoint pairs, finished by `Cnm`.
    Cnm2,
}

/// Run options, loaded from a yaml file. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub algorithm: Algorithm,
    pub initial_scope: usize,
    pub subsequent_scope: usize,
    pub cache_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            algorithm: Algorithm::default(),
            initial_scope: DEFAULT_INITIAL_SCOPE,
            subsequent_scope: DEFAULT_SUBSEQUENT_SCOPE,
            cache_path: None,
            output_path: None,
            log_file: None,
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<RunConfig> {
        let config: RunConfig = serde_yaml::from_str(text)
            .context("failed to parse run config")?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod test_config {
    use crate::config::{Algorithm, RunConfig, DEFAULT_INITIAL_SCOPE, DEFAULT_SUBSEQUENT_SCOPE};

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = RunConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.algorithm, Algorithm::Cnm);
        assert_eq!(config.initial_scope, DEFAULT_INITIAL_SCOPE);
        assert_eq!(config.subsequent_scope, DEFAULT_SUBSEQUENT_SCOPE);
    }

    #[test]
    fn test_partial_yaml() {
        let config = RunConfig::from_yaml_str("algorithm: cnm2\ninitial_scope: 8\n").unwrap();
        assert_eq!(config.algorithm, Algorithm::Cnm2);
        assert_eq!(config.initial_scope, 8);
        assert_eq!(config.subsequent_scope, DEFAULT_SUBSEQUENT_SCOPE);
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(RunConfig::from_yaml_str("scope_size: 3\n").is_err());
    }
}
