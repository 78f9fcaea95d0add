//! YAML configuration for the enhancer.
//!
//! ```yaml
//! workers: 4
//! max_wait_secs: 60
//! result_location_prefix: /jobs/
//! default_chain: dbpedia
//! log_level: info
//! chains:
//!   - name: dbpedia
//!     nodes:
//!       - "langdetect"
//!       - "ner;dependsOn=langdetect"
//!       - "linking;dependsOn=ner;optional"
//! ```

use crate::plan::{parse_chain_list, ChainRegistry, PlanError};
use crate::scheduler::DEFAULT_WORKERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("chain '{chain}': {source}")]
    Plan {
        chain: String,
        #[source]
        source: PlanError,
    },

    #[error("chain '{0}' is configured more than once")]
    DuplicateChain(String),

    #[error("default chain '{0}' is not configured")]
    UnknownDefaultChain(String),
}

/// A named chain in chain-list syntax, one node per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancerConfig {
    /// Concurrent asynchronous engine invocations
    pub workers: usize,
    /// Deadline applied to facade runs; `None` waits indefinitely
    pub max_wait_secs: Option<u64>,
    pub result_location_prefix: String,
    pub default_chain: Option<String>,
    pub log_level: String,
    pub chains: Vec<ChainConfig>,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_wait_secs: None,
            result_location_prefix: "/jobs/".to_string(),
            default_chain: None,
            log_level: "info".to_string(),
            chains: Vec::new(),
        }
    }
}

impl EnhancerConfig {
    /// `<config_dir>/enhancer/enhancer.yaml`
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"));
        config_dir.join("enhancer").join("enhancer.yaml")
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        tracing::debug!(path = %path.display(), chains = config.chains.len(), "loaded config");
        Ok(config)
    }

    /// Load `path`, or the default location; a missing default file
    /// yields the default config.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }

    /// Parse and validate every configured chain.
    pub fn build_chain_registry(&self) -> Result<ChainRegistry, ConfigError> {
        let mut registry = ChainRegistry::new();
        if let Some(default) = &self.default_chain {
            if !self.chains.iter().any(|c| &c.name == default) {
                return Err(ConfigError::UnknownDefaultChain(default.clone()));
            }
            registry = registry.with_default(default.clone());
        }
        for chain in &self.chains {
            let plan = parse_chain_list(&chain.name, &chain.nodes).map_err(|source| ConfigError::Plan {
                chain: chain.name.clone(),
                source,
            })?;
            if registry.register(plan).is_some() {
                return Err(ConfigError::DuplicateChain(chain.name.clone()));
            }
        }
        Ok(registry)
    }
}
