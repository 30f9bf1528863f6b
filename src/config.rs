//! Engine configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration: memory-only store, stock domain roots, three loop iterations.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::heuristic::{DEFAULT_DOMAIN_ROOTS, DEFAULT_SCOPE_QUALIFIER};
use crate::error::ConfigError;
use crate::store::StoreConfig;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration passed to [`crate::engine::Engine::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiveConfig {
    pub store: StoreConfig,
    pub gates: GateConfig,
    pub validation: ValidationConfig,
    pub adversarial: AdversarialConfig,
    pub query: QueryConfig,
    pub list: ListConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// A word containing any of these roots counts as a domain term.
    #[serde(default = "default_domain_term_roots")]
    pub domain_term_roots: Vec<String>,
}

fn default_domain_term_roots() -> Vec<String> {
    DEFAULT_DOMAIN_ROOTS.iter().map(|r| r.to_string()).collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            domain_term_roots: default_domain_term_roots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Domain recorded on theses submitted without one.
    #[serde(default = "default_domain")]
    pub default_domain: String,
}

fn default_domain() -> String {
    "nihiltheism".into()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialConfig {
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: usize,
    /// Requests above this are rejected.
    #[serde(default = "default_max_iterations_limit")]
    pub max_iterations_limit: usize,
    /// Prefix the steelman adds to statements without scoping context.
    #[serde(default = "default_scope_qualifier")]
    pub scope_qualifier: String,
    /// Fixes the constraint-phrase choice. Unset means a fresh seed per run.
    #[serde(default)]
    pub phrase_seed: Option<u64>,
}

fn default_max_iterations() -> usize {
    3
}
fn default_max_iterations_limit() -> usize {
    25
}
fn default_scope_qualifier() -> String {
    DEFAULT_SCOPE_QUALIFIER.into()
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: default_max_iterations(),
            max_iterations_limit: default_max_iterations_limit(),
            scope_qualifier: default_scope_qualifier(),
            phrase_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_repair_scenarios")]
    pub max_repair_scenarios: usize,
}

fn default_max_repair_scenarios() -> usize {
    3
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_repair_scenarios: default_max_repair_scenarios(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8300".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl PiveConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse TOML text and validate.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject settings no request could satisfy.
    pub fn validate(&self) -> ConfigResult<()> {
        let adversarial = &self.adversarial;
        if adversarial.max_iterations_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "adversarial.max_iterations_limit must be at least 1".into(),
            });
        }
        if adversarial.default_max_iterations == 0
            || adversarial.default_max_iterations > adversarial.max_iterations_limit
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "adversarial.default_max_iterations must be between 1 and {}",
                    adversarial.max_iterations_limit
                ),
            });
        }
        if self.gates.domain_term_roots.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: "gates.domain_term_roots must not contain empty roots".into(),
            });
        }
        Ok(())
    }
}
