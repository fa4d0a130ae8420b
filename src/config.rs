//! TOML configuration for query limits, default permissions, and per-type
//! value-group rules.
//!
//! ```toml
//! default_permissions = ["project.access_catalog"]
//!
//! [query]
//! max_depth = 32
//! check_unknown_in_all_groups = false
//!
//! [types.sample]
//! required_one_of = [{ name = "location", fields = ["country", "region"] }]
//! ordered = [{ lower = "collection_month", higher = "received_month" }]
//! no_future = ["collection_month", "received_month"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_groups::ValueGroupRules;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "CATALOG_GATE_CONFIG";

/// Limits applied while compiling a query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Maximum nesting depth of the boolean expression.
    pub max_depth: usize,
    /// Maximum number of nodes (operators plus leaves).
    pub max_nodes: usize,
    /// Maximum number of values accepted by an `in` lookup.
    pub max_in_values: usize,
    /// Run unknown-field detection on every partitioned group instead of the
    /// first one only.
    pub check_unknown_in_all_groups: bool,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 1_000,
            max_in_values: 1_000,
            check_unknown_in_all_groups: false,
        }
    }
}

/// Fully parsed gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GateConfig {
    /// Query compilation limits.
    #[serde(default)]
    pub query: QueryLimits,
    /// Permissions every request requires in addition to the type-level one.
    #[serde(default)]
    pub default_permissions: Vec<String>,
    /// Value-group rules keyed by record type name.
    #[serde(default)]
    pub types: BTreeMap<String, ValueGroupRules>,
}

impl GateConfig {
    /// Loads the configuration from `explicit`, then `$CATALOG_GATE_CONFIG`,
    /// then the user config directory. A missing file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        match path {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reads and validates a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GateConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without touching the filesystem.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: GateConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Value-group rules for `type_name`, if any were configured.
    pub fn rules_for(&self, type_name: &str) -> Option<&ValueGroupRules> {
        self.types.get(type_name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.query.max_depth == 0 || self.query.max_nodes == 0 {
            return Err(ConfigError::InvalidLimit(
                "query.max_depth and query.max_nodes must be positive".into(),
            ));
        }
        for (type_name, rules) in &self.types {
            for group in &rules.required_one_of {
                if group.fields.is_empty() {
                    return Err(ConfigError::InvalidRule {
                        type_name: type_name.clone(),
                        reason: format!("required_one_of group '{}' has no fields", group.name),
                    });
                }
            }
            for pair in &rules.ordered {
                if pair.lower == pair.higher {
                    return Err(ConfigError::InvalidRule {
                        type_name: type_name.clone(),
                        reason: format!("ordered pair compares '{}' with itself", pair.lower),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read gate config {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid TOML for [`GateConfig`].
    #[error("failed to parse gate config {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// A query limit is out of range.
    #[error("invalid query limit: {0}")]
    InvalidLimit(String),
    /// A value-group rule is inconsistent.
    #[error("invalid value-group rule for '{type_name}': {reason}")]
    InvalidRule {
        /// Record type the rule belongs to.
        type_name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("catalog-gate").join("gate.toml"))
}
