//! Default maps: per-invocation parameter defaults loaded from YAML
//!
//! A default map is a YAML mapping from destination names to values. A
//! nested mapping under a subcommand's name holds that subcommand's defaults:
//!
//! ```yaml
//! verbose: true
//! deploy:
//!   region: eu-west-1
//! ```

use crate::error::{ConfigError, Result};
use crate::model::Value;
use serde_yaml::Mapping;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultMap {
    entries: Mapping,
}

impl DefaultMap {
    pub fn new() -> Self {
        DefaultMap::default()
    }

    /// Parse a default map from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        match doc {
            serde_yaml::Value::Mapping(entries) => Ok(DefaultMap { entries }),
            serde_yaml::Value::Null => Ok(DefaultMap::new()),
            _ => Err(ConfigError::Invalid("default map must be a YAML mapping".to_string()).into()),
        }
    }

    /// Load a default map from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Set a scalar or list default
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_yaml::Value>) {
        self.entries
            .insert(serde_yaml::Value::String(name.into()), value.into());
    }

    /// Nest `child` as the defaults of subcommand `name`
    pub fn insert_child(&mut self, name: impl Into<String>, child: DefaultMap) {
        self.entries.insert(
            serde_yaml::Value::String(name.into()),
            serde_yaml::Value::Mapping(child.entries),
        );
    }

    /// The default for destination `name`. Nested mappings belong to
    /// subcommands and are never parameter values.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.entries.get(name)? {
            serde_yaml::Value::Mapping(_) => None,
            serde_yaml::Value::Null => None,
            value => Some(Value::from(value)),
        }
    }

    /// Defaults for subcommand `name`
    pub fn child(&self, name: &str) -> Option<DefaultMap> {
        match self.entries.get(name)? {
            serde_yaml::Value::Mapping(entries) => Some(DefaultMap {
                entries: entries.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
