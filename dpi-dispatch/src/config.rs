//! Dispatch configuration types
//!
//! Describes where implementations of the declared imports are searched for.
//! Registered Rust handlers are supplied separately as a `ProviderTable`;
//! this configuration only covers modules and the process namespace.

use crate::types::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for building a dispatch `Environment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Provider modules to load and search, in order
    #[serde(default)]
    pub providers: Vec<PathBuf>,

    /// Whether to search the process's global symbol namespace
    #[serde(default = "default_true")]
    pub search_process: bool,

    /// How the process namespace is searched
    #[serde(default)]
    pub scope: SearchScope,

    /// Bind the simulator's caller-info and message-report services if present
    #[serde(default = "default_true")]
    pub host_services: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            search_process: true,
            scope: SearchScope::default(),
            host_services: true,
        }
    }
}

/// Search scope for the process namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Modules loaded after this one (`RTLD_NEXT`); never finds this module
    #[default]
    Next,
    /// Every loaded module in load order (`RTLD_DEFAULT`)
    Global,
}

impl DispatchConfig {
    /// Create a new dispatch configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DispatchError::Config(e.to_string()))
    }

    /// Builder method: add a provider module
    pub fn add_provider(mut self, path: impl Into<PathBuf>) -> Self {
        self.providers.push(path.into());
        self
    }

    /// Builder method: enable or disable the process namespace search
    pub fn with_process_search(mut self, enabled: bool) -> Self {
        self.search_process = enabled;
        self
    }

    /// Builder method: set the process search scope
    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Builder method: enable or disable host service binding
    pub fn with_host_services(mut self, enabled: bool) -> Self {
        self.host_services = enabled;
        self
    }
}
