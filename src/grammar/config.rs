//! Build configuration
//!
//! Options for a single `normalize` call. Configurations can be written by
//! hand or loaded from JSON/YAML; missing fields take their defaults.

use serde::Deserialize;

/// Default nesting depth ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default reserved sub-name for splicing alternatives into a parent choice.
pub const DEFAULT_SPLICE_KEY: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum nesting depth of sequence/choice brackets. Exceeding it is a
    /// resource-limit failure, not a grammar error.
    pub max_depth: usize,

    /// Sub-name inside a named-object rule whose alternatives are appended
    /// to the parent choice instead of becoming a new rule key.
    pub splice_key: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            splice_key: DEFAULT_SPLICE_KEY.to_string(),
        }
    }
}

impl BuildConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
