//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::WaypointConfig;
use crate::config::site::compile_site;
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::{Matcher, PatternError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid site definition: {0}")]
    Site(#[from] PatternError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<WaypointConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::debug!(path = %path.display(), has_site = config.site.is_some(), "Configuration loaded");
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<WaypointConfig, ConfigError> {
    let mut config: WaypointConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;
    config.compiled_site = match &config.site {
        Some(def) => Some(compile_site(def)?),
        None => None,
    };

    Ok(config)
}

impl WaypointConfig {
    /// The matcher tree for the `[site]` table, if present.
    ///
    /// Configs from [`parse_config`] hand out the tree compiled at load time;
    /// a `site` set by hand afterwards is compiled on demand.
    pub fn site_tree(&self) -> Result<Option<Matcher>, ConfigError> {
        if let Some(tree) = &self.compiled_site {
            return Ok(Some(tree.clone()));
        }
        match &self.site {
            Some(def) => Ok(Some(compile_site(def)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_site_tree_reuses_compiled_tree() {
        let config = parse_config("[site]\ntype = \"page\"\ntitle = \"Home\"\n").unwrap();

        let first = config.site_tree().unwrap().unwrap();
        let second = config.site_tree().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_site_tree_compiles_hand_built_site() {
        let mut config = parse_config("").unwrap();
        assert!(config.site_tree().unwrap().is_none());

        config.site = parse_config("[site]\ntype = \"page\"\n").unwrap().site;
        assert!(config.site_tree().unwrap().is_some());
    }
}
