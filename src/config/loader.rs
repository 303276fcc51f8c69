//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {0:?} is empty")]
    Empty(PathBuf),

    #[error("unsupported config format {0:?} (expected .toml, .yml or .yaml)")]
    UnsupportedFormat(PathBuf),

    #[error("parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("yml") | Some("yaml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Load, default and validate configuration from a TOML or YAML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let format =
        ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.into()))?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    if content.trim().is_empty() {
        return Err(ConfigError::Empty(path.into()));
    }

    parse_config(&content, format)
}

/// Parse configuration text, apply server defaults and validate.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };
    config.server = config.server.with_defaults();

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
