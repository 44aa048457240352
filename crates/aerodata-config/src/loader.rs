//! Configuration loading.
//!
//! Every supported format is first parsed into a `serde_json::Value`, then
//! `{env:VAR}` references are resolved, and only then is the tree
//! deserialized into [`AeroDataConfig`]. An environment reference that makes
//! up a whole string value may expand to a number or boolean:
//!
//! ```toml
//! [execution.retry]
//! max_attempts = "{env:AERODATA_RETRY_ATTEMPTS}"
//! ```

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::AeroDataConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid for its format
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        /// Format that was being parsed
        format: ConfigFormat,
        /// Parser message
        message: String,
    },

    /// The file extension maps to no known format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A `{env:VAR}` reference names an unset variable
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// A value is outside the range the engine accepts
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
    /// JSON (`.json`)
    Json,
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Yaml => write!(f, "YAML"),
            ConfigFormat::Toml => write!(f, "TOML"),
            ConfigFormat::Json => write!(f, "JSON"),
        }
    }
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse content in this format into a JSON tree.
    pub fn parse_value(self, content: &str) -> Result<Value, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            format: self,
            message,
        };
        match self {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
            #[cfg(feature = "toml")]
            ConfigFormat::Toml => {
                let value: toml::Value =
                    toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
                serde_json::to_value(value).map_err(|e| parse_err(e.to_string()))
            }
            #[cfg(feature = "yaml")]
            ConfigFormat::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
                serde_json::to_value(value).map_err(|e| parse_err(e.to_string()))
            }
            #[allow(unreachable_patterns)]
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Loads [`AeroDataConfig`] from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a config file; the format follows the extension.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<AeroDataConfig, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_str(&content, format)?;
        info!("Loaded {} config from {}", format, path.display());
        Ok(config)
    }

    /// Parse, resolve environment references, and validate.
    pub fn from_str(content: &str, format: ConfigFormat) -> Result<AeroDataConfig, ConfigError> {
        Self::from_str_with_env(content, format, |name| std::env::var(name).ok())
    }

    /// Like [`ConfigLoader::from_str`] with an explicit variable lookup.
    pub fn from_str_with_env(
        content: &str,
        format: ConfigFormat,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AeroDataConfig, ConfigError> {
        let mut value = format.parse_value(content)?;
        // An empty YAML document parses as null
        if value.is_null() {
            value = Value::Object(Default::default());
        }
        resolve_env_refs(&mut value, &lookup)?;
        let config: AeroDataConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                format,
                message: e.to_string(),
            })?;
        config.validate()?;
        debug!(?config, "Parsed configuration");
        Ok(config)
    }
}

fn extract_env_var(s: &str) -> Option<&str> {
    s.trim()
        .strip_prefix("{env:")
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
}

fn resolve_env_refs(
    value: &mut Value,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    match value {
        Value::String(s) => {
            let resolved = match extract_env_var(s) {
                Some(var) => {
                    lookup(var).ok_or_else(|| ConfigError::EnvVarNotFound(var.to_string()))?
                }
                None => return Ok(()),
            };
            *value = match serde_json::from_str::<Value>(&resolved) {
                Ok(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar,
                _ => Value::String(resolved),
            };
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(|v| resolve_env_refs(v, lookup)),
        Value::Object(map) => map
            .values_mut()
            .try_for_each(|v| resolve_env_refs(v, lookup)),
        _ => Ok(()),
    }
}
