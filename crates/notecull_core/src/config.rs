//! Engine configuration loaded from TOML.
//!
//! # Invariants
//! - A missing config file yields defaults; a present but broken one is an error.
//! - Paths in a validated config are absolute.

use crate::model::item::ItemType;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Type targeted by delete, wipe and get when the caller names none.
    pub item_type: ItemType,
    /// Submit batches concurrently and sum their counts.
    pub parallel_submit: bool,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// Snapshot cache stays off when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            item_type: ItemType::note(),
            parallel_submit: true,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            snapshot_path: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl EngineConfig {
    /// Loads and validates the config at `path`, defaulting when it is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.item_type.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("item_type cannot be empty".to_string()));
        }
        for (name, path) in [
            ("log_dir", self.log_dir.as_ref()),
            ("snapshot_path", self.snapshot_path.as_ref()),
        ] {
            if let Some(path) = path {
                if !path.is_absolute() {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be an absolute path, got `{}`",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}
