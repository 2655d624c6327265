//! TOML configuration for the CLI.
//!
//! # Responsibility
//! - Load the database location, logging settings and dimension definitions.
//! - Turn dimension definitions into a validated [`DimensionSpace`].
//!
//! # Invariants
//! - A missing config file is not an error; defaults apply.
//! - Unknown keys are rejected so typos surface early.

use crate::dimension::{Dimension, DimensionConfigError, DimensionPreset, DimensionSpace};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "taxonomy.toml";
pub const DEFAULT_DATABASE_FILE: &str = "taxonomy.sqlite3";

/// Errors from reading or interpreting a config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Dimensions(DimensionConfigError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Dimensions(err) => write!(f, "invalid dimension config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Dimensions(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<DimensionConfigError> for ConfigError {
    fn from(value: DimensionConfigError) -> Self {
        Self::Dimensions(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// File logging stays off while this is unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    pub value: String,
    #[serde(default)]
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionConfig {
    pub name: String,
    #[serde(rename = "default")]
    pub default_value: String,
    pub presets: Vec<PresetConfig>,
}

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxonomyConfig {
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
}

impl TaxonomyConfig {
    /// Reads `path`; a file that does not exist yields [`TaxonomyConfig::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE))
    }

    pub fn dimension_space(&self) -> Result<DimensionSpace, ConfigError> {
        let dimensions = self
            .dimensions
            .iter()
            .map(|dimension| Dimension {
                name: dimension.name.clone(),
                default_value: dimension.default_value.clone(),
                presets: dimension
                    .presets
                    .iter()
                    .map(|preset| DimensionPreset::new(&preset.value, &preset.fallback))
                    .collect(),
            })
            .collect();
        Ok(DimensionSpace::new(dimensions)?)
    }
}
