//! Organizer configuration.
//!
//! Configuration is stored in TOML. Every key is optional:
//!
//! ```toml
//! [data]
//! side_keyword = "sideview"
//! ventral_keyword = "ventralview"
//! csv_extension = ".csv"
//! video_extension = ".mp4"
//!
//! [structure]
//! separators = ["_"]
//!
//! [[structure.fields]]
//! name = "Group"
//! description = "Experimental group"
//! role = "group"
//!
//! [regex]
//! open = "("
//! close = ")"
//! struct_sep = ":"
//!
//! [output]
//! side_folder_name = "side_view_analysis"
//! ventral_folder_name = "ventral_view_analysis"
//! video_folder_name = "Video"
//! default_group_name = "Batch"
//!
//! [constraints]
//! require_ventral = false
//! require_video = false
//! ```

use crate::association::AssociationPolicy;
use crate::field::{FieldSet, FieldSetError, FieldSpec};
use crate::file_organizer::OutputLayout;
use crate::regex_capture::RegexDelimiters;
use crate::scanner::DataParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax, structure or value.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
    #[error("invalid field list: {0}")]
    InvalidFields(#[from] FieldSetError),
}

/// Complete organizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub data: DataParams,
    pub structure: StructureConfig,
    pub regex: RegexDelimiters,
    pub output: OutputLayout,
    pub constraints: Constraints,
}

/// How filenames are split and which fields they carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub separators: Vec<String>,
    /// Ordered field list.
    pub fields: Vec<FieldSpec>,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            separators: vec!["_".to_string()],
            fields: FieldSet::default().iter().cloned().collect(),
        }
    }
}

/// Partners a side file must have to be organized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub require_ventral: bool,
    pub require_video: bool,
}

impl OrganizerConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.runfilerrc.toml` in the current directory
    /// 3. Look for `~/.config/runfiler/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if the loaded file is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".runfilerrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("runfiler")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.structure.separators.iter().all(String::is_empty) {
            return Err(ConfigError::ConfigInvalid(
                "at least one non-empty separator is required".to_string(),
            ));
        }
        if self.regex.open.is_empty()
            || self.regex.close.is_empty()
            || self.regex.struct_sep.is_empty()
        {
            return Err(ConfigError::ConfigInvalid(
                "regex field delimiters and structure separator must not be empty".to_string(),
            ));
        }
        if self.data.csv_extension.is_empty() || self.data.video_extension.is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "file extensions must not be empty".to_string(),
            ));
        }
        self.fields()?;
        Ok(())
    }

    /// The validated field set.
    pub fn fields(&self) -> Result<FieldSet, ConfigError> {
        Ok(FieldSet::new(self.structure.fields.clone())?)
    }

    /// Association rules from the data keywords and constraints.
    pub fn policy(&self) -> AssociationPolicy {
        AssociationPolicy {
            require_ventral: self.constraints.require_ventral,
            require_video: self.constraints.require_video,
            side_keyword: self.data.side_keyword.clone(),
            ventral_keyword: self.data.ventral_keyword.clone(),
        }
    }
}
