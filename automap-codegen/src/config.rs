//! Generator configuration.
//!
//! Loaded from an optional `automap.json` file next to the schema. Every key
//! has a default, so an absent file or an empty object is a valid config.

use crate::error::CodegenError;
use automap_schema::{NamingPolicy, Schema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "automap.json";

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Output path (default: "automappers.rs"), relative to the schema
    /// directory when not absolute.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Naming policy override; the schema's own policy applies when unset.
    #[serde(default)]
    pub field_name_transform: Option<NamingPolicy>,

    /// Emit `register_converters` (default: true).
    #[serde(default = "default_true")]
    pub generate_init: bool,

    /// Enforce the zero-error validation gate (default: true).
    #[serde(default = "default_true")]
    pub validate: bool,

    /// First comment line of the generated file.
    #[serde(default = "default_header")]
    pub header: String,
}

fn default_output() -> PathBuf {
    PathBuf::from("automappers.rs")
}

fn default_true() -> bool {
    true
}

fn default_header() -> String {
    "Code generated by automap-gen. DO NOT EDIT.".to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            field_name_transform: None,
            generate_init: true,
            validate: true,
            header: default_header(),
        }
    }
}

impl GeneratorConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output path.
    #[must_use]
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Overrides the schema's naming policy.
    #[must_use]
    pub fn field_name_transform(mut self, policy: NamingPolicy) -> Self {
        self.field_name_transform = Some(policy);
        self
    }

    /// Enables or disables `register_converters` emission.
    #[must_use]
    pub fn generate_init(mut self, enabled: bool) -> Self {
        self.generate_init = enabled;
        self
    }

    /// Enables or disables the validation gate.
    #[must_use]
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Sets the header comment.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Parses a config from JSON text.
    ///
    /// # Errors
    /// Returns `CodegenError::Config` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, CodegenError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config file.
    ///
    /// # Errors
    /// Returns `CodegenError::Io` if the file cannot be read and
    /// `CodegenError::Config` if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodegenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads a config file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, CodegenError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Returns the naming policy to use for `schema`.
    #[must_use]
    pub fn naming_policy(&self, schema: &Schema) -> NamingPolicy {
        self.field_name_transform.unwrap_or(schema.naming_policy)
    }

    /// Resolves the output path against the schema directory.
    #[must_use]
    pub fn output_path(&self, schema_dir: &Path) -> PathBuf {
        if self.output.is_absolute() {
            self.output.clone()
        } else {
            schema_dir.join(&self.output)
        }
    }
}
