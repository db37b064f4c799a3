//! Error types for code generation.

use automap_schema::ValidationReport;
use thiserror::Error;

/// Error type for code generation operations.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Schema parsing error.
    #[error("schema parse error: {0}")]
    Parse(#[from] automap_schema::ParseError),

    /// Schema lookup error.
    #[error("schema error: {0}")]
    Schema(#[from] automap_schema::SchemaError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Validation found errors; no code is generated.
    #[error("schema validation failed with {errors} error(s)")]
    Validation {
        /// Number of error diagnostics.
        errors: usize,
        /// Full validation report.
        report: Box<ValidationReport>,
    },

    /// Code generation error.
    #[error("generation error: {message}")]
    Generation {
        /// Error message.
        message: String,
    },
}

impl CodegenError {
    /// Creates a generation error with the given message.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates a validation error from a report containing errors.
    #[must_use]
    pub fn validation(report: ValidationReport) -> Self {
        Self::Validation {
            errors: report.stats.errors,
            report: Box::new(report),
        }
    }

    /// Returns the validation report if this is a validation failure.
    #[must_use]
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation { report, .. } => Some(report),
            _ => None,
        }
    }
}
