//! Custom error types for the ETL pipeline.
//!
//! Only I/O boundaries (loading the source, writing a sink) and invalid
//! configuration produce errors. Per-cell data anomalies are absorbed by the
//! cleaning and enrichment stages and never surface here.
//!
//! Errors serialize as `{code, message}` so a run result can be emitted as
//! JSON even when it failed.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the ETL pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// The source path does not resolve to a file.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The source exists but could not be read as a table (unparseable file,
    /// missing sheet, no header row).
    #[error("Failed to read '{}' as a table: {reason}", source_path.display())]
    SourceFormatError { source_path: PathBuf, reason: String },

    /// Writing one output target failed. Other targets are unaffected.
    #[error("Failed to write '{}': {reason}", target.display())]
    SinkWriteError { target: PathBuf, reason: String },

    /// Two columns would end up with the same canonical name.
    #[error("Cannot rename '{source_column}' to '{target_column}': column already exists")]
    RenameConflict {
        source_column: String,
        target_column: String,
    },

    /// A transform stage failed for a reason other than data quality.
    #[error("Transform failed: {0}")]
    TransformFailed(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EtlError {
    /// Build a [`EtlError::SourceFormatError`] for `path`.
    pub fn source_format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EtlError::SourceFormatError {
            source_path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`EtlError::SinkWriteError`] for `target`.
    pub fn sink_write(target: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EtlError::SinkWriteError {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::SourceFormatError { .. } => "SOURCE_FORMAT_ERROR",
            Self::SinkWriteError { .. } => "SINK_WRITE_ERROR",
            Self::RenameConflict { .. } => "RENAME_CONFLICT",
            Self::TransformFailed(_) => "TRANSFORM_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// The output target this error is scoped to, if any.
    pub fn failed_target(&self) -> Option<&PathBuf> {
        match self {
            Self::SinkWriteError { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl From<crate::config::ConfigValidationError> for EtlError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        EtlError::InvalidConfig(err.to_string())
    }
}

impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            EtlError::SourceNotFound(PathBuf::from("x.xlsx")).error_code(),
            "SOURCE_NOT_FOUND"
        );
        assert_eq!(
            EtlError::sink_write("out.csv", "disk full").error_code(),
            "SINK_WRITE_ERROR"
        );
    }

    #[test]
    fn test_sink_error_names_target() {
        let error = EtlError::sink_write("out/result.csv", "permission denied");
        let message = error.to_string();
        assert!(message.contains("out/result.csv"));
        assert!(message.contains("permission denied"));
        assert_eq!(
            error.failed_target(),
            Some(&PathBuf::from("out/result.csv"))
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = EtlError::source_format("sales.xlsx", "sheet 'Sheet9' not found");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("SOURCE_FORMAT_ERROR"));
        assert!(json.contains("Sheet9"));
    }

    #[test]
    fn test_invalid_config_from_validation_error() {
        let error = EtlError::from(crate::config::ConfigValidationError::EmptySheetName);
        assert_eq!(error.error_code(), "INVALID_CONFIG");
        assert!(error.failed_target().is_none());
    }
}
