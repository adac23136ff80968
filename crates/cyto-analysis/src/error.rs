//! Error types for the cytometry analysis pipeline.
//!
//! Every failure the filters, the pipeline composer, the clustering engine or
//! the statistics layer can produce is a variant of [`CytometryError`].
//! Errors are serializable as `{ code, message }` so that a frontend can
//! branch on the stable code without parsing messages.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the analysis pipeline.
#[derive(Error, Debug)]
pub enum CytometryError {
    /// A channel required by an operation is absent from the event table.
    #[error("Channel '{0}' not found in event table")]
    MissingColumn(String),

    /// A method name could not be parsed into a known variant.
    #[error("Unsupported {kind} method '{method}' (supported: {supported})")]
    UnsupportedMethod {
        kind: &'static str,
        method: String,
        supported: &'static str,
    },

    /// Requested cluster count is zero or exceeds the number of events.
    #[error("Invalid cluster count {requested}: must be between 1 and {rows}")]
    InvalidClusterCount { requested: usize, rows: usize },

    /// The operation needs at least one event.
    #[error("Event table is empty")]
    EmptyInput,

    /// A channel has zero dispersion and cannot be rescaled.
    #[error("Channel '{column}' has zero {measure}; cannot normalize")]
    DegenerateColumn {
        column: String,
        measure: &'static str,
    },

    /// Cluster labels do not line up with the rows of the event table.
    #[error("Cluster assignment has {labels} labels but the event table has {rows} rows")]
    AssignmentMismatch { labels: usize, rows: usize },

    /// No numeric channel was available to operate on.
    #[error("Event table has no numeric channels")]
    NoNumericChannels,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pipeline step failed. The original error is kept as the source.
    #[error("Pipeline step {index} ({step}) failed: {source}")]
    StepFailed {
        index: usize,
        step: String,
        #[source]
        source: Box<CytometryError>,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CytometryError>,
    },
}

impl CytometryError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CytometryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code. Wrapping variants report the code of the error they wrap.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
            Self::InvalidClusterCount { .. } => "INVALID_CLUSTER_COUNT",
            Self::EmptyInput => "EMPTY_INPUT",
            Self::DegenerateColumn { .. } => "DEGENERATE_COLUMN",
            Self::AssignmentMismatch { .. } => "ASSIGNMENT_MISMATCH",
            Self::NoNumericChannels => "NO_NUMERIC_CHANNELS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::StepFailed { source, .. } => source.error_code(),
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, looking through step and context wrappers.
    pub fn root_cause(&self) -> &CytometryError {
        match self {
            Self::StepFailed { source, .. } | Self::WithContext { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Index and name of the pipeline step that failed, if any.
    pub fn failed_step(&self) -> Option<(usize, &str)> {
        match self {
            Self::StepFailed { index, step, .. } => Some((*index, step.as_str())),
            Self::WithContext { source, .. } => source.failed_step(),
            _ => None,
        }
    }

    /// Check if the root cause is a missing channel.
    pub fn is_missing_column(&self) -> bool {
        matches!(self.root_cause(), Self::MissingColumn(_))
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for CytometryError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CytometryError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, CytometryError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CytometryError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(CytometryError::EmptyInput.error_code(), "EMPTY_INPUT");
        assert_eq!(
            CytometryError::MissingColumn("Viability".to_string()).error_code(),
            "MISSING_COLUMN"
        );
    }

    #[test]
    fn test_step_failed_preserves_kind() {
        let error = CytometryError::StepFailed {
            index: 1,
            step: "dead_cell_removal".to_string(),
            source: Box::new(CytometryError::MissingColumn("Viability".to_string())),
        };

        assert_eq!(error.error_code(), "MISSING_COLUMN");
        assert!(error.is_missing_column());
        assert_eq!(error.failed_step(), Some((1, "dead_cell_removal")));
        assert!(matches!(
            error.root_cause(),
            CytometryError::MissingColumn(name) if name == "Viability"
        ));
    }

    #[test]
    fn test_error_serialization() {
        let error = CytometryError::MissingColumn("FSC-H".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("MISSING_COLUMN"));
        assert!(json.contains("FSC-H"));
    }

    #[test]
    fn test_with_context() {
        let error = CytometryError::EmptyInput.with_context("During clustering");
        assert!(error.to_string().contains("During clustering"));
        assert_eq!(error.error_code(), "EMPTY_INPUT");
        assert!(error.failed_step().is_none());
    }
}
