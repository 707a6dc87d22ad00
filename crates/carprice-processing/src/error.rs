//! Error types for the price pipeline.
//!
//! All failures are request-scoped: a failing record never affects other
//! records in the same batch. Each variant carries enough context (kind plus
//! offending field) for a serving shell to build a user-facing message.
//!
//! Errors serialize as `{ "code": ..., "message": ... }` so they can be handed
//! to a frontend or written into a JSON response unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the price pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A scalar field could not be coerced to its numeric type.
    ///
    /// Levy never produces this (it falls back to 0); engine volume, mileage,
    /// production year and age surface it once an undefined value reaches a
    /// stage that needs a number.
    #[error("Could not parse field '{field}' as a number (value: {value})")]
    Parse { field: String, value: String },

    /// A categorical value is absent from the fitted vocabulary.
    #[error("Unknown category '{value}' for field '{field}'")]
    UnknownCategory { field: String, value: String },

    /// The transformed record does not match the model's column set or order.
    #[error("Feature schema mismatch: expected {expected:?}, got {got:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// An encoder was asked to handle a field it was never fitted on.
    #[error("Encoding failed for field '{field}': {reason}")]
    Encoding { field: String, reason: String },

    /// The raw record failed boundary validation.
    #[error("Invalid record field '{field}': {reason}")]
    InvalidRecord { field: String, reason: String },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fitting was attempted without any usable data.
    #[error("No data to fit: {0}")]
    EmptyData(String),

    /// An artifact file could not be loaded or is inconsistent.
    #[error("Failed to load artifact '{name}': {reason}")]
    ArtifactLoad { name: String, reason: String },

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
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn parse(field: impl Into<String>, value: impl ToString) -> Self {
        PipelineError::Parse {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub(crate) fn unknown_category(field: impl Into<String>, value: impl Into<String>) -> Self {
        PipelineError::UnknownCategory {
            field: field.into(),
            value: value.into(),
        }
    }

    pub(crate) fn encoding(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Encoding {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_record(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::InvalidRecord {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for shell-side handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::Encoding { .. } => "ENCODING_ERROR",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::EmptyData(_) => "EMPTY_DATA",
            Self::ArtifactLoad { .. } => "ARTIFACT_LOAD_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// The offending field, for errors tied to one field of a record.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Parse { field, .. }
            | Self::UnknownCategory { field, .. }
            | Self::Encoding { field, .. }
            | Self::InvalidRecord { field, .. } => Some(field),
            Self::ColumnNotFound(column) => Some(column),
            Self::WithContext { source, .. } => source.field(),
            _ => None,
        }
    }

    /// Check if this error rejects the request itself rather than signalling
    /// a broken deployment (bad artifacts, IO, schema drift).
    pub fn is_request_error(&self) -> bool {
        match self {
            Self::Parse { .. }
            | Self::UnknownCategory { .. }
            | Self::InvalidRecord { .. } => true,
            Self::WithContext { source, .. } => source.is_request_error(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let field = self.field();
        let len = if field.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("PipelineError", len)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(field) = field {
            state.serialize_field("field", field)?;
        }
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

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
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
