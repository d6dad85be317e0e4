//! Shared error type across emfbuf crates.

use thiserror::Error;

/// Stable error codes (used in logs and test vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing namespace/service at setup time.
    Configuration,
    /// Buffer state violates a record invariant.
    SchemaValidation,
    /// The output sink failed to write a record.
    Emission,
}

impl ErrorKind {
    /// String representation used in logs and vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::SchemaValidation => "SCHEMA_VALIDATION_ERROR",
            ErrorKind::Emission => "EMISSION_ERROR",
        }
    }
}

/// Which record invariant a buffer broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("must contain at least one metric")]
    NoMetrics,
    #[error("namespace must be set when metrics exist")]
    MissingNamespace,
    #[error("must contain at least one dimension")]
    TooFewDimensions,
    #[error("maximum number of dimensions exceeded ({count} > {max})")]
    TooManyDimensions { count: usize, max: usize },
    #[error("maximum number of metrics exceeded ({count} > {max})")]
    TooManyMetrics { count: usize, max: usize },
    #[error("metric {metric}: maximum number of values exceeded ({count} > {max})")]
    TooManyValues { metric: String, count: usize, max: usize },
    #[error("metric {metric}: unsupported unit {unit:?}")]
    UnsupportedUnit { metric: String, unit: String },
    #[error("invalid metric name {name:?} (expected 1..=255 characters)")]
    InvalidMetricName { name: String },
    #[error("metric {metric}: values must be finite numbers")]
    NonFiniteValue { metric: String },
    #[error("metric {metric}: added with conflicting storage resolutions")]
    ConflictingResolution { metric: String },
    #[error("top-level key {key:?} is used more than once")]
    KeyCollision { key: String },
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, EmfError>;

/// Unified error type used by core and lambda crates.
#[derive(Debug, Error)]
pub enum EmfError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaViolation),
    #[error("emission failed: {0}")]
    Emission(String),
}

impl EmfError {
    /// Map an error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmfError::Configuration(_) => ErrorKind::Configuration,
            EmfError::SchemaValidation(_) => ErrorKind::SchemaValidation,
            EmfError::Emission(_) => ErrorKind::Emission,
        }
    }

    /// The violated invariant, for schema validation failures.
    pub fn violation(&self) -> Option<&SchemaViolation> {
        match self {
            EmfError::SchemaValidation(v) => Some(v),
            _ => None,
        }
    }

    /// True only for the "no metrics in the buffer" validation failure.
    pub fn is_empty_metrics(&self) -> bool {
        matches!(self, EmfError::SchemaValidation(SchemaViolation::NoMetrics))
    }
}

impl From<std::io::Error> for EmfError {
    fn from(e: std::io::Error) -> Self {
        EmfError::Emission(e.to_string())
    }
}
