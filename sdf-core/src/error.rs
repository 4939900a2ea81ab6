//! Error types for SDF operations

use crate::layout::EntityKind;
use crate::types::ScalarType;
use thiserror::Error;

/// Result type for SDF operations
pub type Result<T> = std::result::Result<T, SdfError>;

/// Errors that can occur while building, reading, or writing SDF streams
#[derive(Error, Debug)]
pub enum SdfError {
    /// Underlying byte source or sink failed; fatal for the stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header clause; fatal on open
    #[error("header syntax error at line {line}: {message}")]
    HeaderSyntax { line: u64, message: String },

    /// Declared type does not match the access type
    #[error("type mismatch for {kind} {name:?}: declared {declared}, accessed as {requested}")]
    TypeMismatch {
        kind: EntityKind,
        name: String,
        declared: ScalarType,
        requested: ScalarType,
    },

    /// Entity name not found in the layout
    #[error("no {kind} named {name:?}")]
    NameUnknown { kind: EntityKind, name: String },

    /// Attempt to redefine or transfer a name with an incompatible type
    #[error("conflicting definition for {kind} {name:?}")]
    DefinitionConflict { kind: EntityKind, name: String },

    /// Page ended unexpectedly mid-row; recoverable if the caller opts in
    #[error("page data truncated: {0}")]
    DataTruncated(String),

    /// Soft truncation by the process-wide row limit
    #[error("row limit of {limit} hit; page truncated")]
    RowLimitHit { limit: u64 },

    /// Conversion would drop precision or overflow
    #[error("numeric conversion from {from} to {to} loses information for {value}")]
    NumericLoss {
        from: ScalarType,
        to: ScalarType,
        value: String,
    },

    /// Name rejected by the active validity rules
    #[error("invalid {kind} name {name:?}")]
    InvalidName { kind: EntityKind, name: String },

    /// Clean end of the input stream
    #[error("end of stream")]
    EndOfStream,

    /// Operation not valid for the stream's current state or mode
    #[error("{0}")]
    Usage(String),
}

impl SdfError {
    /// Short stable tag used by the diagnostic queue
    pub fn tag(&self) -> &'static str {
        match self {
            SdfError::Io(_) => "IO_ERROR",
            SdfError::HeaderSyntax { .. } => "HEADER_SYNTAX",
            SdfError::TypeMismatch { .. } => "TYPE_MISMATCH",
            SdfError::NameUnknown { .. } => "NAME_UNKNOWN",
            SdfError::DefinitionConflict { .. } => "DEFINITION_CONFLICT",
            SdfError::DataTruncated(_) => "DATA_TRUNCATED",
            SdfError::RowLimitHit { .. } => "ROW_LIMIT_HIT",
            SdfError::NumericLoss { .. } => "NUMERIC_LOSS",
            SdfError::InvalidName { .. } => "INVALID_NAME",
            SdfError::EndOfStream => "END_OF_STREAM",
            SdfError::Usage(_) => "USAGE",
        }
    }

    /// Create a usage error with a message
    pub fn usage(msg: impl Into<String>) -> Self {
        SdfError::Usage(msg.into())
    }

    /// Create a truncation error with a message
    pub fn truncated(msg: impl Into<String>) -> Self {
        SdfError::DataTruncated(msg.into())
    }
}
