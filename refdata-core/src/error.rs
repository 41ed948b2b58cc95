//! Structured error types for reference-data operations.
//!
//! Every variant is displayable in CLI output. Hard failures travel as `Err`;
//! an empty universe is the one degenerate-but-valid case and is attached to
//! a [`QueryOutcome`](crate::service::QueryOutcome) as a warning instead.

use thiserror::Error;

/// Errors produced while fetching, coercing, aligning or caching data.
#[derive(Debug, Error)]
pub enum RefDataError {
    /// A required date/value field of a raw record could not be parsed.
    #[error("malformed record in '{view}' (row {row}): field '{field}' has unparseable value {value}")]
    MalformedRecord {
        view: String,
        row: usize,
        field: String,
        value: String,
    },

    /// A field could not be cast to its required numeric/categorical type.
    #[error("type coercion failed in '{view}' (row {row}): field '{field}' expected {expected}, got {value}")]
    TypeCoercion {
        view: String,
        row: usize,
        field: String,
        expected: &'static str,
        value: String,
    },

    /// The raw fetch returned zero rows.
    #[error("empty universe: '{view}' returned no rows")]
    EmptyUniverse { view: String },

    /// Non-success status surfaced verbatim from the fetch layer.
    #[error("upstream query failed: {code},{message}")]
    UpstreamQuery { code: String, message: String },

    #[error("invalid date '{0}': expected YYYYMMDD or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("record source error: {0}")]
    Source(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("dataframe error: {0}")]
    Frame(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),
}

impl RefDataError {
    /// True for the degenerate empty-result case, which callers may treat as a warning.
    pub fn is_empty_universe(&self) -> bool {
        matches!(self, RefDataError::EmptyUniverse { .. })
    }
}

pub type Result<T> = std::result::Result<T, RefDataError>;
