use thiserror::Error;

use crate::schema::SqlValueType;

/// Canonical result shared by every row reader stage.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// End-of-stream sentinel. Not a failure; marks normal completion.
    #[error("no more rows")]
    NoMoreRows,

    #[error("context canceled")]
    Cancelled,

    #[error("invalid condition: expected '{expected}', but '{found}' was provided")]
    InvalidConditionResult {
        expected: SqlValueType,
        found: SqlValueType,
    },

    /// Any predicate binding or evaluation failure, tagged with its origin.
    #[error("{source}: while evaluating filter condition")]
    FilterCondition {
        #[source]
        source: Box<Error>,
    },

    #[error("column does not exist: {0}")]
    ColumnNotFound(String),

    #[error("parameter not specified: {0}")]
    ParamNotFound(String),

    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch {
        expected: SqlValueType,
        found: SqlValueType,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failures raised by an upstream stage that has no better variant.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn filter_condition(source: Error) -> Self {
        Error::FilterCondition {
            source: Box::new(source),
        }
    }

    pub fn is_no_more_rows(&self) -> bool {
        matches!(self, Error::NoMoreRows)
    }

    /// The error with any filter-condition wrapping removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::FilterCondition { source } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
