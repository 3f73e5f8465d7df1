use thiserror::Error;

/// MongoDB error codes the engine reports.
pub mod codes {
    pub const BAD_VALUE: i32 = 2;
    pub const FAILED_TO_PARSE: i32 = 9;
    pub const TYPE_MISMATCH: i32 = 14;
    pub const PATH_NOT_VIABLE: i32 = 28;
    pub const CONFLICTING_UPDATE_OPERATORS: i32 = 40;
    pub const MAX_TIME_EXPIRED: i32 = 50;
    pub const DOLLAR_PREFIXED_FIELD_NAME: i32 = 52;
    pub const EMPTY_FIELD_NAME: i32 = 56;
    pub const DOTTED_FIELD_NAME: i32 = 57;
    pub const IMMUTABLE_FIELD: i32 = 66;
    pub const DUPLICATE_KEY: i32 = 11000;
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Malformed query, update, projection or sort specification.
    #[error("{message} (code {code})")]
    OperationFailure { code: i32, message: String },

    /// Data-dependent failure while applying an update to one document.
    #[error("write error: {message} (code {code})")]
    WriteError { code: i32, message: String },

    #[error("E11000 duplicate key error collection: {namespace} dup key: {{ _id: {key} }}")]
    DuplicateKey { namespace: String, key: String },

    /// A batch stopped at `index`; everything before it was applied.
    #[error("bulk write error at index {index} (inserted {n_inserted}, modified {n_modified}): {source}")]
    BulkWrite {
        n_inserted: u64,
        n_modified: u64,
        index: usize,
        #[source]
        source: Box<DbError>,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("operation exceeded time limit")]
    ExecutionTimeout,
}

impl DbError {
    pub(crate) fn failure(code: i32, message: impl Into<String>) -> Self {
        Self::OperationFailure { code, message: message.into() }
    }

    pub(crate) fn bad_value(message: impl Into<String>) -> Self {
        Self::failure(codes::BAD_VALUE, message)
    }

    pub(crate) fn write(code: i32, message: impl Into<String>) -> Self {
        Self::WriteError { code, message: message.into() }
    }

    /// The MongoDB error code, when the error carries one.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::OperationFailure { code, .. } | Self::WriteError { code, .. } => Some(*code),
            Self::DuplicateKey { .. } => Some(codes::DUPLICATE_KEY),
            Self::ExecutionTimeout => Some(codes::MAX_TIME_EXPIRED),
            Self::BulkWrite { source, .. } => source.code(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
