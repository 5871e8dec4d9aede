use thiserror::Error;

/// Errors raised while building or mutating a [`Schema`](crate::schema::Schema).
///
/// These are configuration errors: they surface at schema setup time, never
/// in the middle of normalizing a document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("max_length {max_length} is shorter than the {tag_length} character collision tag")]
    MaxLengthTooShort { max_length: usize, tag_length: usize },

    #[error("max_length {max_length} is shorter than the reserved column '{column}'")]
    MaxLengthBelowReserved { max_length: usize, column: &'static str },

    #[error("collision probability must be in (0, 1), got {0}")]
    InvalidCollisionProb(f64),

    #[error("invalid simple regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("table '{table}' references parent '{parent}' which is not in the schema")]
    ParentTableNotFound { table: String, parent: String },

    #[error("failed to read schema config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse schema config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a normalization call.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The item could not be represented as a JSON value. The whole document
    /// is rejected, no rows are produced for it.
    #[error("item for table '{table}' cannot be represented: {source}")]
    UnrepresentableItem {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}
