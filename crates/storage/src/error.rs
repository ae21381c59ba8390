/// All errors that can be returned by a RuleStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The rule-base document could not be decoded.
    #[error("invalid rule-base document: {0}")]
    InvalidDocument(String),

    /// Two records of the same collection share an id.
    #[error("duplicate {collection} record: {id}")]
    DuplicateRecord { collection: &'static str, id: String },

    /// The backend cannot be reached (connection refused, pool exhausted, ...).
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (query failure, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::InvalidDocument(e.to_string())
    }
}
