use thiserror::Error;

/// Errors raised by record store operations.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// A required field is missing. Raised before the store is invoked.
    #[error("Invalid record: {0}")]
    Validation(String),

    #[error("Record {0} not found")]
    NotFound(i64),

    #[error("Unknown choice category: {0}")]
    UnknownCategory(String),

    /// Storage unavailable, constraint violation or disk fault.
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl RecordStoreError {
    pub fn is_persistence(&self) -> bool {
        matches!(self, RecordStoreError::Persistence(_))
    }
}
