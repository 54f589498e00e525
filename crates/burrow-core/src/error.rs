use thiserror::Error;

/// Errors raised while constructing core values.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
}

/// Errors reported by key-value store adapters.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The key is already claimed. This is the only "conflict" outcome of a
    /// conditional write.
    #[error("key already exists: {0}")]
    AlreadyExists(String),
    #[error("storage permission denied: {0}")]
    PermissionDenied(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Whether the operation may succeed if retried against the same key.
    ///
    /// Permission failures are never transient, and neither is a conflict.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Timeout(_) | StorageError::Query(_)
        )
    }
}

/// Terminal failures of a single allocation.
#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("collision retry budget exhausted after {attempts} attempts")]
    CollisionRetryExhausted { attempts: u32 },
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("storage backend denied access: {0}")]
    BackendPermissionDenied(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("identifier generator failed: {0}")]
    Generator(String),
    #[error("allocation cancelled")]
    Cancelled,
}

impl From<StorageError> for AllocationError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::PermissionDenied(message) => Self::BackendPermissionDenied(message),
            StorageError::Unavailable(message)
            | StorageError::Timeout(message)
            | StorageError::Query(message) => Self::BackendUnavailable(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<CoreError> for AllocationError {
    fn from(value: CoreError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}
