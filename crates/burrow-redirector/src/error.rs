use burrow_core::{CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedirectorError>;

#[derive(Debug, Error)]
pub enum RedirectorError {
    #[error("short code is malformed: {0}")]
    InvalidShortCode(
        #[from]
        #[source]
        CoreError,
    ),
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}
