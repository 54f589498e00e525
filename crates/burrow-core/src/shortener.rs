use crate::error::AllocationError;
use crate::mapping::Metadata;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, AllocationError>;

/// A request to shorten a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenRequest {
    /// The long URL to redirect to. Must not be empty.
    pub target: String,
    /// Opaque attributes stored with the mapping.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ShortenRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The outcome of a successful shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_code: String,
    pub target: String,
    pub created_at: Timestamp,
    /// The public short URL, when the service knows its public base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Allocates a fresh short code for the request target and persists its
    /// mapping.
    async fn shorten(&self, request: ShortenRequest) -> Result<ShortenResponse>;
}
