use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Backend-specific attributes carried alongside a mapping, such as a
/// content type or redirect semantics. Opaque to the allocator.
pub type Metadata = BTreeMap<String, String>;

/// A persisted association between a short code and its redirect target.
///
/// A mapping is written exactly once, together with the claim of its key,
/// and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// The long URL clients are redirected to. Not validated.
    pub target: String,
    /// When the mapping was created.
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Mapping {
    /// Creates a mapping stamped with the current time.
    pub fn new(target: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            target: target.into(),
            created_at: Timestamp::now(),
            metadata,
        }
    }
}
