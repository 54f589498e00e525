use crate::alphabet::Alphabet;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Namespace prefix of every persisted short code key.
pub const KEY_PREFIX: &str = "u/";

/// An identifier for a shortened URL.
///
/// Codes are immutable once created. Generated codes skip validation;
/// codes received from the outside go through [`ShortCode::parse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Parses an externally supplied code, checking that it has exactly
    /// `length` symbols, all taken from `alphabet`.
    pub fn parse(
        code: impl Into<String>,
        alphabet: &Alphabet,
        length: usize,
    ) -> std::result::Result<Self, CoreError> {
        let code = code.into();

        let count = code.chars().count();
        if count != length {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be {}, got {}",
                length, count
            )));
        }

        if let Some(c) = code.chars().find(|c| !alphabet.contains(*c)) {
            return Err(CoreError::InvalidShortCode(format!(
                "symbol {:?} is not in the alphabet '{}'",
                c, alphabet
            )));
        }

        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (e.g. generators that are guaranteed to produce valid output).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key under which this code's mapping is persisted.
    pub fn store_key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.0)
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
