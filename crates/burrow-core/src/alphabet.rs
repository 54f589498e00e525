use crate::error::{CoreError, Result};
use std::fmt::Display;

const DEFAULT_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
const MIN_SYMBOLS: usize = 2;
const MAX_SYMBOLS: usize = 256;

/// The ordered set of symbols short codes are drawn from.
///
/// Symbols are distinct, printable ASCII characters. The default alphabet is
/// lowercase letters followed by digits (36 symbols).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Alphabet {
    symbols: Vec<u8>,
}

impl Alphabet {
    /// Creates an alphabet from the given symbols, preserving their order.
    pub fn new(symbols: &str) -> Result<Self> {
        let bytes = symbols.as_bytes();

        if bytes.len() < MIN_SYMBOLS || bytes.len() > MAX_SYMBOLS {
            return Err(CoreError::InvalidAlphabet(format!(
                "must contain between {} and {} symbols, got {}",
                MIN_SYMBOLS,
                MAX_SYMBOLS,
                symbols.chars().count()
            )));
        }

        if let Some(c) = symbols.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(CoreError::InvalidAlphabet(format!(
                "symbols must be printable ASCII, got {:?}",
                c
            )));
        }

        let mut seen = [false; 128];
        for &b in bytes {
            if seen[b as usize] {
                return Err(CoreError::InvalidAlphabet(format!(
                    "duplicate symbol '{}'",
                    b as char
                )));
            }
            seen[b as usize] = true;
        }

        Ok(Self {
            symbols: bytes.to_vec(),
        })
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the symbol at `index`, if any.
    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).map(|&b| b as char)
    }

    pub fn contains(&self, c: char) -> bool {
        c.is_ascii() && self.symbols.contains(&(c as u8))
    }

    pub fn as_str(&self) -> &str {
        // constructed from a &str of ASCII bytes only
        std::str::from_utf8(&self.symbols).unwrap_or_default()
    }

    /// Size of the keyspace for codes of `length` symbols, saturating at
    /// `u128::MAX`.
    pub fn keyspace(&self, length: usize) -> u128 {
        (0..length).fold(1u128, |acc, _| acc.saturating_mul(self.len() as u128))
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.as_bytes().to_vec(),
        }
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Alphabet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
