use crate::{Generator, GeneratorError};
use burrow_core::{Alphabet, ShortCode};
use rand::rngs::OsRng;
use rand::TryRngCore;
use typed_builder::TypedBuilder;

/// Configures a [`RandomGenerator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Symbols codes are drawn from.
    #[builder(default)]
    pub alphabet: Alphabet,
    /// Number of symbols per code.
    #[builder(default = 7)]
    pub length: usize,
}

impl Default for RandomGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws codes uniformly at random from the operating system's CSPRNG.
///
/// Each symbol is an independent uniform draw from the alphabet. Bytes that
/// would bias the draw (the tail above the largest multiple of the alphabet
/// size) are rejected and redrawn.
///
/// Codes double as capability tokens for the redirect, so a predictable RNG
/// is never acceptable here.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    alphabet: Alphabet,
    length: usize,
    /// Largest byte value (exclusive) accepted by rejection sampling.
    zone: u16,
}

impl RandomGenerator {
    pub fn new(settings: RandomGeneratorSettings) -> Self {
        let size = settings.alphabet.len() as u16;
        Self {
            zone: 256 - (256 % size),
            alphabet: settings.alphabet,
            length: settings.length,
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), GeneratorError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| GeneratorError::Entropy(e.to_string()))
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(RandomGeneratorSettings::default())
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        let size = self.alphabet.len();
        let mut code = String::with_capacity(self.length);
        // A little headroom so one refill usually suffices.
        let mut buf = vec![0u8; self.length + self.length / 2 + 1];

        while code.len() < self.length {
            self.fill(&mut buf)?;
            for &byte in &buf {
                if u16::from(byte) >= self.zone {
                    continue;
                }
                if let Some(symbol) = self.alphabet.symbol(usize::from(byte) % size) {
                    code.push(symbol);
                }
                if code.len() == self.length {
                    break;
                }
            }
        }

        Ok(ShortCode::new_unchecked(code))
    }
}
