use crate::{Generator, GeneratorError};
use burrow_core::ShortCode;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A generator that replays a fixed list of codes in order.
///
/// Used in tests to force collisions deterministically. Once the script is
/// exhausted every call fails with [`GeneratorError::Exhausted`], unless the
/// generator was built with [`ScriptedGenerator::cycling`].
#[derive(Debug)]
pub struct ScriptedGenerator {
    codes: Vec<String>,
    cursor: AtomicUsize,
    cycle: bool,
}

impl ScriptedGenerator {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
            cycle: false,
        }
    }

    /// Replays the script forever.
    pub fn cycling<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cycle: true,
            ..Self::new(codes)
        }
    }

    /// Number of codes handed out so far.
    pub fn drawn(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let code = if self.cycle && !self.codes.is_empty() {
            self.codes.get(index % self.codes.len())
        } else {
            self.codes.get(index)
        };
        code.map(|c| ShortCode::new_unchecked(c.as_str()))
            .ok_or(GeneratorError::Exhausted)
    }
}
