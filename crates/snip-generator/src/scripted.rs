use crate::Generator;
use snip_core::ShortCode;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays a fixed list of codes in order, wrapping around at the end.
///
/// Useful where a test needs to force a collision: script the same code
/// twice and the second caller is guaranteed to hit it.
#[derive(Debug)]
pub struct ScriptedGenerator {
    codes: Vec<ShortCode>,
    cursor: AtomicUsize,
}

impl ScriptedGenerator {
    /// # Panics
    ///
    /// Panics if `codes` is empty.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<ShortCode> = codes.into_iter().map(ShortCode::new_unchecked).collect();
        assert!(!codes.is_empty(), "scripted generator needs at least one code");
        Self {
            codes,
            cursor: AtomicUsize::new(0),
        }
    }

    /// How many codes were handed out so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Generator for ScriptedGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.codes[index % self.codes.len()].clone()
    }
}
