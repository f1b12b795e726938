//! Token counting adapters.
//!
//! Everything that enforces a token budget (the chunker, the context
//! assembler) goes through the [`TokenCounter`] trait rather than a
//! concrete encoding, so the same pipeline works with exact BPE counts
//! or cheap approximations.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Counts and encodes tokens for a fixed encoding scheme.
///
/// Implementations must be deterministic: identical text always yields
/// the same count and the same token sequence.
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Encode `text` into a token sequence.
    fn encode(&self, text: &str) -> Vec<u32>;
}

/// Approximate chars-per-token ratio for plain text.
const CHARS_PER_TOKEN: usize = 4;

/// Character-count heuristic tokenizer (~4 chars per token).
///
/// Cheap and dependency-free; good enough when budgets are soft.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl TokenCounter for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(CHARS_PER_TOKEN)
            .map(|group| hash_token(&group.iter().collect::<String>()))
            .collect()
    }
}

/// One token per whitespace-separated word.
///
/// Exact and easy to reason about, which makes budget arithmetic in
/// tests deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl TokenCounter for WordTokenizer {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace().map(hash_token).collect()
    }
}

fn hash_token(piece: impl AsRef<str>) -> u32 {
    let mut hasher = DefaultHasher::new();
    piece.as_ref().hash(&mut hasher);
    hasher.finish() as u32
}

/// Exact BPE token counts backed by tiktoken's `cl100k_base` encoding.
#[cfg(feature = "tiktoken")]
pub struct BpeTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl BpeTokenizer {
    /// Build a tokenizer for the `cl100k_base` encoding.
    pub fn cl100k() -> crate::error::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| crate::error::ChunkingError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl TokenCounter for BpeTokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|token| token as u32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heuristic_counts_by_chars() {
        let tokenizer = HeuristicTokenizer;
        assert_eq!(tokenizer.count(""), 0);
        assert_eq!(tokenizer.count("abcd"), 1);
        assert_eq!(tokenizer.count("abcde"), 2);
    }

    #[test]
    fn word_tokenizer_counts_words() {
        let tokenizer = WordTokenizer;
        assert_eq!(tokenizer.count("one two  three\nfour"), 4);
        assert_eq!(tokenizer.count("   "), 0);
    }

    #[test]
    fn encoding_is_deterministic() {
        let tokenizer = WordTokenizer;
        let a = tokenizer.encode("alpha beta gamma");
        let b = tokenizer.encode("alpha beta gamma");
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[cfg(feature = "tiktoken")]
    #[test]
    fn bpe_counts_nonzero() {
        let tokenizer = BpeTokenizer::cl100k().unwrap();
        assert!(tokenizer.count("hello world") > 0);
        assert_eq!(tokenizer.count(""), 0);
    }
}
