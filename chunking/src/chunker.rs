//! Token-budgeted text chunking with boundary snapping.
//!
//! Text is first segmented into *atoms* — sentence, line, and paragraph
//! units whose byte ranges partition the source exactly. Chunks are then
//! built by greedily packing whole atoms up to the token budget, so a
//! chunk ends on a natural boundary whenever one exists. Consecutive
//! chunks re-enter the previous chunk's trailing atoms up to the
//! configured overlap. Only an atom that is by itself larger than the
//! whole budget is split mid-text (word boundaries first, raw cut last).

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChunkingError, Result};
use crate::tokenizer::TokenCounter;

/// A bounded, token-counted slice of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the document's ordered chunk sequence.
    pub index: usize,

    /// Byte span of this chunk in the source text.
    pub span: Range<usize>,

    /// The chunk text (exact slice of the source, separators included).
    pub text: String,

    /// Token cost of this chunk under the configured counter.
    pub token_count: usize,
}

/// Configuration for the chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk.
    pub chunk_size_tokens: usize,

    /// Tokens shared between consecutive chunks.
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 512,
            overlap_tokens: 64,
        }
    }
}

/// Splits text into overlapping, token-bounded chunks.
#[derive(Clone)]
pub struct Chunker {
    config: ChunkerConfig,
    counter: Arc<dyn TokenCounter>,
}

impl Chunker {
    /// Create a chunker, validating the configuration.
    ///
    /// `overlap_tokens` must be strictly smaller than `chunk_size_tokens`;
    /// anything else could not advance through the text.
    pub fn new(config: ChunkerConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        if config.chunk_size_tokens == 0 {
            return Err(ChunkingError::Config(
                "chunk_size_tokens must be positive".to_string(),
            ));
        }
        if config.overlap_tokens >= config.chunk_size_tokens {
            return Err(ChunkingError::Config(format!(
                "overlap_tokens ({}) must be smaller than chunk_size_tokens ({})",
                config.overlap_tokens, config.chunk_size_tokens
            )));
        }
        Ok(Self { config, counter })
    }

    /// The active configuration.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// The token counter chunks are measured with.
    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Split `text` into an ordered, lazy sequence of chunks.
    ///
    /// The iterator is finite and restartable: calling `chunk` again
    /// yields a fresh pass over the same text, and abandoning iteration
    /// early has no side effects. Empty input yields no chunks.
    pub fn chunk<'a>(&'a self, text: &'a str) -> Chunks<'a> {
        let atoms = atomize(text, self.counter.as_ref());
        debug!(atoms = atoms.len(), bytes = text.len(), "chunking text");
        Chunks {
            chunker: self,
            text,
            atoms,
            pos: 0,
            next_index: 0,
            forced: Vec::new(),
        }
    }

    /// Count the chunks `text` would produce without materializing them.
    pub fn estimate(&self, text: &str) -> usize {
        self.chunk(text).count()
    }
}

/// A boundary-aligned unit of text. Atom ranges partition the source.
struct Atom {
    range: Range<usize>,
    tokens: usize,
}

/// Segment `text` into atoms at paragraph, line, and sentence boundaries.
///
/// Each atom carries its trailing separator, so concatenating atom slices
/// in order reproduces the source byte-for-byte.
fn atomize(text: &str, counter: &dyn TokenCounter) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => matches!(chars.peek(), Some(&(_, next)) if next.is_whitespace()),
            _ => false,
        };
        if !boundary {
            continue;
        }

        // Absorb the trailing whitespace run into this atom, so the next
        // atom starts on content.
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if next.is_whitespace() {
                chars.next();
                end = j + next.len_utf8();
            } else {
                break;
            }
        }

        atoms.push(Atom {
            tokens: counter.count(&text[start..end]),
            range: start..end,
        });
        start = end;
    }

    if start < text.len() {
        atoms.push(Atom {
            tokens: counter.count(&text[start..]),
            range: start..text.len(),
        });
    }

    atoms
}

/// Lazy iterator over the chunks of one text.
pub struct Chunks<'a> {
    chunker: &'a Chunker,
    text: &'a str,
    atoms: Vec<Atom>,
    /// Index of the first atom of the next chunk.
    pos: usize,
    next_index: usize,
    /// Pending pieces of an oversized atom, in reverse emission order.
    forced: Vec<(Range<usize>, usize)>,
}

impl Chunks<'_> {
    fn emit(&mut self, span: Range<usize>, token_count: usize) -> Chunk {
        let chunk = Chunk {
            index: self.next_index,
            text: self.text[span.clone()].to_string(),
            span,
            token_count,
        };
        self.next_index += 1;
        chunk
    }

    /// Split one oversized atom into budget-sized pieces on word
    /// boundaries, cutting raw character runs only when a single word
    /// exceeds the whole budget. Pieces partition the atom's range.
    fn force_split(&mut self, range: Range<usize>) {
        let budget = self.chunker.config.chunk_size_tokens;
        let counter = self.chunker.counter.as_ref();
        let mut pieces = Vec::new();

        let mut piece_start = range.start;
        let mut piece_tokens = 0;
        for word in words(self.text, range.clone()) {
            let word_tokens = counter.count(&self.text[word.clone()]);
            if word_tokens > budget {
                // Flush the open piece, then cut the word itself.
                if piece_start < word.start {
                    pieces.push((piece_start..word.start, piece_tokens));
                }
                let mut cut_start = word.start;
                while cut_start < word.end {
                    let cut_end = largest_fitting_prefix(self.text, cut_start, word.end, budget, counter);
                    pieces.push((
                        cut_start..cut_end,
                        counter.count(&self.text[cut_start..cut_end]),
                    ));
                    cut_start = cut_end;
                }
                piece_start = word.end;
                piece_tokens = 0;
            } else if piece_tokens + word_tokens > budget && piece_start < word.start {
                pieces.push((piece_start..word.start, piece_tokens));
                piece_start = word.start;
                piece_tokens = word_tokens;
            } else {
                piece_tokens += word_tokens;
            }
        }
        if piece_start < range.end {
            pieces.push((piece_start..range.end, piece_tokens));
        }

        pieces.reverse();
        self.forced = pieces;
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if let Some((span, tokens)) = self.forced.pop() {
            return Some(self.emit(span, tokens));
        }
        if self.pos >= self.atoms.len() {
            return None;
        }

        let budget = self.chunker.config.chunk_size_tokens;
        let overlap = self.chunker.config.overlap_tokens;
        let start = self.pos;

        // An atom that alone exceeds the budget takes the fallback path.
        if self.atoms[start].tokens > budget {
            let range = self.atoms[start].range.clone();
            self.pos = start + 1;
            self.force_split(range);
            if let Some((span, tokens)) = self.forced.pop() {
                return Some(self.emit(span, tokens));
            }
            return self.next();
        }

        // Greedy packing: whole atoms until the budget would overflow.
        let mut total = 0;
        let mut end = start;
        while end < self.atoms.len() && total + self.atoms[end].tokens <= budget {
            total += self.atoms[end].tokens;
            end += 1;
        }

        let span = self.atoms[start].range.start..self.atoms[end - 1].range.end;

        if end >= self.atoms.len() {
            self.pos = self.atoms.len();
            return Some(self.emit(span, total));
        }

        // Re-enter trailing atoms worth at most `overlap` tokens, always
        // advancing by at least one atom.
        let mut next_start = end;
        let mut carried = 0;
        while next_start > start + 1 && carried + self.atoms[next_start - 1].tokens <= overlap {
            carried += self.atoms[next_start - 1].tokens;
            next_start -= 1;
        }
        self.pos = next_start;

        Some(self.emit(span, total))
    }
}

/// Iterate word ranges (content plus trailing whitespace) within `range`.
fn words(text: &str, range: Range<usize>) -> impl Iterator<Item = Range<usize>> + '_ {
    let slice = &text[range.clone()];
    let base = range.start;
    let mut chars = slice.char_indices().peekable();
    std::iter::from_fn(move || {
        let (start, _) = chars.next()?;
        let mut end = slice.len();
        let mut in_space = false;
        while let Some(&(j, c)) = chars.peek() {
            if c.is_whitespace() {
                in_space = true;
            } else if in_space {
                end = j;
                break;
            }
            chars.next();
        }
        Some(base + start..base + end)
    })
}

/// Largest char-aligned prefix of `text[start..limit]` whose token count
/// stays within `budget`. Always advances by at least one character.
fn largest_fitting_prefix(
    text: &str,
    start: usize,
    limit: usize,
    budget: usize,
    counter: &dyn TokenCounter,
) -> usize {
    let slice = &text[start..limit];
    let boundaries: Vec<usize> = slice
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .chain(std::iter::once(slice.len()))
        .collect();

    // Binary search over char boundaries for the widest fit.
    let mut lo = 0;
    let mut hi = boundaries.len() - 1;
    let mut best = boundaries[0];
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let end = boundaries[mid];
        if counter.count(&slice[..end]) <= budget {
            best = end;
            if mid == boundaries.len() - 1 {
                break;
            }
            lo = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            hi = mid - 1;
        }
    }
    start + best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WordTokenizer;
    use pretty_assertions::assert_eq;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(
            ChunkerConfig {
                chunk_size_tokens: size,
                overlap_tokens: overlap,
            },
            Arc::new(WordTokenizer),
        )
        .unwrap()
    }

    /// Ten-word sentences; one word == one token under [`WordTokenizer`].
    fn sentences(count: usize) -> String {
        (0..count)
            .map(|i| format!("sentence {i} has exactly ten small words in total here."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let result = Chunker::new(
            ChunkerConfig {
                chunk_size_tokens: 10,
                overlap_tokens: 10,
            },
            Arc::new(WordTokenizer),
        );
        assert!(matches!(result, Err(ChunkingError::Config(_))));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = chunker(100, 20);
        assert_eq!(chunker.chunk("").count(), 0);
    }

    #[test]
    fn small_text_single_chunk() {
        let chunker = chunker(100, 20);
        let chunks: Vec<Chunk> = chunker.chunk("Hello, chunked world.").collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, chunked world.");
        assert_eq!(chunks[0].token_count, 3);
    }

    #[test]
    fn three_hundred_tokens_make_four_chunks() {
        // 30 sentences x 10 tokens with size 100 / overlap 20 packs into
        // windows 0..100, 80..180, 160..260, 240..300.
        let text = sentences(30);
        let chunker = chunker(100, 20);
        let chunks: Vec<Chunk> = chunker.chunk(&text).collect();

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.token_count <= 100);
        }
        for pair in chunks.windows(2) {
            let counter = WordTokenizer;
            let shared = pair[0].span.end.saturating_sub(pair[1].span.start);
            assert!(shared > 0, "adjacent chunks must overlap");
            let overlap_text = &text[pair[1].span.start..pair[0].span.end];
            assert_eq!(counter.count(overlap_text), 20);
        }
    }

    #[test]
    fn indices_are_contiguous() {
        let text = sentences(25);
        let chunker = chunker(60, 10);
        let chunks: Vec<Chunk> = chunker.chunk(&text).collect();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn round_trip_reconstructs_source() {
        let text = format!(
            "First paragraph with a handful of words.\n\n{}\n\nFinal short one.",
            sentences(12)
        );
        let chunker = chunker(40, 10);
        let chunks: Vec<Chunk> = chunker.chunk(&text).collect();

        let mut rebuilt = String::new();
        let mut covered = 0;
        for chunk in &chunks {
            assert!(chunk.span.start <= covered, "gap between chunk spans");
            rebuilt.push_str(&text[covered.max(chunk.span.start)..chunk.span.end]);
            covered = chunk.span.end;
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn terminates_and_covers_for_many_configs() {
        let text = sentences(40);
        for (size, overlap) in [(15, 0), (20, 5), (50, 25), (101, 100), (7, 3)] {
            let chunker = chunker(size, overlap);
            let chunks: Vec<Chunk> = chunker.chunk(&text).collect();
            assert!(!chunks.is_empty(), "size={size} overlap={overlap}");
            assert_eq!(chunks[0].span.start, 0);
            assert_eq!(chunks.last().unwrap().span.end, text.len());
            for chunk in &chunks {
                assert!(
                    chunk.token_count <= size,
                    "budget exceeded at size={size} overlap={overlap}"
                );
            }
            for pair in chunks.windows(2) {
                // Overlap never opens a gap, and every chunk advances.
                assert!(pair[1].span.start <= pair[0].span.end, "gap between chunks");
                assert!(pair[1].span.end > pair[0].span.end, "must advance");
            }
        }
    }

    #[test]
    fn oversized_atom_splits_on_word_boundaries() {
        // A single run-on line with no sentence breaks.
        let text = (0..50).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunker = chunker(10, 2);
        let chunks: Vec<Chunk> = chunker.chunk(&text).collect();
        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(chunk.token_count <= 10);
        }
        // Forced pieces still partition the source.
        assert_eq!(chunks[0].span.start, 0);
        assert_eq!(chunks.last().unwrap().span.end, text.len());
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].span.start, pair[0].span.end);
        }
    }

    #[test]
    fn iteration_is_restartable() {
        let text = sentences(20);
        let chunker = chunker(30, 5);
        // Abandon a pass early, then take a full pass.
        let first_two: Vec<Chunk> = chunker.chunk(&text).take(2).collect();
        let full: Vec<Chunk> = chunker.chunk(&text).collect();
        assert_eq!(&full[..2], &first_two[..]);
    }

    #[test]
    fn estimate_matches_materialized_count() {
        let text = sentences(18);
        let chunker = chunker(25, 5);
        assert_eq!(chunker.estimate(&text), chunker.chunk(&text).count());
    }
}
