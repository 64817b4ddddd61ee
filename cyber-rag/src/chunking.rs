//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and three implementations:
//!
//! - [`SentenceWindowChunker`] packs whole sentences into an overlapping window
//! - [`RecursiveChunker`] splits hierarchically by paragraphs, sentences, then words
//! - [`FixedSizeChunker`] splits by word count with configurable overlap
//!
//! All strategies measure length in tokens, approximated as whitespace-delimited
//! words, and take the overlap as a fraction of the chunk size. Output is fully
//! determined by the input text and parameters.

use std::sync::Arc;

use crate::config::{ChunkingStrategy, RagConfig, overlap_tokens};
use crate::document::Chunk;

/// A strategy for splitting a document into ordered chunks.
///
/// Chunk indices run from zero in document order. Empty or whitespace-only
/// text produces no chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Build the chunker selected by `strategy`.
pub fn chunker_for(strategy: ChunkingStrategy, chunk_size: usize, overlap: f32) -> Arc<dyn Chunker> {
    match strategy {
        ChunkingStrategy::SentenceWindow => Arc::new(SentenceWindowChunker::new(chunk_size, overlap)),
        ChunkingStrategy::Recursive => Arc::new(RecursiveChunker::new(chunk_size, overlap)),
        ChunkingStrategy::FixedSize => Arc::new(FixedSizeChunker::new(chunk_size, overlap)),
    }
}

/// Build the chunker described by a [`RagConfig`].
pub fn chunker_from_config(config: &RagConfig) -> Arc<dyn Chunker> {
    chunker_for(config.strategy, config.chunk_size, config.chunk_overlap)
}

/// Split `text` with the given strategy, chunk size and overlap fraction.
pub fn chunk_text(
    text: &str,
    max_size: usize,
    overlap: f32,
    strategy: ChunkingStrategy,
) -> Vec<Chunk> {
    chunker_for(strategy, max_size, overlap).chunk(text)
}

/// Approximate token count of a piece of text.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Packs consecutive sentences into windows of at most `chunk_size` tokens.
///
/// A new window restarts at the trailing sentences of the previous one that fit
/// in the overlap budget, and always advances by at least one sentence. A
/// sentence longer than `chunk_size` becomes its own chunk, untouched.
///
/// # Example
///
/// ```rust
/// use cyber_rag::{Chunker, SentenceWindowChunker};
///
/// let chunker = SentenceWindowChunker::new(100, 0.2);
/// let chunks = chunker.chunk("One sentence. Another sentence.");
/// assert_eq!(chunks.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceWindowChunker {
    chunk_size: usize,
    chunk_overlap: f32,
}

impl SentenceWindowChunker {
    /// Create a new `SentenceWindowChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - approximate maximum number of tokens per chunk
    /// * `chunk_overlap` - fraction of `chunk_size` carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: f32) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for SentenceWindowChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let lengths: Vec<usize> = sentences.iter().map(|s| count_tokens(s)).collect();
        let max = self.chunk_size;
        let overlap = overlap_tokens(max, self.chunk_overlap);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let mut end = start;
            let mut length = 0;
            while end < sentences.len() && (end == start || length + lengths[end] <= max) {
                length += lengths[end];
                end += 1;
            }

            chunks.push(Chunk::new(chunks.len(), sentences[start..end].join(" ")));

            if end == sentences.len() {
                break;
            }

            // Carry trailing sentences that fit the overlap budget.
            let mut next = end;
            let mut carried = 0;
            while next > start + 1 && carried + lengths[next - 1] <= overlap {
                carried += lengths[next - 1];
                next -= 1;
            }
            // The next window must still reach a sentence not seen before.
            while next < end && carried + lengths[end] > max {
                carried -= lengths[next];
                next += 1;
            }
            start = next;
        }

        chunks
    }
}

/// Splits text hierarchically: paragraphs, then sentences, then words.
///
/// Pieces that fit are merged greedily up to `chunk_size` minus the overlap
/// budget; every piece after the first is prefixed with the trailing overlap
/// words of its predecessor, so no chunk exceeds `chunk_size`.
///
/// # Example
///
/// ```rust
/// use cyber_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(64, 0.0);
/// let chunks = chunker.chunk("First paragraph.\n\nSecond paragraph.");
/// assert_eq!(chunks.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: f32,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of tokens per chunk
    /// * `chunk_overlap` - fraction of `chunk_size` repeated between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: f32) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Paragraph,
    Sentence,
    Word,
}

const LEVELS: [Level; 3] = [Level::Paragraph, Level::Sentence, Level::Word];

/// Split text at the first level that applies, then merge segments into pieces
/// of at most `budget` tokens. Oversized segments descend to the next level.
fn split_and_merge(text: &str, budget: usize, levels: &[Level]) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if count_tokens(text) <= budget {
        return vec![text.to_string()];
    }

    let Some((level, remaining)) = levels.split_first() else {
        return split_words(text, budget);
    };

    let (segments, joiner) = match level {
        Level::Paragraph => (split_paragraphs(text), "\n\n"),
        Level::Sentence => (split_sentences(text), " "),
        Level::Word => return split_words(text, budget),
    };

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in segments {
        let len = count_tokens(segment);
        if len > budget {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            pieces.extend(split_and_merge(segment, budget, remaining));
            continue;
        }
        if !current.is_empty() && current_len + len > budget {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str(joiner);
        }
        current.push_str(segment);
        current_len += len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Word windows of `budget` tokens, sliced from the original text.
fn split_words(text: &str, budget: usize) -> Vec<String> {
    let spans = word_spans(text);
    spans
        .chunks(budget.max(1))
        .map(|window| text[window[0].0..window[window.len() - 1].1].to_string())
        .collect()
}

/// The last `n` words of `text`, with their original spacing.
fn trailing_words(text: &str, n: usize) -> &str {
    let spans = word_spans(text);
    if n == 0 || spans.is_empty() {
        return "";
    }
    let first = spans.len().saturating_sub(n);
    &text[spans[first].0..]
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let overlap = overlap_tokens(self.chunk_size, self.chunk_overlap);
        let budget = self.chunk_size - overlap;
        let pieces = split_and_merge(text, budget, &LEVELS);

        let mut chunks = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let text = if i > 0 && overlap > 0 {
                format!("{} {piece}", trailing_words(&pieces[i - 1], overlap))
            } else {
                piece.clone()
            };
            chunks.push(Chunk::new(i, text));
        }
        chunks
    }
}

/// Splits text into windows of `chunk_size` words, ignoring sentence boundaries.
///
/// Consecutive windows share `floor(chunk_size * chunk_overlap)` words. Chunk
/// text is sliced from the document, so original spacing is kept.
///
/// # Example
///
/// ```rust
/// use cyber_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(2, 0.5);
/// let chunks = chunker.chunk("a b c");
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].text, "b c");
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: f32,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - number of words per chunk
    /// * `chunk_overlap` - fraction of `chunk_size` shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: f32) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let spans = word_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - overlap_tokens(self.chunk_size, self.chunk_overlap);
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(spans.len());
            chunks.push(Chunk::new(chunks.len(), &text[spans[start].0..spans[end - 1].1]));
            if end == spans.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Byte ranges of whitespace-delimited words.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, segment: &'a str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        out.push(segment);
    }
}

/// Split text into sentences.
///
/// A sentence ends after `.`, `!` or `?` (with any closing quotes or brackets)
/// when followed by whitespace or the end of the text, and at blank lines.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, next)) = chars.peek() {
                    if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}')
                    {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                match chars.peek() {
                    None => Some(end),
                    Some(&(_, next)) if next.is_whitespace() => Some(end),
                    _ => None,
                }
            }
            '\n' => {
                let rest = &text[i + 1..];
                let gap = rest.find(|ch: char| !ch.is_whitespace()).unwrap_or(rest.len());
                rest[..gap].contains('\n').then_some(i)
            }
            _ => None,
        };

        if let Some(end) = boundary {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

/// Split text into paragraphs separated by blank lines.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                push_trimmed(&mut paragraphs, &text[s..end]);
            }
        } else {
            start.get_or_insert(offset);
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        push_trimmed(&mut paragraphs, &text[s..end]);
    }

    paragraphs
}
