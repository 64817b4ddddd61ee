//! Property tests for the chunking strategies.

use std::collections::HashSet;

use cyber_rag::{
    ChunkingStrategy, Chunker, FixedSizeChunker, RecursiveChunker, SentenceWindowChunker,
    chunk_text, count_tokens,
};
use proptest::prelude::*;

const STRATEGIES: [ChunkingStrategy; 3] =
    [ChunkingStrategy::SentenceWindow, ChunkingStrategy::Recursive, ChunkingStrategy::FixedSize];

/// Prose made of short sentences, occasionally separated into paragraphs.
fn arb_document() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        (proptest::collection::vec("[a-z]{1,8}", 1..15), any::<bool>()),
        0..25,
    )
    .prop_map(|sentences| {
        let mut text = String::new();
        for (words, paragraph_break) in sentences {
            if !text.is_empty() {
                text.push_str(if paragraph_break { "\n\n" } else { " " });
            }
            text.push_str(&words.join(" "));
            text.push('.');
        }
        text
    })
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[test]
fn sentence_window_keeps_oversized_sentence_whole() {
    let text = "Short one. This sentence has far more words than the window allows. End.";
    let chunks = SentenceWindowChunker::new(4, 0.0).chunk(text);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Short one.", "This sentence has far more words than the window allows.", "End."]
    );
}

#[test]
fn sentence_window_overlap_repeats_trailing_sentence() {
    let text = "a b. c d. e f. g h.";
    let chunks = SentenceWindowChunker::new(4, 0.5).chunk(text);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["a b. c d.", "c d. e f.", "e f. g h."]);
}

#[test]
fn recursive_prefers_paragraph_boundaries() {
    let text = "one two three.\n\nfour five six.";
    let chunks = RecursiveChunker::new(4, 0.0).chunk(text);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["one two three.", "four five six."]);
}

#[test]
fn fixed_size_windows_share_overlap() {
    let chunks = FixedSizeChunker::new(4, 0.5).chunk("a b c d e f");
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["a b c d", "c d e f"]);
}

#[test]
fn blank_text_yields_no_chunks() {
    for strategy in STRATEGIES {
        assert!(chunk_text(" \n\t ", 10, 0.2, strategy).is_empty());
    }
}

mod prop_chunking {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Same input, same chunks.
        #[test]
        fn deterministic(text in arb_document(), size in 1usize..30, overlap in 0.0f32..0.9) {
            for strategy in STRATEGIES {
                prop_assert_eq!(
                    chunk_text(&text, size, overlap, strategy),
                    chunk_text(&text, size, overlap, strategy)
                );
            }
        }

        /// Indices run 0..n in order and no chunk is blank.
        #[test]
        fn indices_are_sequential(text in arb_document(), size in 1usize..30, overlap in 0.0f32..0.9) {
            for strategy in STRATEGIES {
                let chunks = chunk_text(&text, size, overlap, strategy);
                for (position, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.index, position);
                    prop_assert!(!chunk.text.trim().is_empty());
                }
            }
        }

        /// Without overlap, every strategy reproduces the document's words in order.
        #[test]
        fn no_words_lost_without_overlap(text in arb_document(), size in 1usize..30) {
            for strategy in STRATEGIES {
                let rejoined: Vec<String> = chunk_text(&text, size, 0.0, strategy)
                    .iter()
                    .flat_map(|c| words(&c.text))
                    .collect();
                prop_assert_eq!(&rejoined, &words(&text));
            }
        }

        /// With overlap, every word still appears in some chunk.
        #[test]
        fn no_words_lost_with_overlap(text in arb_document(), size in 1usize..30, overlap in 0.0f32..0.9) {
            let expected: HashSet<String> = words(&text).into_iter().collect();
            for strategy in STRATEGIES {
                let covered: HashSet<String> = chunk_text(&text, size, overlap, strategy)
                    .iter()
                    .flat_map(|c| words(&c.text))
                    .collect();
                prop_assert_eq!(&covered, &expected);
            }
        }

        /// Word-based strategies never exceed the chunk size.
        #[test]
        fn word_strategies_respect_size(text in arb_document(), size in 1usize..30, overlap in 0.0f32..0.9) {
            for strategy in [ChunkingStrategy::Recursive, ChunkingStrategy::FixedSize] {
                for chunk in chunk_text(&text, size, overlap, strategy) {
                    prop_assert!(count_tokens(&chunk.text) <= size);
                }
            }
        }
    }
}
