//! Property tests for the recursive chunker.

use std::collections::HashMap;

use docqa_rag::chunking::{Chunker, RecursiveChunker, split_documents};
use docqa_rag::document::Document;
use proptest::prelude::*;

fn document(id: &str, text: String) -> Document {
    Document { id: id.to_string(), text, metadata: HashMap::new(), source_uri: None }
}

/// Text made of unique tokens (`w0x`, `w1x`, ...) joined by whitespace
/// separators of varying strength.
fn arb_token_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just(" "), Just(" "), Just("\n"), Just("\n\n")], 1..400)
        .prop_map(|separators| {
            separators
                .iter()
                .enumerate()
                .map(|(i, sep)| format!("w{i}x{sep}"))
                .collect::<String>()
        })
}

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (20usize..300).prop_flat_map(|size| (Just(size), 0..size))
}

/// Length in characters of the longest suffix of `prev` that is also a prefix of `next`.
fn shared_boundary(prev: &str, next: &str) -> usize {
    let prev: Vec<char> = prev.chars().collect();
    let next: Vec<char> = next.chars().collect();
    (1..=prev.len().min(next.len()))
        .rev()
        .find(|&len| prev[prev.len() - len..] == next[..len])
        .unwrap_or(0)
}

mod prop_chunk_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// No chunk exceeds `chunk_size` when every word fits.
        #[test]
        fn chunks_never_exceed_size(text in arb_token_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text);
            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= size, "{} > {size}: {chunk:?}", chunk.chars().count());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
            }
        }

        /// Neighbouring chunks share at most `chunk_overlap` characters.
        #[test]
        fn neighbours_share_bounded_overlap(text in arb_token_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text);
            for pair in chunks.windows(2) {
                let shared = shared_boundary(&pair[0], &pair[1]);
                prop_assert!(shared <= overlap, "shared {shared} > overlap {overlap}: {pair:?}");
            }
        }

        /// Every token of the input survives chunking.
        #[test]
        fn no_token_is_lost(text in arb_token_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let joined = chunker.split_text(&text).join(" ");
            let present: std::collections::HashSet<&str> = joined.split_whitespace().collect();
            for token in text.split_whitespace() {
                prop_assert!(present.contains(token), "missing {token}");
            }
        }

        /// Same input and parameters always give the same chunks.
        #[test]
        fn chunking_is_deterministic(text in arb_token_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let doc = document("doc", text);
            let first = chunker.chunk(&doc);
            let second = RecursiveChunker::new(size, overlap).unwrap().chunk(&doc);
            prop_assert_eq!(first, second);
        }
    }
}

#[test]
fn three_segments_with_default_sizes() {
    let segments: Vec<Document> = (0..3)
        .map(|page| {
            let text = (0..60)
                .map(|i| format!("Sentence {i} of page {page} describes item number {}.", page * 100 + i))
                .collect::<Vec<_>>()
                .join(" ");
            document(&format!("manual_p{}", page + 1), text)
        })
        .collect();

    let chunker = RecursiveChunker::new(1200, 300).unwrap();
    let chunks = split_documents(&chunker, &segments).unwrap();

    assert!(!chunks.is_empty());
    assert!(chunks.len() > 3, "each page is longer than one chunk");
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= 1200);
    }
    for pair in chunks.windows(2) {
        if pair[0].document_id == pair[1].document_id {
            let shared = shared_boundary(&pair[0].text, &pair[1].text);
            assert!(shared <= 300, "shared {shared}");
            assert!(shared > 0, "adjacent chunks of one page overlap");
        }
    }
}

#[test]
fn oversized_atomic_unit_becomes_its_own_chunk() {
    let word = "x".repeat(50);
    let text = format!("short words here {word} and more short words after it");
    let chunks = RecursiveChunker::new(20, 5).unwrap().split_text(&text);
    assert!(chunks.contains(&word));
    assert!(chunks.iter().filter(|c| c.chars().count() > 20).all(|c| *c == word));
}
