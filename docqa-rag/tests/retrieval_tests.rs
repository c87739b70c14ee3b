//! Property tests for candidate merging and query expansion parsing.

use std::collections::{HashMap, HashSet};

use docqa_rag::document::Chunk;
use docqa_rag::retrieval::{CandidateSet, QueryExpansionSet};
use proptest::prelude::*;

fn chunk(n: u8) -> Chunk {
    Chunk {
        id: format!("doc_{n}"),
        text: format!("chunk body number {n}"),
        embedding: Vec::new(),
        metadata: HashMap::new(),
        document_id: "doc".to_string(),
    }
}

/// Per-phrasing result lists drawn from a small pool so repeats are common.
fn arb_result_lists() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(proptest::collection::vec(0u8..12, 0..6), 1..7)
}

mod prop_candidate_dedup {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Each chunk appears at most once, and nothing retrieved is lost.
        #[test]
        fn merged_set_has_no_duplicates(lists in arb_result_lists()) {
            let results: Vec<Vec<Chunk>> =
                lists.iter().map(|l| l.iter().copied().map(chunk).collect()).collect();
            let set = CandidateSet::merge(results);

            let ids: Vec<&str> = set.chunks().iter().map(|c| c.id.as_str()).collect();
            let unique: HashSet<&str> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len());

            let expected: HashSet<String> =
                lists.iter().flatten().map(|n| format!("doc_{n}")).collect();
            let got: HashSet<String> = unique.iter().map(|s| s.to_string()).collect();
            prop_assert_eq!(got, expected);
        }

        /// Order is first-seen order across the concatenated lists.
        #[test]
        fn merged_set_keeps_first_seen_order(lists in arb_result_lists()) {
            let results: Vec<Vec<Chunk>> =
                lists.iter().map(|l| l.iter().copied().map(chunk).collect()).collect();
            let set = CandidateSet::merge(results);

            let mut seen = HashSet::new();
            let expected: Vec<String> = lists
                .iter()
                .flatten()
                .filter(|n| seen.insert(**n))
                .map(|n| format!("doc_{n}"))
                .collect();
            let got: Vec<String> = set.chunks().iter().map(|c| c.id.clone()).collect();
            prop_assert_eq!(got, expected);
        }
    }
}

#[test]
fn same_text_under_different_ids_counts_once() {
    let mut copy = chunk(1);
    copy.id = "other_doc_1".to_string();
    let set = CandidateSet::merge(vec![vec![chunk(1)], vec![copy]]);
    assert_eq!(set.len(), 1);
    assert_eq!(set.chunks()[0].id, "doc_1");
}

#[test]
fn original_question_is_always_queried_first() {
    let set = QueryExpansionSet::parse(
        "What is covered?",
        "1. Which repairs are included?\n2. What is covered?\n3. What does the warranty include?",
    );
    let queries: Vec<&str> = set.queries().collect();
    assert_eq!(
        queries,
        vec![
            "What is covered?",
            "Which repairs are included?",
            "What does the warranty include?"
        ]
    );
}

#[test]
fn original_only_set_is_degenerate() {
    let set = QueryExpansionSet::original_only("q");
    assert!(set.is_degenerate());
    assert_eq!(set.original(), "q");
}
