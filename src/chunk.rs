//! Overlapping word-window chunker.
//!
//! Splits document text into windows of `chunk_size` whitespace-delimited
//! words, advancing by `chunk_size - overlap` words per step so consecutive
//! chunks share an overlap region. Every word of the input lands in at least
//! one chunk and chunks come out in document order.
//!
//! Document ids are derived from a SHA-256 over the full text plus the
//! ingestion timestamp, truncated to a 16-hex-char identifier.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split text into overlapping word windows. `overlap` must be strictly
/// smaller than `chunk_size`; callers validate at config load.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(overlap < chunk_size);

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        start += stride;
    }

    chunks
}

/// Derive a document id from the full text and the ingestion instant.
pub fn document_id(text: &str, ingested_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(ingested_at.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Build the chunk records for one document.
pub fn build_chunks(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let pieces = chunk_words(text, chunk_size, overlap);
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            id: format!("{}_chunk_{}", document_id, i),
            document_id: document_id.to_string(),
            chunk_index: i,
            total_chunks: total,
            text: piece,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_words("one two three", 10, 2);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(chunk_words("", 10, 2).is_empty());
        assert!(chunk_words("   \n\t ", 10, 2).is_empty());
    }

    #[test]
    fn every_word_appears_in_some_chunk() {
        let words: Vec<String> = (0..137).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let chunks = chunk_words(&text, 20, 5);
        for word in &words {
            assert!(
                chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)),
                "word {} missing from all chunks",
                word
            );
        }
    }

    #[test]
    fn chunks_are_in_document_order() {
        let text = (0..50).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&text, 10, 3);
        let mut last_first_word = -1i64;
        for chunk in &chunks {
            let first: i64 = chunk.split_whitespace().next().unwrap().parse().unwrap();
            assert!(first > last_first_word);
            last_first_word = first;
        }
    }

    #[test]
    fn overlap_region_is_shared() {
        let text = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_words(&text, 10, 4);
        // stride 6: second chunk starts at word 6, so words 6..10 appear in both
        let first: Vec<&str> = chunks[0].split_whitespace().collect();
        let second: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(&first[6..10], &second[0..4]);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(chunk_words(text, 3, 1), chunk_words(text, 3, 1));
    }

    #[test]
    fn chunk_count_depends_only_on_word_count() {
        let a = (0..25).map(|_| "x").collect::<Vec<_>>().join(" ");
        let b = (0..25).map(|_| "different").collect::<Vec<_>>().join(" ");
        assert_eq!(chunk_words(&a, 8, 2).len(), chunk_words(&b, 8, 2).len());
    }

    #[test]
    fn chunk_ids_carry_document_and_index() {
        let chunks = build_chunks("deadbeef00112233", "one two three four", 2, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "deadbeef00112233_chunk_0");
        assert_eq!(chunks[1].id, "deadbeef00112233_chunk_1");
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].total_chunks, 2);
    }

    #[test]
    fn document_ids_differ_for_different_content() {
        let now = Utc::now();
        let a = document_id("the quick brown fox", now);
        let b = document_id("the quick brown cat", now);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }
}
