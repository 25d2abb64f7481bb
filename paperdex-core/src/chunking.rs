//! Recursive character text splitting with overlap.

use crate::config::ChunkingConfig;
use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator that occurs in it, recursing into
/// pieces that are still too long, then merges adjacent pieces back up to
/// `chunk_size` characters.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters of trailing pieces carried into the next chunk
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl RecursiveCharacterSplitter {
    /// Create a splitter; the overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator that occurs in the text; "" always matches.
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }
        chunks
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joined_len = |window: &VecDeque<&str>| if window.is_empty() { 0 } else { separator_len };

            if total + len + joined_len(&window) > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window, separator) {
                    chunks.push(chunk);
                }
                // Shrink the window to the overlap, and further if the next
                // piece would still not fit.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + joined_len(&window) > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(dropped);
                }
            }

            window.push_back(piece);
            total += len + if window.len() > 1 { separator_len } else { 0 };
        }

        if let Some(chunk) = join_window(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveCharacterSplitter::default();
        assert_eq!(splitter.split_text("  A short body.  "), vec!["A short body."]);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = RecursiveCharacterSplitter::new(100, 30);
        let text = long_text(600);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 10);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = RecursiveCharacterSplitter::new(100, 30);
        let chunks = splitter.split_text(&long_text(600));
        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].split(' ').any(|w| w == first_word_of_next),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let splitter = RecursiveCharacterSplitter::new(40, 0);
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        assert_eq!(
            splitter.split_text(text),
            vec!["First paragraph is here.", "Second paragraph is here."]
        );
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveCharacterSplitter::new(10, 2);
        let text = "x".repeat(35);
        let chunks = splitter.split_text(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.len() >= 4);
    }

    #[test]
    fn test_lengths_are_in_characters() {
        let splitter = RecursiveCharacterSplitter::new(5, 0);
        let chunks = splitter.split_text("ééééé ààààà");
        assert_eq!(chunks, vec!["ééééé", "ààààà"]);
    }

    #[test]
    fn test_overlap_is_clamped() {
        let splitter = RecursiveCharacterSplitter::new(10, 50);
        assert_eq!(splitter.chunk_overlap(), 9);
        assert_eq!(RecursiveCharacterSplitter::new(0, 0).chunk_size(), 1);
    }
}
