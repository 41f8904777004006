//! Segmentation of normalized text into retrievable units

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::SegmentationConfig;
use crate::types::Unit;

/// How text is cut into units. Applies to every source kind alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    /// One unit per sentence
    #[default]
    Sentence,
    /// The whole document as one unit
    Whole,
    /// Sentences packed into overlapping chunks of bounded size
    Chunk,
}

/// Splits text into ordered units
#[derive(Debug, Clone)]
pub struct Segmenter {
    mode: SegmentMode,
    /// Target chunk size in characters (chunk mode)
    chunk_size: usize,
    /// Characters carried into the next chunk (chunk mode)
    overlap: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

impl Segmenter {
    pub fn new(mode: SegmentMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            mode: config.mode,
            chunk_size: config.chunk_size.max(1),
            overlap: config.chunk_overlap.min(config.chunk_size / 2),
        }
    }

    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    /// Segment `text` into units tagged with `source`. Blank input yields no units.
    pub fn segment(&self, text: &str, source: &str) -> Vec<Unit> {
        let pieces = match self.mode {
            SegmentMode::Sentence => sentences(text),
            SegmentMode::Whole => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
            SegmentMode::Chunk => self.chunks(text),
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Unit::new(index, piece, source))
            .collect()
    }

    fn chunks(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        // Length of `current` that is carried overlap, not fresh text
        let mut carried = 0usize;

        for sentence in text.split_sentence_bounds() {
            if current.len() > carried && current.len() + sentence.len() > self.chunk_size {
                push_trimmed(&mut chunks, &current);
                current = self.overlap_tail(current.trim_end());
                if !current.is_empty() {
                    current.push(' ');
                }
                carried = current.len();
            }
            current.push_str(sentence);
        }

        if current.len() > carried {
            push_trimmed(&mut chunks, &current);
        }

        chunks
    }

    /// Tail of a chunk to repeat at the start of the next, cut at a word boundary
    fn overlap_tail(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len() - self.overlap;
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let tail = &text[start..];
        if let Some(pos) = tail.find(". ") {
            return tail[pos + 2..].to_string();
        }
        if let Some(pos) = tail.find(' ') {
            return tail[pos + 1..].to_string();
        }
        tail.to_string()
    }
}

/// Unicode sentence boundaries, trimmed, blanks dropped
fn sentences(text: &str) -> Vec<String> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
