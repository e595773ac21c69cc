//! Document processing: text normalization and chunking
//!
//! Splits cleaned text into bounded, overlapping chunks using one of three
//! strategies (sentence, token or character windows) and tags every chunk with
//! its position in the source document.

use tracing::debug;

use crate::domain::errors::RagResult;
use crate::domain::models::chunking::CHARS_PER_TOKEN;
use crate::domain::models::{ChunkingConfig, ChunkingMethod, DocumentMetadata, ProcessedDocument};

/// Splits raw text into metadata-tagged chunks
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    config: ChunkingConfig,
}

impl DocumentProcessor {
    /// Create a processor, rejecting invalid chunking settings
    pub fn new(config: ChunkingConfig) -> RagResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk `content` into processed documents sharing `metadata.source_id`.
    ///
    /// Empty or whitespace-only content yields no chunks.
    pub fn process_document(
        &self,
        content: &str,
        metadata: &DocumentMetadata,
    ) -> Vec<ProcessedDocument> {
        let cleaned = self.clean_text(content);
        if cleaned.trim().is_empty() {
            return Vec::new();
        }

        let pieces = if cleaned.chars().count() <= self.config.size {
            vec![cleaned]
        } else {
            match self.config.method {
                ChunkingMethod::Sentence => self.chunk_by_sentences(&cleaned),
                ChunkingMethod::Token => self.chunk_by_tokens(&cleaned),
                ChunkingMethod::Character => {
                    char_windows(&cleaned, self.config.size, self.config.overlap)
                }
            }
        };

        let total = pieces.len();
        let chunks: Vec<ProcessedDocument> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let chunk_metadata =
                    metadata
                        .clone()
                        .with_chunk(index, total, text.chars().count());
                ProcessedDocument::new(
                    ProcessedDocument::chunk_id(&metadata.source_id, index),
                    text,
                    chunk_metadata,
                )
            })
            .collect();

        debug!(
            source_id = %metadata.source_id,
            chunks = chunks.len(),
            method = %self.config.method,
            "document processed"
        );

        chunks
    }

    /// Number of chunks `content` is expected to produce
    pub fn estimate_chunks(&self, content: &str) -> usize {
        let len = self.clean_text(content).chars().count();
        if len == 0 {
            return 0;
        }
        len.div_ceil(self.config.stride())
    }

    /// Normalize text before chunking.
    ///
    /// Control characters other than tab and line breaks are dropped. By default
    /// every whitespace run becomes one space; with `preserve_formatting` only
    /// line endings are normalized to `\n`.
    pub fn clean_text(&self, text: &str) -> String {
        let stripped: String = text
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
            .collect();

        let normalized = if self.config.preserve_formatting {
            stripped.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            collapse_whitespace(&stripped)
        };

        if self.config.trim_whitespace {
            normalized.trim().to_string()
        } else {
            normalized
        }
    }

    fn chunk_by_sentences(&self, text: &str) -> Vec<String> {
        let size = self.config.size;
        let overlap = self.config.overlap;
        let separator = self.config.separator.as_str();
        let separator_len = separator.chars().count();

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if sentence_len > size {
                flush(&mut chunks, &mut current);
                current_len = 0;
                chunks.extend(char_windows(sentence, size, overlap));
                continue;
            }

            if current_len > 0 && current_len + separator_len + sentence_len > size {
                let finished = std::mem::take(&mut current);
                current_len = 0;

                if overlap > 0 {
                    let seed = overlap_tail(finished.trim(), overlap);
                    let seed_len = seed.chars().count();
                    if seed_len > 0 && seed_len + separator_len + sentence_len <= size {
                        current.push_str(seed);
                        current_len = seed_len;
                    }
                }

                chunks.push(finished.trim().to_string());
            }

            if current_len > 0 {
                current.push_str(separator);
                current_len += separator_len;
            }
            current.push_str(sentence);
            current_len += sentence_len;
        }

        flush(&mut chunks, &mut current);
        chunks
    }

    fn chunk_by_tokens(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let window = (self.config.size / CHARS_PER_TOKEN).max(1);
        let overlap = self.config.overlap / CHARS_PER_TOKEN;
        let stride = window.saturating_sub(overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window).min(words.len());
            chunks.push(words[start..end].join(&self.config.separator));
            if end == words.len() {
                break;
            }
            start += stride;
        }
        chunks
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let sentence = text[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = end;
                }
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Sliding character windows of `size` with stride `size - overlap`
fn char_windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let stride = size.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    windows
}

/// The last `overlap` characters of `text`, starting at a word boundary when one exists
fn overlap_tail(text: &str, overlap: usize) -> &str {
    let len = text.chars().count();
    if len <= overlap {
        return text;
    }
    let start = text
        .char_indices()
        .nth(len - overlap)
        .map_or(text.len(), |(i, _)| i);
    let tail = &text[start..];
    if text[..start].ends_with(char::is_whitespace) {
        return tail.trim_start();
    }
    match tail.find(char::is_whitespace) {
        Some(pos) if !tail[pos..].trim().is_empty() => tail[pos..].trim_start(),
        _ => tail,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn processor(size: usize, overlap: usize, method: ChunkingMethod) -> DocumentProcessor {
        DocumentProcessor::new(ChunkingConfig {
            size,
            overlap,
            method,
            ..ChunkingConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DocumentProcessor::new(ChunkingConfig {
            size: 100,
            overlap: 150,
            ..ChunkingConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_and_whitespace_content() {
        let p = processor(1000, 200, ChunkingMethod::Sentence);
        let metadata = DocumentMetadata::new("doc");
        assert!(p.process_document("", &metadata).is_empty());
        assert!(p.process_document("   \n\t  ", &metadata).is_empty());
        assert_eq!(p.estimate_chunks(""), 0);
    }

    #[test]
    fn test_short_text_yields_single_cleaned_chunk() {
        let p = processor(1000, 200, ChunkingMethod::Sentence);
        let chunks = p.process_document("  Hello\t\tworld.\n\nBye!  ", &DocumentMetadata::new("doc"));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello world. Bye!");
        assert_eq!(chunks[0].id, "doc-chunk-0");
        assert_eq!(chunks[0].metadata.chunk_index, Some(0));
        assert_eq!(chunks[0].metadata.total_chunks, Some(1));
        assert_eq!(chunks[0].metadata.chunk_size, Some(17));
    }

    #[test]
    fn test_sentence_scenario() {
        let p = processor(1000, 100, ChunkingMethod::Sentence);
        let text = "This is a sentence. ".repeat(100);
        let chunks = p.process_document(&text, &DocumentMetadata::new("doc"));

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].metadata.chunk_index, Some(0));
        let total = chunks[0].metadata.total_chunks;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, Some(i));
            assert_eq!(chunk.metadata.total_chunks, total);
            assert!(chunk.content.chars().count() <= 1000);
        }
    }

    #[test]
    fn test_sentence_overlap_seeds_next_chunk() {
        let p = processor(100, 30, ChunkingMethod::Sentence);
        let text = "Alpha beta gamma delta epsilon zeta. Eta theta iota kappa lambda mu nu. \
                    Xi omicron pi rho sigma tau upsilon. Phi chi psi omega end.";
        let chunks = p.process_document(text, &DocumentMetadata::new("doc"));

        assert!(chunks.len() >= 2);
        let first_tail: String = chunks[0].content.split_whitespace().last().unwrap().to_string();
        assert!(chunks[1].content.contains(&first_tail));
    }

    #[test]
    fn test_long_sentence_is_split_within_size() {
        let p = processor(100, 10, ChunkingMethod::Sentence);
        let text = format!("{} End.", "x".repeat(450));
        let chunks = p.process_document(&text, &DocumentMetadata::new("doc"));

        assert!(chunks.len() >= 5);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 100));
    }

    #[test]
    fn test_character_windows() {
        let p = processor(100, 20, ChunkingMethod::Character);
        let text = "abcdefghij".repeat(25);
        let chunks = p.process_document(&text, &DocumentMetadata::new("doc"));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 100);
        assert_eq!(&chunks[1].content[..20], &chunks[0].content[80..]);
        assert_eq!(chunks[2].content.len(), 90);
    }

    #[test]
    fn test_character_windows_respect_multibyte_chars() {
        let p = processor(100, 0, ChunkingMethod::Character);
        let text = "日本語のテキスト".repeat(30);
        let chunks = p.process_document(&text, &DocumentMetadata::new("doc"));
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 100));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_token_windows() {
        let p = processor(100, 25, ChunkingMethod::Token);
        let text = (0..50).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let text = format!("{text} {}", "filler ".repeat(10));
        let chunks = p.process_document(&text, &DocumentMetadata::new("doc"));

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].content.split_whitespace().count(), 20);
        assert!(chunks[1].content.starts_with("w15 "));
    }

    #[test]
    fn test_caller_metadata_is_propagated() {
        let p = processor(100, 0, ChunkingMethod::Character);
        let serde_json::Value::Object(map) = json!({"title": "Doc", "author": "me"}) else {
            unreachable!()
        };
        let metadata = DocumentMetadata::from_map("src", map);
        let chunks = p.process_document(&"z".repeat(250), &metadata);

        for chunk in &chunks {
            assert_eq!(chunk.metadata.source_id, "src");
            assert_eq!(chunk.metadata.title.as_deref(), Some("Doc"));
            assert_eq!(chunk.metadata.extra.get("author"), Some(&json!("me")));
            assert_eq!(chunk.metadata.total_chunks, Some(3));
        }
    }

    #[test]
    fn test_clean_text_modes() {
        let default = processor(1000, 0, ChunkingMethod::Sentence);
        assert_eq!(default.clean_text("a\u{0}b\r\n\r\nc\t d"), "ab c d");

        let preserving = DocumentProcessor::new(ChunkingConfig {
            preserve_formatting: true,
            ..ChunkingConfig::default()
        })
        .unwrap();
        assert_eq!(preserving.clean_text("  line1\r\nline2\rline3\u{7}  "), "line1\nline2\nline3");

        let untrimmed = DocumentProcessor::new(ChunkingConfig {
            trim_whitespace: false,
            ..ChunkingConfig::default()
        })
        .unwrap();
        assert_eq!(untrimmed.clean_text("  a  b "), " a b ");
    }

    #[test]
    fn test_estimate_chunks() {
        let p = processor(100, 20, ChunkingMethod::Character);
        assert_eq!(p.estimate_chunks(&"a".repeat(80)), 1);
        assert_eq!(p.estimate_chunks(&"a".repeat(81)), 2);
        assert_eq!(p.estimate_chunks(&"a".repeat(250)), 4);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two! Three? v1.2 stays. Tail");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "v1.2 stays.", "Tail"]);
    }
}
