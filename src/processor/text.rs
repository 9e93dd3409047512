//! Built-in processor for plain-text documents.
//!
//! Accepts UTF-8 files with a configured extension, rejects empty or
//! undecodable content, and reports basic statistics plus the number of
//! chunks a sliding-window chunker would produce.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{
    ContentProcessor, Metadata, Outcome, ProcessorError, ProcessorResult, extension_allowed,
};
use crate::config::ProcessorConfig;

#[derive(Debug, Default)]
pub struct TextProcessor {
    extensions: Vec<String>,
    chunk_chars: usize,
    chunk_overlap: usize,
    initialized: bool,
}

impl TextProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentProcessor for TextProcessor {
    fn name(&self) -> &str {
        "text"
    }

    async fn initialize(&mut self, config: &ProcessorConfig) -> ProcessorResult<()> {
        if config.chunk_chars == 0 {
            return Err(ProcessorError::Config {
                reason: "chunk_chars must be greater than zero".to_string(),
            });
        }
        if config.chunk_overlap >= config.chunk_chars {
            return Err(ProcessorError::Config {
                reason: format!(
                    "chunk_overlap ({}) must be smaller than chunk_chars ({})",
                    config.chunk_overlap, config.chunk_chars
                ),
            });
        }

        self.extensions = config.extensions.clone();
        self.chunk_chars = config.chunk_chars;
        self.chunk_overlap = config.chunk_overlap;
        self.initialized = true;
        Ok(())
    }

    fn supports(&self, path: &Path) -> bool {
        extension_allowed(&self.extensions, path)
    }

    async fn process(&self, path: &Path) -> ProcessorResult<Outcome> {
        if !self.initialized {
            return Err(ProcessorError::NotInitialized {
                name: self.name().to_string(),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ProcessorError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(e) => {
                return Ok(Outcome::PermanentFailure(format!(
                    "content is not valid UTF-8 (invalid byte at offset {})",
                    e.valid_up_to()
                )));
            }
        };

        if text.trim().is_empty() {
            return Ok(Outcome::PermanentFailure(
                "no extractable content".to_string(),
            ));
        }

        let chars = text.chars().count();
        let mut metadata = Metadata::new();
        metadata.insert("bytes".into(), json!(bytes.len()));
        metadata.insert("lines".into(), json!(text.lines().count()));
        metadata.insert("words".into(), json!(text.split_whitespace().count()));
        metadata.insert(
            "chunks".into(),
            json!(chunk_count(chars, self.chunk_chars, self.chunk_overlap)),
        );
        metadata.insert("sha256".into(), json!(format!("{:x}", Sha256::digest(&bytes))));

        Ok(Outcome::Success(metadata))
    }
}

/// Number of windows of `window` characters, advancing by
/// `window - overlap`, needed to cover `chars` characters.
fn chunk_count(chars: usize, window: usize, overlap: usize) -> usize {
    if chars == 0 {
        return 0;
    }
    if chars <= window {
        return 1;
    }
    let stride = window.saturating_sub(overlap).max(1);
    1 + (chars - window).div_ceil(stride)
}
