//! Overlapping, boundary-aware chunking of document text.
//!
//! Pages are grouped by document and concatenated without separators. A
//! window of `chunk_size` characters slides over the document text; each cut
//! is pulled back to a paragraph break or a sentence boundary when one lies
//! close to the window edge. Consecutive chunks share exactly
//! `chunk_overlap` characters, so dropping that prefix from every chunk
//! after the first reconstructs the document.

use crate::types::{Chunk, Page};
use docent_core::config::PipelineSettings;
use docent_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

/// Chunking parameters, all in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// How far back from the window edge a natural break may be searched
    pub boundary_window: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            chunk_overlap: 500,
            boundary_window: 500,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            boundary_window: chunk_size / 10,
        }
    }

    pub fn with_boundary_window(mut self, boundary_window: usize) -> Self {
        self.boundary_window = boundary_window;
        self
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            boundary_window: settings.boundary_window(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::InvalidInput(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split pages into chunks, document by document, in input order.
pub fn chunk_pages(pages: &[Page], config: &ChunkConfig) -> AppResult<Vec<Chunk>> {
    config.validate()?;

    let mut documents: Vec<(&str, Vec<&Page>)> = Vec::new();
    for page in pages {
        match documents.iter_mut().find(|(id, _)| *id == page.source_id) {
            Some((_, doc_pages)) => doc_pages.push(page),
            None => documents.push((page.source_id.as_str(), vec![page])),
        }
    }

    let mut chunks = Vec::new();
    for (source_id, doc_pages) in documents {
        let produced = chunk_document(source_id, &doc_pages, config);
        tracing::debug!(
            source = source_id,
            pages = doc_pages.len(),
            chunks = produced.len(),
            "Chunked document"
        );
        chunks.extend(produced);
    }

    tracing::debug!(
        "Chunked {} pages into {} chunks (size: {}, overlap: {})",
        pages.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

fn chunk_document(source_id: &str, pages: &[&Page], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chars: Vec<char> = Vec::new();
    // (offset where the page starts, page number)
    let mut page_starts: Vec<(usize, usize)> = Vec::with_capacity(pages.len());
    for page in pages {
        page_starts.push((chars.len(), page.page_number));
        chars.extend(page.text.chars());
    }

    let len = chars.len();
    let mut chunks = Vec::new();
    if len == 0 {
        return chunks;
    }

    let page_at = |offset: usize| -> usize {
        let idx = page_starts.partition_point(|(start, _)| *start <= offset);
        page_starts[idx.saturating_sub(1)].1
    };

    let mut start = 0;
    loop {
        let window_end = (start + config.chunk_size).min(len);
        let end = if window_end == len {
            len
        } else {
            find_cut(&chars, start, window_end, config)
        };

        let text: String = chars[start..end].iter().collect();
        chunks.push(Chunk {
            chunk_id: chunk_id(source_id, start, end),
            source_id: source_id.to_string(),
            page_number: page_at(start),
            page_end: page_at(end - 1),
            position: chunks.len(),
            start,
            end,
            text,
        });

        if end == len {
            break;
        }
        start = end - config.chunk_overlap;
    }

    chunks
}

/// Choose where a chunk starting at `start` ends, given the hard window edge.
///
/// The cut must leave the chunk longer than the overlap so the next chunk
/// starts strictly later.
fn find_cut(chars: &[char], start: usize, window_end: usize, config: &ChunkConfig) -> usize {
    let lo = window_end
        .saturating_sub(config.boundary_window)
        .max(start + config.chunk_overlap + 1);
    if lo >= window_end {
        return window_end;
    }

    // Paragraph break: cut right after "\n\n"
    for cut in (lo..window_end).rev() {
        if cut >= start + 2 && chars[cut - 1] == '\n' && chars[cut - 2] == '\n' {
            return cut;
        }
    }

    let window: String = chars[start..window_end].iter().collect();
    let mut best = None;
    let mut char_offset = 0;
    let mut byte_cursor = 0;
    for (byte_idx, _) in window.split_sentence_bound_indices() {
        char_offset += window[byte_cursor..byte_idx].chars().count();
        byte_cursor = byte_idx;
        let cut = start + char_offset;
        if cut >= lo && cut < window_end {
            best = Some(cut);
        }
    }

    best.unwrap_or(window_end)
}

fn chunk_id(source_id: &str, start: usize, end: usize) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", source_id, start, end).as_bytes());
    digest.iter().take(16).map(|b| format!("{:02x}", b)).collect()
}
