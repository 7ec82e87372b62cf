//! Fixed-window text chunker with overlap.
//!
//! Splits each [`SourceFile`] into segments of at most `max_size`
//! characters. Segment `i` starts at character offset
//! `i * (max_size - overlap)`, so consecutive segments share exactly
//! `overlap` characters and nothing is lost at a boundary.
//!
//! Each segment is prefixed with a header naming its source:
//!
//! ```text
//! FILE NAME: app/a.ts
//! ###
//! <segment text, NUL characters removed>
//! ```
//!
//! The source id is the path relative to the ingestion root with its first
//! component dropped.
//!
//! # Example
//!
//! ```rust
//! use repo_chat::chunk::chunk_text;
//!
//! let chunks = chunk_text("app/a.ts", &"x".repeat(10_000), 2000, 200).unwrap();
//! assert_eq!(chunks.len(), 6);
//! assert!(chunks[0].content.starts_with("FILE NAME: app/a.ts\n###\n"));
//! ```

use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::models::{Chunk, SourceFile};

/// Separator between the header line and the chunk body.
pub const HEADER_SEPARATOR: &str = "\n###\n";

/// Chunk every source file, in order.
pub fn chunk(
    sources: &[SourceFile],
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, PipelineError> {
    let mut chunks = Vec::new();
    for source in sources {
        let id = source_id(&source.relative_path);
        chunks.extend(chunk_text(&id, &source.raw_content, max_size, overlap)?);
    }
    Ok(chunks)
}

/// Split a single text into header-tagged chunks.
///
/// Returns no chunks for empty text. Fails with [`PipelineError::Config`]
/// when `max_size` is zero or `overlap >= max_size`.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    max_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, PipelineError> {
    let windows = segment_bounds(text, max_size, overlap)?;
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| make_chunk(source_id, index, &text[start..end]))
        .collect())
}

/// Byte ranges of each segment of `text`, measured in characters.
///
/// Exposed for callers that need the raw segments without headers.
pub fn segment_bounds(
    text: &str,
    max_size: usize,
    overlap: usize,
) -> Result<Vec<(usize, usize)>, PipelineError> {
    if max_size == 0 {
        return Err(PipelineError::Config("chunk size must be > 0".to_string()));
    }
    if overlap >= max_size {
        return Err(PipelineError::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, max_size
        )));
    }

    // Byte offset of every char boundary, including the end of the text.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    let len = offsets.len() - 1;

    let step = max_size - overlap;
    let mut bounds = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + max_size).min(len);
        bounds.push((offsets[start], offsets[end]));
        if end == len {
            break;
        }
        start += step;
    }
    Ok(bounds)
}

/// Derive the chunk source id from a root-relative path.
///
/// The first path component is dropped. A single-component path keeps its
/// name so top-level files are still identifiable.
pub fn source_id(relative_path: &str) -> String {
    let parts: Vec<&str> = relative_path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        parts.concat()
    } else {
        parts[1..].join("/")
    }
}

/// Build the final chunk content: header, separator, and NUL-free segment.
pub fn format_content(source_id: &str, segment: &str) -> String {
    format!(
        "FILE NAME: {}{}{}",
        source_id,
        HEADER_SEPARATOR,
        segment.replace('\0', "")
    )
}

fn make_chunk(source_id: &str, index: usize, segment: &str) -> Chunk {
    let content = format_content(source_id, segment);

    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0u8]);
    hasher.update((index as u64).to_le_bytes());
    hasher.update(content.as_bytes());
    let id = format!("{:x}", hasher.finalize());

    Chunk {
        id,
        source_id: source_id.to_string(),
        chunk_index: index,
        content,
        token_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len == 0 {
            0
        } else if len <= overlap {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    fn body(chunk: &Chunk) -> &str {
        let header = format!("FILE NAME: {}{}", chunk.source_id, HEADER_SEPARATOR);
        &chunk.content[header.len()..]
    }

    #[test]
    fn test_count_formula() {
        for &(len, size, overlap) in &[
            (1, 2000, 200),
            (150, 2000, 200),
            (200, 2000, 200),
            (2000, 2000, 200),
            (2001, 2000, 200),
            (10_000, 2000, 200),
            (37, 10, 3),
            (10, 10, 0),
            (11, 10, 0),
        ] {
            let text = "a".repeat(len);
            let chunks = chunk_text("f", &text, size, overlap).unwrap();
            assert_eq!(
                chunks.len(),
                expected_count(len, size, overlap),
                "len={} size={} overlap={}",
                len,
                size,
                overlap
            );
        }
    }

    #[test]
    fn test_ten_thousand_chars_six_chunks_with_overlap() {
        let text: String = (0..10_000)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = chunk_text("lib/big.rs", &text, 2000, 200).unwrap();
        assert_eq!(chunks.len(), 6);

        for pair in chunks.windows(2) {
            let (a, b) = (body(&pair[0]), body(&pair[1]));
            assert!(a.chars().count() <= 2000);
            assert_eq!(&a[a.len() - 200..], &b[..200]);
        }
        assert_eq!(body(&chunks[5]), &text[9000..]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("f", "", 2000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_header_once_and_nul_stripped() {
        let chunks = chunk_text("app/a.ts", "a\0b\0c", 2000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "FILE NAME: app/a.ts\n###\nabc");
        assert_eq!(chunks[0].content.matches("FILE NAME: ").count(), 1);
        assert!(!chunks[0].content.contains('\0'));
    }

    #[test]
    fn test_multibyte_windows_count_chars() {
        let text = "┌─┐".repeat(100); // 300 chars, 900 bytes
        let bounds = segment_bounds(&text, 100, 10).unwrap();
        for &(start, end) in &bounds {
            assert!(text[start..end].chars().count() <= 100);
        }
        assert_eq!(bounds.len(), expected_count(300, 100, 10));
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(matches!(
            chunk_text("f", "abc", 0, 0),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            chunk_text("f", "abc", 10, 10),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_source_id_drops_first_component() {
        assert_eq!(source_id("src/app/a.ts"), "app/a.ts");
        assert_eq!(source_id("repo/README.md"), "README.md");
        assert_eq!(source_id("README.md"), "README.md");
    }

    #[test]
    fn test_chunk_ids_stable_and_unique() {
        let text = "x".repeat(5000);
        let c1 = chunk_text("f", &text, 2000, 200).unwrap();
        let c2 = chunk_text("f", &text, 2000, 200).unwrap();
        assert_eq!(c1, c2);
        let ids: std::collections::HashSet<_> = c1.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), c1.len());
    }

    #[test]
    fn test_chunk_many_sources_keeps_order() {
        let sources = vec![
            SourceFile {
                path: "root/src/a.rs".into(),
                relative_path: "src/a.rs".to_string(),
                raw_content: "fn a() {}".to_string(),
            },
            SourceFile {
                path: "root/src/empty.rs".into(),
                relative_path: "src/empty.rs".to_string(),
                raw_content: String::new(),
            },
            SourceFile {
                path: "root/src/b.rs".into(),
                relative_path: "src/b.rs".to_string(),
                raw_content: "fn b() {}".to_string(),
            },
        ];
        let chunks = chunk(&sources, 2000, 200).unwrap();
        let ids: Vec<_> = chunks.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a.rs", "b.rs"]);
    }
}
