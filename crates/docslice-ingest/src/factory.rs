//! Identity and metadata for produced chunks.

use crate::segmenter::DraftChunk;
use docslice_core::{ChunkMetadata, DocumentChunk};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Length of a chunk id in hex characters.
const CHUNK_ID_LEN: usize = 12;

/// Number of leading text characters covered by the id.
const ID_TEXT_PREFIX: usize = 100;

/// Stamps ids on the chunks of one document.
///
/// The id is a truncated SHA-256 of `source_file:section:text[..100]`. A
/// repeated id within the document is re-derived with a `#n` suffix on the
/// key, so ids stay unique and the sequence stays deterministic.
pub struct ChunkFactory {
    source_file: String,
    seen: HashSet<String>,
}

impl ChunkFactory {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            seen: HashSet::new(),
        }
    }

    /// Id derived from a section and chunk text.
    pub fn chunk_id(source_file: &str, section: &str, text: &str) -> String {
        let prefix: String = text.chars().take(ID_TEXT_PREFIX).collect();
        digest(&format!("{}:{}:{}", source_file, section, prefix))
    }

    /// Build a chunk; returns it with the colliding id when one was resolved.
    pub fn build(&mut self, draft: DraftChunk) -> (DocumentChunk, Option<String>) {
        let base = Self::chunk_id(&self.source_file, &draft.section, &draft.text);
        let mut chunk_id = base.clone();
        let mut collision = None;

        if self.seen.contains(&chunk_id) {
            let prefix: String = draft.text.chars().take(ID_TEXT_PREFIX).collect();
            let key = format!("{}:{}:{}", self.source_file, draft.section, prefix);
            let mut n = 1;
            while self.seen.contains(&chunk_id) {
                chunk_id = digest(&format!("{}#{}", key, n));
                n += 1;
            }
            collision = Some(base);
        }
        self.seen.insert(chunk_id.clone());

        let metadata = ChunkMetadata {
            has_images: !draft.images.is_empty(),
            image_count: draft.images.len(),
            text_length: draft.text.chars().count(),
        };

        let chunk = DocumentChunk {
            chunk_id,
            text: draft.text,
            source_file: self.source_file.clone(),
            section: draft.section,
            page_number: draft.page,
            images: draft.images,
            metadata,
        };

        (chunk, collision)
    }
}

fn digest(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)[..CHUNK_ID_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(section: &str, text: &str) -> DraftChunk {
        DraftChunk {
            section: section.to_string(),
            page: 1,
            text: text.to_string(),
            images: vec!["/a.png".to_string()],
        }
    }

    #[test]
    fn test_id_shape_and_determinism() {
        let id = ChunkFactory::chunk_id("doc.md", "Intro", "Hello");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, ChunkFactory::chunk_id("doc.md", "Intro", "Hello"));
        assert_ne!(id, ChunkFactory::chunk_id("doc.md", "Other", "Hello"));
    }

    #[test]
    fn test_id_covers_first_hundred_chars_only() {
        let base = "x".repeat(100);
        let a = ChunkFactory::chunk_id("f", "s", &format!("{}AAA", base));
        let b = ChunkFactory::chunk_id("f", "s", &format!("{}BBB", base));
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_metadata() {
        let mut factory = ChunkFactory::new("doc.md");
        let (chunk, collision) = factory.build(draft("Intro", "Some text"));

        assert!(collision.is_none());
        assert_eq!(chunk.source_file, "doc.md");
        assert_eq!(chunk.page_number, 1);
        assert_eq!(chunk.metadata.text_length, 9);
        assert_eq!(chunk.metadata.image_count, 1);
        assert!(chunk.metadata.has_images);
        assert_eq!(chunk.chunk_id, ChunkFactory::chunk_id("doc.md", "Intro", "Some text"));
    }

    #[test]
    fn test_collision_is_disambiguated_deterministically() {
        let build_all = || {
            let mut factory = ChunkFactory::new("doc.md");
            let (a, _) = factory.build(draft("S", "same text"));
            let (b, collision) = factory.build(draft("S", "same text"));
            let (c, _) = factory.build(draft("S", "same text"));
            (a, b, c, collision)
        };

        let (a, b, c, collision) = build_all();
        assert_ne!(a.chunk_id, b.chunk_id);
        assert_ne!(b.chunk_id, c.chunk_id);
        assert_ne!(a.chunk_id, c.chunk_id);
        assert_eq!(collision, Some(a.chunk_id.clone()));
        assert_eq!(b.chunk_id.len(), 12);

        let (a2, b2, c2, _) = build_all();
        assert_eq!((a.chunk_id, b.chunk_id, c.chunk_id), (a2.chunk_id, b2.chunk_id, c2.chunk_id));
    }
}
