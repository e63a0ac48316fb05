//! Structured progress and warning events emitted while parsing.

use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Events emitted by the parsing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// An adapter produced its element stream.
    ElementsExtracted {
        source: String,
        elements: usize,
        images: usize,
    },
    /// An image was stored and placed at its position in the stream.
    ImageLocated { path: String },
    /// An image could not be extracted; parsing continued without it.
    ImageSkipped { image: String, reason: String },
    /// The grouper finished.
    SectionsDetected { count: usize, images: usize },
    /// A section exceeded the size bound and was split.
    SectionSplit {
        section: String,
        length: usize,
        chunks: usize,
    },
    /// Images that could not be positioned were distributed.
    OrphanImages { count: usize },
    /// Two chunks of a document hashed to the same id.
    IdCollision { chunk_id: String, resolved: String },
    /// A document was fully chunked.
    DocumentChunked { source: String, chunks: usize },
    /// A file of a batch failed and was skipped.
    BatchFileFailed { path: PathBuf, reason: String },
}

/// Receiver of parse events.
pub trait ParseObserver: Send + Sync {
    fn on_event(&self, event: &ParseEvent);
}

/// Observer that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ParseObserver for TracingObserver {
    fn on_event(&self, event: &ParseEvent) {
        match event {
            ParseEvent::ElementsExtracted {
                source,
                elements,
                images,
            } => debug!("{}: {} elements, {} images", source, elements, images),
            ParseEvent::ImageLocated { path } => debug!("Image located: {}", path),
            ParseEvent::ImageSkipped { image, reason } => {
                warn!("Skipping image {}: {}", image, reason)
            }
            ParseEvent::SectionsDetected { count, images } => {
                debug!("Detected {} sections, {} images placed", count, images)
            }
            ParseEvent::SectionSplit {
                section,
                length,
                chunks,
            } => debug!(
                "Section [{}] too long ({} chars), split into {} chunks",
                section, length, chunks
            ),
            ParseEvent::OrphanImages { count } => {
                warn!("{} images could not be positioned, distributing", count)
            }
            ParseEvent::IdCollision { chunk_id, resolved } => {
                warn!("Chunk id collision on {}, using {}", chunk_id, resolved)
            }
            ParseEvent::DocumentChunked { source, chunks } => {
                info!("Parsed {} ({} chunks)", source, chunks)
            }
            ParseEvent::BatchFileFailed { path, reason } => {
                warn!("Failed to parse {:?}: {}", path, reason)
            }
        }
    }
}
