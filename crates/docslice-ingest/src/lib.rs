//! Docslice Ingest - Document parsing and chunking engine.
//!
//! This crate provides:
//! - Format adapters (docx, markdown, PDF via a layout partitioner)
//! - Section grouping by headings and title patterns
//! - Size-bounded chunk segmentation that never splits fenced code
//! - Orphan image distribution and deterministic chunk identity
//! - Batch parsing of directories with per-file failure isolation

mod distributor;
mod engine;
mod error;
mod factory;
mod grouper;
mod images;
mod observer;
pub mod parsers;
mod segmenter;

pub use distributor::distribute_images;
pub use engine::{BatchReport, Engine, FileFailure};
pub use error::{IngestError, IngestResult};
pub use factory::ChunkFactory;
pub use grouper::{SectionGrouper, TitleMatcher};
pub use images::ImageSink;
pub use observer::{ParseEvent, ParseObserver, TracingObserver};
pub use segmenter::{DraftChunk, Segmenter};
