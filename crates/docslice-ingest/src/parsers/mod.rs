//! Format adapters turning source files into element streams.

mod docx;
mod markdown;
mod pdf;

pub use docx::DocxAdapter;
pub use markdown::MarkdownAdapter;
#[cfg(feature = "pdf")]
pub use pdf::PdfTextPartitioner;
pub use pdf::{LayoutOutput, LayoutPartitioner, PdfAdapter, SidecarPartitioner};

use crate::error::IngestResult;
use crate::images::ImageSink;
use crate::observer::{ParseEvent, ParseObserver};
use docslice_core::Element;
use std::path::{Path, PathBuf};

/// A source file read once into memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Read a file from disk.
    pub fn read(path: &Path) -> IngestResult<Self> {
        Ok(Self::new(path, std::fs::read(path)?))
    }

    /// Directory relative references are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Per-document state shared with an adapter.
pub struct ParseContext<'a> {
    pub sink: ImageSink,
    pub observer: &'a dyn ParseObserver,
}

impl<'a> ParseContext<'a> {
    pub fn new(sink: ImageSink, observer: &'a dyn ParseObserver) -> Self {
        Self { sink, observer }
    }

    /// Store image bytes; a failure is reported and yields `None`.
    pub fn store_image(&mut self, bytes: &[u8], extension: &str) -> Option<String> {
        match self.sink.write(bytes, extension) {
            Ok(path) => {
                self.observer
                    .on_event(&ParseEvent::ImageLocated { path: path.clone() });
                Some(path)
            }
            Err(e) => {
                self.skip_image("embedded image", e);
                None
            }
        }
    }

    /// Copy an externally produced image; a failure is reported and yields `None`.
    pub fn import_image(&mut self, source: &Path) -> Option<String> {
        match self.sink.import(source) {
            Ok(path) => Some(path),
            Err(e) => {
                self.skip_image(&source.to_string_lossy(), e);
                None
            }
        }
    }

    pub fn skip_image(&self, image: &str, reason: impl std::fmt::Display) {
        self.observer.on_event(&ParseEvent::ImageSkipped {
            image: image.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Elements of a document plus images that have no position.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub elements: Vec<Element>,
    pub orphan_images: Vec<String>,
}

impl ParsedDocument {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            orphan_images: Vec::new(),
        }
    }

    pub fn with_orphans(mut self, orphans: Vec<String>) -> Self {
        self.orphan_images = orphans;
        self
    }

    /// Number of images carried by the elements.
    pub fn positioned_images(&self) -> usize {
        self.elements.iter().map(|e| e.images.len()).sum()
    }
}

/// Trait for format adapters.
pub trait FormatAdapter: Send + Sync {
    /// Produce the element stream of a document.
    fn extract(&self, source: &SourceDocument, ctx: &mut ParseContext<'_>)
        -> IngestResult<ParsedDocument>;

    /// Get the supported file extensions.
    fn extensions(&self) -> &[&str];

    /// Check if this adapter supports the given extension.
    fn supports(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Lower-cased extension of a path.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;
    use tempfile::tempdir;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/B.DOCX")), "docx");
        assert_eq!(extension_of(Path::new("noext")), "");
    }

    #[test]
    fn test_adapter_extensions() {
        assert!(DocxAdapter::new().supports("DOCX"));
        assert!(MarkdownAdapter::new().supports("markdown"));
        assert!(PdfAdapter::new().supports("pdf"));
        assert!(!MarkdownAdapter::new().supports("txt"));
    }

    #[test]
    fn test_context_reports_failed_import() {
        let dir = tempdir().unwrap();
        let observer = RecordingObserver::default();
        let sink = ImageSink::for_document(dir.path(), Path::new("d.pdf"), b"", false);
        let mut ctx = ParseContext::new(sink, &observer);

        assert!(ctx.import_image(&dir.path().join("gone.png")).is_none());
        assert!(matches!(
            observer.events().as_slice(),
            [ParseEvent::ImageSkipped { .. }]
        ));
    }
}
