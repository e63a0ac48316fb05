//! PDF document adapter.
//!
//! PDF layout analysis is delegated to a [`LayoutPartitioner`]. The adapter
//! only maps typed layout blocks onto elements and places the images the
//! partitioner extracted.

use super::{FormatAdapter, ParseContext, ParsedDocument, SourceDocument};
use crate::error::{IngestError, IngestResult};
use crate::observer::ParseEvent;
use docslice_core::{BlockCategory, Element, LayoutBlock};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blocks and image files produced by a partitioner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutOutput {
    #[serde(default)]
    pub blocks: Vec<LayoutBlock>,
    /// Extracted image files, in document order.
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

/// External layout analysis for PDF files.
pub trait LayoutPartitioner: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this partitioner can handle the document.
    fn available(&self, source: &SourceDocument) -> bool;

    fn partition(&self, source: &SourceDocument) -> IngestResult<LayoutOutput>;
}

/// Reads the output of an external layout tool stored next to the PDF as
/// `<file>.pdf.layout.json`.
///
/// Image paths in the sidecar are relative to the sidecar's directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarPartitioner;

impl SidecarPartitioner {
    pub fn sidecar_path(pdf: &Path) -> PathBuf {
        let mut name = pdf.as_os_str().to_owned();
        name.push(".layout.json");
        PathBuf::from(name)
    }
}

impl LayoutPartitioner for SidecarPartitioner {
    fn name(&self) -> &str {
        "layout sidecar"
    }

    fn available(&self, source: &SourceDocument) -> bool {
        Self::sidecar_path(&source.path).is_file()
    }

    fn partition(&self, source: &SourceDocument) -> IngestResult<LayoutOutput> {
        let sidecar = Self::sidecar_path(&source.path);
        let contents = std::fs::read_to_string(&sidecar)?;
        let mut output: LayoutOutput = serde_json::from_str(&contents)
            .map_err(|e| IngestError::parse(&sidecar, format!("invalid layout sidecar: {}", e)))?;

        let base = sidecar.parent().unwrap_or_else(|| Path::new("."));
        output.images = output
            .images
            .into_iter()
            .map(|image| if image.is_absolute() { image } else { base.join(image) })
            .collect();

        Ok(output)
    }
}

/// Text-only partitioning with `pdf-extract`.
///
/// Pages are split on form feeds and paragraphs on blank lines. No titles
/// or images are detected, so grouping relies on title patterns.
#[cfg(feature = "pdf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextPartitioner;

#[cfg(feature = "pdf")]
impl LayoutPartitioner for PdfTextPartitioner {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn available(&self, _source: &SourceDocument) -> bool {
        true
    }

    fn partition(&self, source: &SourceDocument) -> IngestResult<LayoutOutput> {
        let text = pdf_extract::extract_text_from_mem(&source.bytes).map_err(|e| {
            IngestError::parse(&source.path, format!("Failed to extract text from PDF: {}", e))
        })?;

        Ok(LayoutOutput {
            blocks: text_blocks(&text),
            images: Vec::new(),
        })
    }
}

/// Split extracted text into paragraph blocks with 1-based page numbers.
#[cfg(feature = "pdf")]
fn text_blocks(text: &str) -> Vec<LayoutBlock> {
    let mut blocks = Vec::new();

    for (index, page) in text.split('\x0C').enumerate() {
        let page_number = Some(index as u32 + 1);
        let mut lines: Vec<&str> = Vec::new();

        for line in page.lines().map(str::trim).chain(std::iter::once("")) {
            if !line.is_empty() {
                lines.push(line);
                continue;
            }
            if !lines.is_empty() {
                blocks.push(LayoutBlock {
                    category: BlockCategory::Paragraph,
                    text: lines.join("\n"),
                    page_number,
                });
                lines.clear();
            }
        }
    }

    blocks
}

/// Adapter for PDF files.
///
/// Tries its partitioners in order and uses the first one available.
pub struct PdfAdapter {
    partitioners: Vec<Box<dyn LayoutPartitioner>>,
}

impl PdfAdapter {
    /// Create an adapter with the built-in partitioners.
    pub fn new() -> Self {
        let adapter = Self::empty().with_partitioner(SidecarPartitioner);
        #[cfg(feature = "pdf")]
        let adapter = adapter.with_partitioner(PdfTextPartitioner);
        adapter
    }

    /// Create an adapter without any partitioner.
    pub fn empty() -> Self {
        Self {
            partitioners: Vec::new(),
        }
    }

    /// Append a partitioner; earlier ones take precedence.
    pub fn with_partitioner(mut self, partitioner: impl LayoutPartitioner + 'static) -> Self {
        self.partitioners.push(Box::new(partitioner));
        self
    }

    fn select(&self, source: &SourceDocument) -> IngestResult<&dyn LayoutPartitioner> {
        self.partitioners
            .iter()
            .find(|p| p.available(source))
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                IngestError::MissingDependency(format!(
                    "no PDF layout partitioner available for {}; provide {} or enable the `pdf` feature",
                    source.path.display(),
                    SidecarPartitioner::sidecar_path(&source.path).display()
                ))
            })
    }
}

impl Default for PdfAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for PdfAdapter {
    fn extract(
        &self,
        source: &SourceDocument,
        ctx: &mut ParseContext<'_>,
    ) -> IngestResult<ParsedDocument> {
        let partitioner = self.select(source)?;
        debug!("Partitioning {:?} with {}", source.path, partitioner.name());

        let output = partitioner.partition(source)?;
        let mut images = output
            .images
            .iter()
            .filter_map(|image| ctx.import_image(image))
            .collect::<Vec<_>>()
            .into_iter();

        let mut elements = Vec::new();
        for block in output.blocks {
            let page = block.page_number.unwrap_or(0);
            let text = block.text.trim();
            let element = match block.category {
                BlockCategory::Title if !text.is_empty() => Element::heading(text),
                BlockCategory::Paragraph if !text.is_empty() => Element::paragraph(text),
                BlockCategory::Image => match images.next() {
                    Some(path) => {
                        ctx.observer
                            .on_event(&ParseEvent::ImageLocated { path: path.clone() });
                        Element::image(path)
                    }
                    None => continue,
                },
                _ => continue,
            };
            elements.push(element.with_page(page));
        }

        Ok(ParsedDocument::new(elements).with_orphans(images.collect()))
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageSink;
    use crate::observer::testing::RecordingObserver;
    use docslice_core::ElementKind;
    use tempfile::tempdir;

    fn extract(adapter: &PdfAdapter, path: &Path) -> IngestResult<ParsedDocument> {
        let source = SourceDocument::new(path, b"%PDF-1.4".to_vec());
        let observer = RecordingObserver::default();
        let image_dir = path.parent().unwrap().join("images");
        let sink = ImageSink::for_document(&image_dir, path, &source.bytes, false);
        let mut ctx = ParseContext::new(sink, &observer);
        adapter.extract(&source, &mut ctx)
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            SidecarPartitioner::sidecar_path(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report.pdf.layout.json")
        );
    }

    #[test]
    fn test_sidecar_blocks_and_images() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        std::fs::create_dir(dir.path().join("figures")).unwrap();
        std::fs::write(dir.path().join("figures/fig1.png"), b"one").unwrap();
        std::fs::write(dir.path().join("figures/fig2.jpeg"), b"two").unwrap();
        std::fs::write(
            SidecarPartitioner::sidecar_path(&pdf),
            r#"{
                "blocks": [
                    {"category": "Title", "text": "1. Introduction", "page_number": 1},
                    {"category": "NarrativeText", "text": " Body text. ", "page_number": 1},
                    {"category": "Image", "page_number": 2},
                    {"category": "Footer", "text": "  "}
                ],
                "images": ["figures/fig1.png", "figures/fig2.jpeg"]
            }"#,
        )
        .unwrap();

        let doc = extract(&PdfAdapter::new(), &pdf).unwrap();

        assert_eq!(doc.elements.len(), 3);
        assert_eq!(doc.elements[0].kind, ElementKind::Heading);
        assert_eq!(doc.elements[0].page, 1);
        assert_eq!(doc.elements[1].text, "Body text.");
        assert_eq!(doc.elements[2].kind, ElementKind::Image);
        assert_eq!(doc.elements[2].page, 2);
        assert!(doc.elements[2].images[0].ends_with("report_image1.png"));

        assert_eq!(doc.orphan_images.len(), 1);
        assert!(doc.orphan_images[0].ends_with("report_image2.jpg"));
    }

    #[test]
    fn test_missing_image_file_is_skipped() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(
            SidecarPartitioner::sidecar_path(&pdf),
            r#"{"blocks": [{"category": "Image"}], "images": ["gone.png"]}"#,
        )
        .unwrap();

        let doc = extract(&PdfAdapter::new(), &pdf).unwrap();
        assert!(doc.elements.is_empty());
        assert!(doc.orphan_images.is_empty());
    }

    #[test]
    fn test_invalid_sidecar() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("bad.pdf");
        std::fs::write(SidecarPartitioner::sidecar_path(&pdf), "{ not json").unwrap();

        let err = extract(&PdfAdapter::new(), &pdf).unwrap_err();
        assert!(matches!(err, IngestError::ParseError { .. }));
    }

    #[test]
    fn test_no_partitioner_available() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");

        let err = extract(&PdfAdapter::empty(), &pdf).unwrap_err();
        assert!(matches!(err, IngestError::MissingDependency(_)));

        let err = extract(&PdfAdapter::empty().with_partitioner(SidecarPartitioner), &pdf)
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingDependency(_)));
    }

    struct FixedPartitioner;

    impl LayoutPartitioner for FixedPartitioner {
        fn name(&self) -> &str {
            "fixed"
        }

        fn available(&self, _source: &SourceDocument) -> bool {
            true
        }

        fn partition(&self, _source: &SourceDocument) -> IngestResult<LayoutOutput> {
            Ok(LayoutOutput {
                blocks: vec![LayoutBlock {
                    category: BlockCategory::Paragraph,
                    text: "from fixed".to_string(),
                    page_number: None,
                }],
                images: vec![],
            })
        }
    }

    #[test]
    fn test_first_available_partitioner_wins() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        let adapter = PdfAdapter::empty()
            .with_partitioner(SidecarPartitioner)
            .with_partitioner(FixedPartitioner);

        let doc = extract(&adapter, &pdf).unwrap();
        assert_eq!(doc.elements, vec![Element::paragraph("from fixed")]);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_text_blocks_pages_and_paragraphs() {
        let blocks = text_blocks("1. Scope\n\nfirst line\nsecond line\n\n\n\x0C  Page two  \n");

        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["1. Scope", "first line\nsecond line", "Page two"]);
        assert_eq!(blocks[1].page_number, Some(1));
        assert_eq!(blocks[2].page_number, Some(2));
        assert!(blocks.iter().all(|b| b.category == BlockCategory::Paragraph));
    }
}
