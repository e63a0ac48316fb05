//! Document parsing orchestration.

use crate::distributor::distribute_images;
use crate::error::{IngestError, IngestResult};
use crate::factory::ChunkFactory;
use crate::grouper::{SectionGrouper, TitleMatcher};
use crate::images::ImageSink;
use crate::observer::{ParseEvent, ParseObserver, TracingObserver};
use crate::parsers::{
    extension_of, DocxAdapter, FormatAdapter, MarkdownAdapter, ParseContext, ParsedDocument,
    PdfAdapter, SourceDocument,
};
use crate::segmenter::Segmenter;
use docslice_config::{BatchConfig, ChunkingConfig, Config};
use docslice_core::{DocumentChunk, Element, Section};
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file of a batch that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of parsing several files.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Chunks of every parsed file, in file order.
    pub chunks: Vec<DocumentChunk>,
    /// Parsed files with their chunk counts.
    pub parsed: Vec<(PathBuf, usize)>,
    pub failures: Vec<FileFailure>,
}

/// Turns documents into chunks.
///
/// The engine keeps no state between calls; every parse gets its own
/// image sink and chunk factory.
pub struct Engine {
    chunking: ChunkingConfig,
    matcher: TitleMatcher,
    image_dir: PathBuf,
    unique_names: bool,
    batch: BatchConfig,
    ignore: Vec<Pattern>,
    observer: Arc<dyn ParseObserver>,
    docx: DocxAdapter,
    markdown: MarkdownAdapter,
    pdf: PdfAdapter,
}

impl Engine {
    /// Create an engine; fails on an invalid config or title pattern.
    pub fn new(chunking: ChunkingConfig, image_dir: impl Into<PathBuf>) -> IngestResult<Self> {
        chunking.validate()?;
        let matcher = TitleMatcher::new(&chunking.title_patterns)?;
        debug!("Compiled {} title patterns", matcher.len());

        Ok(Self {
            chunking,
            matcher,
            image_dir: image_dir.into(),
            unique_names: true,
            batch: BatchConfig::default(),
            ignore: Vec::new(),
            observer: Arc::new(TracingObserver),
            docx: DocxAdapter::new(),
            markdown: MarkdownAdapter::new(),
            pdf: PdfAdapter::new(),
        }
        .with_batch(BatchConfig::default()))
    }

    /// Create an engine from the application config.
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        let image_dir = config.image_dir()?;
        Ok(Self::new(config.chunking.clone(), image_dir)?
            .with_unique_names(config.images.unique_names)
            .with_batch(config.batch.clone()))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ParseObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the PDF adapter, e.g. to plug in another layout partitioner.
    pub fn with_pdf_adapter(mut self, adapter: PdfAdapter) -> Self {
        self.pdf = adapter;
        self
    }

    pub fn with_unique_names(mut self, unique_names: bool) -> Self {
        self.unique_names = unique_names;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.ignore = batch
            .ignore_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();
        self.batch = batch;
        self
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    fn adapter_for(&self, extension: &str) -> Option<&dyn FormatAdapter> {
        let adapters: [&dyn FormatAdapter; 3] = [&self.docx, &self.markdown, &self.pdf];
        adapters.into_iter().find(|a| a.supports(extension))
    }

    /// Parse a document into chunks.
    pub fn parse(&self, path: &Path) -> IngestResult<Vec<DocumentChunk>> {
        let parsed = self.extract(path)?;
        let source_file = path.to_string_lossy();
        Ok(self.chunk_elements(&source_file, &parsed.elements, &parsed.orphan_images))
    }

    /// Parse a document and group it into sections without chunking.
    pub fn sections(&self, path: &Path) -> IngestResult<Vec<Section>> {
        let parsed = self.extract(path)?;
        Ok(self.grouper().group(&parsed.elements))
    }

    fn grouper(&self) -> SectionGrouper<'_> {
        SectionGrouper::new(&self.matcher, self.chunking.split_by_title)
    }

    /// Run the adapter for a file.
    fn extract(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let extension = extension_of(path);
        let adapter = self.adapter_for(&extension).ok_or_else(|| {
            IngestError::UnsupportedFormat(if extension.is_empty() {
                "unknown".to_string()
            } else {
                extension.clone()
            })
        })?;

        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }

        info!("Parsing document: {:?}", path);

        let source = SourceDocument::read(path)?;
        let sink =
            ImageSink::for_document(&self.image_dir, path, &source.bytes, self.unique_names);
        let mut ctx = ParseContext::new(sink, self.observer.as_ref());
        let parsed = adapter.extract(&source, &mut ctx)?;

        self.observer.on_event(&ParseEvent::ElementsExtracted {
            source: path.to_string_lossy().to_string(),
            elements: parsed.elements.len(),
            images: parsed.positioned_images() + parsed.orphan_images.len(),
        });

        Ok(parsed)
    }

    /// Group, segment and identify an element stream.
    ///
    /// `orphans` are images without a position; they are distributed over
    /// the produced chunks.
    pub fn chunk_elements(
        &self,
        source_file: &str,
        elements: &[Element],
        orphans: &[String],
    ) -> Vec<DocumentChunk> {
        let sections = self.grouper().group(elements);
        self.observer.on_event(&ParseEvent::SectionsDetected {
            count: sections.len(),
            images: sections.iter().map(|s| s.images().len()).sum(),
        });

        let segmenter = Segmenter::new(&self.chunking);
        let mut factory = ChunkFactory::new(source_file);
        let mut chunks = Vec::new();

        for section in &sections {
            let drafts = segmenter.segment(section);
            if drafts.len() > 1 {
                self.observer.on_event(&ParseEvent::SectionSplit {
                    section: section.title.clone(),
                    length: section.text().chars().count(),
                    chunks: drafts.len(),
                });
            }

            for draft in drafts {
                let (chunk, collision) = factory.build(draft);
                if let Some(chunk_id) = collision {
                    self.observer.on_event(&ParseEvent::IdCollision {
                        chunk_id,
                        resolved: chunk.chunk_id.clone(),
                    });
                }
                chunks.push(chunk);
            }
        }

        if !orphans.is_empty() {
            self.observer
                .on_event(&ParseEvent::OrphanImages { count: orphans.len() });
            distribute_images(&mut chunks, orphans, self.chunking.distribute_images_evenly);
        }

        self.observer.on_event(&ParseEvent::DocumentChunked {
            source: source_file.to_string(),
            chunks: chunks.len(),
        });

        chunks
    }

    /// Files of a directory selected by the batch settings, sorted by name.
    pub fn batch_files(&self, dir: &Path) -> Vec<PathBuf> {
        let max_depth = if self.batch.recursive { usize::MAX } else { 1 };
        let skip_hidden = self.batch.skip_hidden;

        WalkDir::new(dir)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(skip_hidden && is_hidden(e.file_name())))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| self.batch.accepts(&extension_of(path)))
            .filter(|path| !self.is_ignored(path))
            .collect()
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.ignore.iter().any(|pattern| pattern.matches(name))
    }

    /// Parse several files; a failing file is recorded and skipped.
    ///
    /// `on_file` is called after each file, whatever its outcome.
    pub fn parse_batch(&self, files: &[PathBuf], mut on_file: impl FnMut(&Path)) -> BatchReport {
        let mut report = BatchReport::default();

        for path in files {
            match self.parse(path) {
                Ok(chunks) => {
                    report.parsed.push((path.clone(), chunks.len()));
                    report.chunks.extend(chunks);
                }
                Err(e) => {
                    self.observer.on_event(&ParseEvent::BatchFileFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    report.failures.push(FileFailure {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            on_file(path);
        }

        info!(
            "Batch finished: {} parsed, {} failed, {} chunks",
            report.parsed.len(),
            report.failures.len(),
            report.chunks.len()
        );

        report
    }

    /// Parse every selected file of a directory.
    pub fn parse_directory(&self, dir: &Path) -> IngestResult<BatchReport> {
        if !dir.is_dir() {
            return Err(IngestError::FileNotFound(dir.to_path_buf()));
        }
        let files = self.batch_files(dir);
        debug!("Found {} files in {:?}", files.len(), dir);
        Ok(self.parse_batch(&files, |_| {}))
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;
    use docslice_config::ConfigError;
    use tempfile::{tempdir, TempDir};

    fn chunking(max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_size: max,
            min_chunk_size: 10,
            chunk_overlap: overlap,
            ..ChunkingConfig::default()
        }
    }

    fn engine(chunking: ChunkingConfig) -> (Engine, TempDir) {
        let dir = tempdir().unwrap();
        let engine = Engine::new(chunking, dir.path().join("images")).unwrap();
        (engine, dir)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_two_sections_without_splitting() {
        let (engine, dir) = engine(chunking(100, 20));
        let body_a = "a".repeat(30);
        let body_b = "b".repeat(30);
        let path = write(
            dir.path(),
            "doc.md",
            &format!("## Alpha\n\n{}\n\n## Beta\n\n{}\n", body_a, body_b),
        );

        let chunks = engine.parse(&path).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "Alpha");
        assert_eq!(chunks[0].text, body_a);
        assert_eq!(chunks[1].section, "Beta");
        assert_eq!(chunks[1].source_file, path.to_string_lossy());
        assert_eq!(chunks[1].metadata.text_length, 30);
    }

    #[test]
    fn test_character_window_mode() {
        let mut config = chunking(100, 20);
        config.split_by_paragraph = false;
        let (engine, dir) = engine(config);
        let path = write(dir.path(), "long.md", &"x".repeat(250));

        let chunks = engine.parse(&path).unwrap();

        let lengths: Vec<usize> = chunks.iter().map(|c| c.metadata.text_length).collect();
        assert_eq!(lengths, vec![100, 100, 90]);
        assert!(chunks.iter().all(|c| c.section == "document start"));
    }

    #[test]
    fn test_fenced_block_stays_whole() {
        let (engine, dir) = engine(chunking(100, 20));
        let code = format!("```\n{}\n```", "let x = 1;\n".repeat(45));
        let prose = "Some prose before the code block that is fairly long. ".repeat(3);
        let path = write(
            dir.path(),
            "code.md",
            &format!("# Code\n\n{}\n\n{}\n\nAfter the code.\n", prose.trim(), code),
        );

        let chunks = engine.parse(&path).unwrap();

        let code_chunks: Vec<&DocumentChunk> =
            chunks.iter().filter(|c| c.text.contains("```")).collect();
        assert_eq!(code_chunks.len(), 1);
        assert_eq!(code_chunks[0].text, code);
        assert!(code_chunks[0].text.chars().count() > 500);
        assert!(chunks
            .iter()
            .filter(|c| !c.text.contains("```"))
            .all(|c| c.text.chars().count() <= 100));
    }

    #[test]
    fn test_missing_markdown_image_left_verbatim() {
        let (engine, dir) = engine(chunking(200, 20));
        let path = write(dir.path(), "img.md", "# Pics\n\n![chart](missing/chart.png)\n");

        let chunks = engine.parse(&path).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "![chart](missing/chart.png)");
        assert!(chunks[0].images.is_empty());
    }

    #[test]
    fn test_markdown_image_attached_to_chunk() {
        let (engine, dir) = engine(chunking(200, 20));
        write(dir.path(), "chart.png", "png");
        let path = write(dir.path(), "img.md", "# Pics\n\nSee ![chart](chart.png) below.\n");

        let chunks = engine.parse(&path).unwrap();
        let image = dir.path().join("chart.png").to_string_lossy().to_string();

        assert_eq!(chunks[0].images, vec![image.clone()]);
        assert!(chunks[0].text.contains(&format!("[IMG:{}]", image)));
        assert!(chunks[0].metadata.has_images);
    }

    #[test]
    fn test_reparse_is_deterministic() {
        let (engine, dir) = engine(chunking(120, 30));
        let text = (0..10)
            .map(|i| format!("Line number {} of the document body.", i))
            .collect::<Vec<_>>()
            .join("\n");
        let path = write(dir.path(), "same.md", &text);

        let first: Vec<String> = engine.parse(&path).unwrap().into_iter().map(|c| c.chunk_id).collect();
        let second: Vec<String> = engine.parse(&path).unwrap().into_iter().map(|c| c.chunk_id).collect();

        assert!(first.len() > 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_orphan_images_spread_over_chunks() {
        let (engine, _dir) = engine(chunking(100, 20));
        let elements = vec![
            Element::heading("One"),
            Element::paragraph("first body"),
            Element::heading("Two"),
            Element::paragraph("second body"),
            Element::heading("Three"),
            Element::paragraph("third body"),
        ];
        let orphans: Vec<String> = (1..=5).map(|i| format!("/img/{}.png", i)).collect();

        let chunks = engine.chunk_elements("doc.pdf", &elements, &orphans);

        let counts: Vec<usize> = chunks.iter().map(|c| c.metadata.image_count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_title_patterns_start_sections() {
        let (engine, _dir) = engine(chunking(100, 20));
        let elements = vec![
            Element::paragraph("Preface text."),
            Element::paragraph("一、总则"),
            Element::paragraph("Body of part one."),
            Element::paragraph("第二章 范围"),
            Element::paragraph("Body of chapter two."),
        ];

        let chunks = engine.chunk_elements("doc.docx", &elements, &[]);
        let sections: Vec<&str> = chunks.iter().map(|c| c.section.as_str()).collect();
        assert_eq!(sections, vec!["document start", "一、总则", "第二章 范围"]);
    }

    #[test]
    fn test_split_by_title_disabled() {
        let mut config = chunking(200, 20);
        config.split_by_title = false;
        let (engine, _dir) = engine(config);
        let elements = vec![Element::heading("Head"), Element::paragraph("Body.")];

        let chunks = engine.chunk_elements("doc.md", &elements, &[]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "document content");
    }

    #[test]
    fn test_unsupported_format_checked_first() {
        let (engine, dir) = engine(chunking(100, 20));

        let err = engine.parse(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ext) if ext == "txt"));

        let err = engine.parse(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let dir = tempdir().unwrap();

        let mut bad_pattern = chunking(100, 20);
        bad_pattern.title_patterns = vec!["([unclosed".to_string()];
        assert!(matches!(
            Engine::new(bad_pattern, dir.path()),
            Err(IngestError::InvalidTitlePattern { .. })
        ));

        assert!(matches!(
            Engine::new(chunking(100, 100), dir.path()),
            Err(IngestError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_observer_receives_events() {
        let observer = Arc::new(RecordingObserver::default());
        let (engine, dir) = engine(chunking(100, 20));
        let engine = engine.with_observer(observer.clone());
        let path = write(dir.path(), "doc.md", "# A\n\nBody.\n");

        engine.parse(&path).unwrap();

        let events = observer.events();
        assert!(matches!(
            events.first(),
            Some(ParseEvent::ElementsExtracted { elements: 2, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(ParseEvent::DocumentChunked { chunks: 1, .. })
        ));
    }

    #[test]
    fn test_pdf_without_partitioner() {
        let (engine, dir) = engine(chunking(100, 20));
        let engine = engine.with_pdf_adapter(PdfAdapter::empty());
        let path = write(dir.path(), "doc.pdf", "%PDF-1.4");

        let err = engine.parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::MissingDependency(_)));
    }

    #[test]
    fn test_parse_directory_isolates_failures() {
        let (engine, dir) = engine(chunking(100, 20));
        let docs = dir.path().join("docs");
        write(&docs, "good.md", "# Good\n\nFine content.\n");
        write(&docs, "broken.docx", "not a zip archive");
        write(&docs, "notes.txt", "ignored extension");
        write(&docs, ".hidden.md", "# Hidden\n");
        write(&docs, "~$lock.docx", "lock file");
        write(&docs, "nested/deep.md", "# Deep\n\nNested.\n");

        let report = engine.parse_directory(&docs).unwrap();

        assert_eq!(report.parsed.len(), 1);
        assert_eq!(report.parsed[0].0, docs.join("good.md"));
        assert_eq!(report.parsed[0].1, 1);
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, docs.join("broken.docx"));
    }

    #[test]
    fn test_recursive_batch() {
        let (engine, dir) = engine(chunking(100, 20));
        let engine = engine.with_batch(BatchConfig {
            recursive: true,
            ..BatchConfig::default()
        });
        let docs = dir.path().join("docs");
        write(&docs, "a.md", "A.\n");
        write(&docs, "nested/b.md", "B.\n");
        write(&docs, ".git/c.md", "C.\n");

        let files = engine.batch_files(&docs);
        assert_eq!(files, vec![docs.join("a.md"), docs.join("nested/b.md")]);
    }

    #[test]
    fn test_parse_directory_requires_directory() {
        let (engine, dir) = engine(chunking(100, 20));
        let err = engine.parse_directory(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound(_)));
    }
}
