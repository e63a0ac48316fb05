//! Word (.docx) document adapter.

use super::{FormatAdapter, ParseContext, ParsedDocument, SourceDocument};
use crate::error::{IngestError, IngestResult};
use docslice_core::{image_token, Element};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const DOC_XML_PATH: &str = "word/document.xml";
const STYLES_XML_PATH: &str = "word/styles.xml";
const RELS_XML_PATH: &str = "word/_rels/document.xml.rels";

/// Style name prefixes that mark a heading paragraph.
const HEADING_STYLE_PREFIXES: &[&str] = &["heading", "title", "标题"];

/// Adapter for Word documents.
///
/// Paragraphs are walked in document order. Embedded pictures are written
/// to the image sink and placed between the surrounding text pieces; each
/// table cell becomes one paragraph.
pub struct DocxAdapter;

impl DocxAdapter {
    /// Create a new docx adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for DocxAdapter {
    fn extract(
        &self,
        source: &SourceDocument,
        ctx: &mut ParseContext<'_>,
    ) -> IngestResult<ParsedDocument> {
        let mut package = Package::open(&source.path, &source.bytes)?;
        let xml = package
            .read_entry(DOC_XML_PATH)
            .ok_or_else(|| IngestError::parse(&source.path, "docx missing document.xml"))?;

        let mut walker = Walker::default();
        let mut reader = XmlReader::from_str(&xml);
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| IngestError::parse(&source.path, e))?;
            match event {
                Event::Start(e) => walker.open(&e, false, &mut package, ctx),
                Event::Empty(e) => walker.open(&e, true, &mut package, ctx),
                Event::End(e) => walker.close(e.name().as_ref(), &package),
                Event::Text(t) if walker.in_text => {
                    let text = t
                        .unescape()
                        .map_err(|e| IngestError::parse(&source.path, e))?;
                    walker.push_text(&text);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        debug!(
            "docx {}: {} elements, {} styles, {} relationships",
            source.path.display(),
            walker.elements.len(),
            package.styles.len(),
            package.rels.len()
        );

        Ok(ParsedDocument::new(walker.elements))
    }

    fn extensions(&self) -> &[&str] {
        &["docx"]
    }
}

/// The zip container with its style and relationship tables.
struct Package<'b> {
    archive: ZipArchive<Cursor<&'b [u8]>>,
    /// Style id to style name.
    styles: HashMap<String, String>,
    /// Relationship id to archive entry.
    rels: HashMap<String, String>,
}

impl<'b> Package<'b> {
    fn open(path: &Path, bytes: &'b [u8]) -> IngestResult<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| IngestError::parse(path, format!("failed to open docx archive: {}", e)))?;

        let mut package = Self {
            archive,
            styles: HashMap::new(),
            rels: HashMap::new(),
        };

        if let Some(xml) = package.read_entry(STYLES_XML_PATH) {
            package.styles = parse_styles(&xml);
        }
        if let Some(xml) = package.read_entry(RELS_XML_PATH) {
            package.rels = parse_relationships(&xml);
        }

        Ok(package)
    }

    fn read_entry(&mut self, name: &str) -> Option<String> {
        let mut file = self.archive.by_name(name).ok()?;
        let mut xml = String::new();
        file.read_to_string(&mut xml).ok()?;
        Some(xml)
    }

    /// Bytes and extension of the media a relationship points at.
    fn media(&mut self, rel_id: &str) -> Result<(Vec<u8>, String), String> {
        let target = self
            .rels
            .get(rel_id)
            .ok_or_else(|| format!("no relationship {}", rel_id))?
            .clone();

        let mut file = self
            .archive
            .by_name(&target)
            .map_err(|e| format!("{}: {}", target, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| format!("{}: {}", target, e))?;

        let extension = Path::new(&target)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Ok((bytes, extension))
    }

    fn is_heading_style(&self, style_id: &str) -> bool {
        let name = self.styles.get(style_id).map(String::as_str).unwrap_or("");
        [style_id, name].iter().any(|candidate| {
            let lower = candidate.to_lowercase();
            HEADING_STYLE_PREFIXES
                .iter()
                .any(|prefix| lower.starts_with(prefix))
        })
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn parse_styles(xml: &str) -> HashMap<String, String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut styles = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:style" => {
                current = attribute(&e, b"w:styleId");
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(name)) = (&current, attribute(&e, b"w:val")) {
                    styles.insert(id.clone(), name);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship"
                    && attribute(&e, b"TargetMode").as_deref() != Some("External") =>
            {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target"))
                {
                    let entry = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("word/{}", target),
                    };
                    rels.insert(id, entry);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

#[derive(Debug)]
enum Piece {
    Text(String),
    Image(String),
}

#[derive(Debug, Default)]
struct Paragraph {
    style: Option<String>,
    pieces: Vec<Piece>,
}

impl Paragraph {
    fn push_text(&mut self, text: &str) {
        match self.pieces.last_mut() {
            Some(Piece::Text(current)) => current.push_str(text),
            _ => self.pieces.push(Piece::Text(text.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct Cell {
    lines: Vec<String>,
    images: Vec<String>,
}

/// Builds elements from the event stream of document.xml.
#[derive(Debug, Default)]
struct Walker {
    elements: Vec<Element>,
    /// Open paragraphs; text boxes nest a paragraph inside another.
    paragraphs: Vec<Paragraph>,
    cells: Vec<Cell>,
    in_text: bool,
}

impl Walker {
    fn open(
        &mut self,
        e: &BytesStart<'_>,
        empty: bool,
        package: &mut Package<'_>,
        ctx: &mut ParseContext<'_>,
    ) {
        match e.name().as_ref() {
            b"w:p" if !empty => self.paragraphs.push(Paragraph::default()),
            b"w:tc" if !empty => self.cells.push(Cell::default()),
            b"w:t" => self.in_text = !empty,
            b"w:pStyle" => {
                if let Some(paragraph) = self.paragraphs.last_mut() {
                    paragraph.style = attribute(e, b"w:val");
                }
            }
            b"w:tab" => self.push_text("\t"),
            b"w:br" | b"w:cr" => self.push_text("\n"),
            b"a:blip" => {
                let Some(rel_id) = attribute(e, b"r:embed") else {
                    return;
                };
                match package.media(&rel_id) {
                    Ok((bytes, extension)) => {
                        if let Some(path) = ctx.store_image(&bytes, &extension) {
                            if let Some(paragraph) = self.paragraphs.last_mut() {
                                paragraph.pieces.push(Piece::Image(path));
                            }
                        }
                    }
                    Err(reason) => ctx.skip_image(&rel_id, reason),
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8], package: &Package<'_>) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:p" => {
                if let Some(paragraph) = self.paragraphs.pop() {
                    self.finish_paragraph(paragraph, package);
                }
            }
            b"w:tc" => {
                if let Some(cell) = self.cells.pop() {
                    self.finish_cell(cell);
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.push_text(text);
        }
    }

    fn finish_paragraph(&mut self, paragraph: Paragraph, package: &Package<'_>) {
        if let Some(cell) = self.cells.last_mut() {
            let mut line = String::new();
            for piece in paragraph.pieces {
                match piece {
                    Piece::Text(text) => line.push_str(&text),
                    Piece::Image(path) => {
                        line.push_str(&image_token(&path));
                        cell.images.push(path);
                    }
                }
            }
            cell.lines.push(line);
            return;
        }

        let heading = paragraph
            .style
            .as_deref()
            .is_some_and(|style| package.is_heading_style(style));

        if heading {
            let mut title = String::new();
            let mut images = Vec::new();
            for piece in paragraph.pieces {
                match piece {
                    Piece::Text(text) => title.push_str(&text),
                    Piece::Image(path) => images.push(path),
                }
            }
            let title = title.trim();
            if !title.is_empty() {
                self.elements.push(Element::heading(title));
            }
            self.elements.extend(images.into_iter().map(Element::image));
            return;
        }

        let mut text = String::new();
        for piece in paragraph.pieces {
            match piece {
                Piece::Text(piece) => text.push_str(&piece),
                Piece::Image(path) => {
                    self.flush_text(&mut text);
                    self.elements.push(Element::image(path));
                }
            }
        }
        self.flush_text(&mut text);
    }

    fn flush_text(&mut self, text: &mut String) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.elements.push(Element::paragraph(trimmed));
        }
        text.clear();
    }

    fn finish_cell(&mut self, cell: Cell) {
        let text = cell.lines.join("\n");
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.elements
            .push(Element::paragraph(text).with_images(cell.images));
    }
}
