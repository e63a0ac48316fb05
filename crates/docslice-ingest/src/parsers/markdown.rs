//! Markdown document adapter.

use super::{FormatAdapter, ParseContext, ParsedDocument, SourceDocument};
use crate::error::{IngestError, IngestResult};
use crate::observer::ParseEvent;
use docslice_core::{image_token, Element};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use std::ops::Range;
use std::path::Path;

/// A top-level markdown block with its source span.
#[derive(Debug)]
struct Block {
    range: Range<usize>,
    /// Set for ATX headings of level 1 to 3.
    heading: Option<String>,
    /// Image references inside the block: span and destination.
    images: Vec<(Range<usize>, String)>,
}

/// Adapter for Markdown files.
///
/// Top-level blocks become elements carrying their verbatim source, so
/// fenced code keeps its delimiters and is never mistaken for headings.
pub struct MarkdownAdapter;

impl MarkdownAdapter {
    /// Create a new markdown adapter.
    pub fn new() -> Self {
        Self
    }

    fn blocks(markdown: &str) -> Vec<Block> {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(markdown, options);

        let mut blocks: Vec<Block> = Vec::new();
        let mut depth = 0usize;

        for (event, range) in parser.into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if depth == 0 {
                        let heading = match &tag {
                            Tag::Heading(level, _, _)
                                if is_section_level(*level)
                                    && markdown[range.clone()].trim_start().starts_with('#') =>
                            {
                                Some(String::new())
                            }
                            _ => None,
                        };
                        blocks.push(Block {
                            range: range.clone(),
                            heading,
                            images: Vec::new(),
                        });
                    }
                    if let Tag::Image(_, dest, _) = &tag {
                        if let Some(block) = blocks.last_mut() {
                            block.images.push((range.clone(), dest.to_string()));
                        }
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                }
                Event::Text(text) | Event::Code(text) if depth > 0 => {
                    if let Some(heading) = blocks.last_mut().and_then(|b| b.heading.as_mut()) {
                        heading.push_str(&text);
                    }
                }
                Event::Html(_) if depth == 0 => {
                    blocks.push(Block {
                        range,
                        heading: None,
                        images: Vec::new(),
                    });
                }
                _ => {}
            }
        }

        blocks
    }

    /// Turn one block into elements, resolving image references on disk.
    fn block_element(
        markdown: &str,
        block: &Block,
        base_dir: &Path,
        ctx: &mut ParseContext<'_>,
    ) -> Option<Element> {
        if let Some(title) = &block.heading {
            let title = title.trim();
            return (!title.is_empty()).then(|| Element::heading(title));
        }

        let mut text = String::new();
        let mut images = Vec::new();
        let mut cursor = block.range.start;

        for (span, dest) in &block.images {
            let Some(path) = resolve_image(base_dir, dest) else {
                continue;
            };
            text.push_str(&markdown[cursor..span.start]);
            text.push_str(&image_token(&path));
            cursor = span.end;
            ctx.observer
                .on_event(&ParseEvent::ImageLocated { path: path.clone() });
            if !images.contains(&path) {
                images.push(path);
            }
        }
        text.push_str(&markdown[cursor..block.range.end]);

        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if images.len() == 1 && text == image_token(&images[0]) {
            return Some(Element::image(images.remove(0)));
        }

        Some(Element::paragraph(text).with_images(images))
    }
}

fn is_section_level(level: HeadingLevel) -> bool {
    matches!(level, HeadingLevel::H1 | HeadingLevel::H2 | HeadingLevel::H3)
}

/// Local file an image reference points at, if it exists.
fn resolve_image(base_dir: &Path, dest: &str) -> Option<String> {
    if dest.is_empty() || dest.contains("://") || dest.starts_with("data:") {
        return None;
    }
    let full_path = base_dir.join(dest);
    full_path
        .is_file()
        .then(|| full_path.to_string_lossy().to_string())
}

impl Default for MarkdownAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for MarkdownAdapter {
    fn extract(
        &self,
        source: &SourceDocument,
        ctx: &mut ParseContext<'_>,
    ) -> IngestResult<ParsedDocument> {
        let markdown = std::str::from_utf8(&source.bytes)
            .map_err(|e| IngestError::parse(&source.path, format!("invalid UTF-8: {}", e)))?;

        let base_dir = source.base_dir();
        let elements = Self::blocks(markdown)
            .iter()
            .filter_map(|block| Self::block_element(markdown, block, base_dir, ctx))
            .collect();

        Ok(ParsedDocument::new(elements))
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }
}
