//! Core domain types for docslice.

use serde::{Deserialize, Serialize};

/// Unique identifier for chunks (12 hex characters).
pub type ChunkId = String;

/// Prefix of the inline image placeholder token.
pub const IMAGE_TOKEN_PREFIX: &str = "[IMG:";

/// Title of the section holding content that precedes the first title.
pub const LEADING_SECTION_TITLE: &str = "document start";

/// Title of the synthetic section used when no section was detected.
pub const FALLBACK_SECTION_TITLE: &str = "document content";

/// Render the inline placeholder token for an image path.
pub fn image_token(path: &str) -> String {
    format!("{}{}]", IMAGE_TOKEN_PREFIX, path)
}

/// Kind of a parsed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Heading,
    Paragraph,
    Image,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
            ElementKind::Image => "image",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed unit of a source document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    /// Text content; empty for images.
    pub text: String,
    /// Externally stored image paths co-located with this element.
    pub images: Vec<String>,
    /// Page number, 0 if unknown.
    pub page: u32,
}

impl Element {
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Heading,
            text: text.into(),
            images: Vec::new(),
            page: 0,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Paragraph,
            text: text.into(),
            images: Vec::new(),
            page: 0,
        }
    }

    pub fn image(path: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Image,
            text: String::new(),
            images: vec![path.into()],
            page: 0,
        }
    }

    /// Attach inline images (their tokens are expected to be in `text`).
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Text this element contributes to its section.
    ///
    /// Images contribute one placeholder token per path.
    pub fn section_text(&self) -> String {
        match self.kind {
            ElementKind::Image => self
                .images
                .iter()
                .map(|p| image_token(p))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.text.clone(),
        }
    }
}

/// A contiguous run of elements between two detected titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub elements: Vec<Element>,
    pub page: u32,
}

impl Section {
    pub fn new(title: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
            page,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements' text joined by newline, image tokens included.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .map(Element::section_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All image paths of the section in order of appearance.
    pub fn images(&self) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();
        for path in self.elements.iter().flat_map(|e| e.images.iter()) {
            if !images.contains(path) {
                images.push(path.clone());
            }
        }
        images
    }
}

/// Derived metadata of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub has_images: bool,
    pub image_count: usize,
    pub text_length: usize,
}

/// The engine's output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: ChunkId,
    pub text: String,
    pub source_file: String,
    pub section: String,
    pub page_number: u32,
    pub images: Vec<String>,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Recompute `metadata` from the current text and images.
    pub fn refresh_metadata(&mut self) {
        self.metadata = ChunkMetadata {
            has_images: !self.images.is_empty(),
            image_count: self.images.len(),
            text_length: self.text.chars().count(),
        };
    }

    /// Append images not already attached, keeping order.
    pub fn attach_images<'a>(&mut self, images: impl IntoIterator<Item = &'a String>) {
        for path in images {
            if !self.images.contains(path) {
                self.images.push(path.clone());
            }
        }
        self.refresh_metadata();
    }
}

/// Category of a block produced by an external layout partitioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockCategory {
    Title,
    Paragraph,
    Image,
}

impl BlockCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCategory::Title => "Title",
            BlockCategory::Paragraph => "Paragraph",
            BlockCategory::Image => "Image",
        }
    }
}

impl From<&str> for BlockCategory {
    /// Map partitioner category names; anything textual that is not a
    /// title is a paragraph.
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "title" | "header" | "heading" => BlockCategory::Title,
            "image" | "figure" | "picture" => BlockCategory::Image,
            _ => BlockCategory::Paragraph,
        }
    }
}

impl From<String> for BlockCategory {
    fn from(s: String) -> Self {
        BlockCategory::from(s.as_str())
    }
}

impl From<BlockCategory> for String {
    fn from(c: BlockCategory) -> Self {
        c.as_str().to_string()
    }
}

/// A typed block from an external layout partitioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub category: BlockCategory,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub page_number: Option<u32>,
}
