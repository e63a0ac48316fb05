//! Grouping of an element stream into titled sections.

use crate::error::{IngestError, IngestResult};
use docslice_core::{Element, ElementKind, Section, FALLBACK_SECTION_TITLE, LEADING_SECTION_TITLE};
use regex::Regex;

/// Built-in title patterns: CJK numeral enumerations, Arabic numeral
/// enumerations, chapter markers, parenthesized enumerations.
const DEFAULT_TITLE_PATTERNS: &[&str] = &[
    r"^[一二三四五六七八九十]+[、.]\s*.+",
    r"^\d+[、.]\s*.+",
    r"^第[一二三四五六七八九十\d]+[章节部分]\s*.+",
    r"^[（(]\d+[）)]\s*.+",
];

/// Ordered list of title regexes; the first match wins.
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    patterns: Vec<Regex>,
}

impl TitleMatcher {
    /// Built-in patterns followed by the caller's patterns.
    pub fn new(extra: &[String]) -> IngestResult<Self> {
        let mut patterns = Vec::with_capacity(DEFAULT_TITLE_PATTERNS.len() + extra.len());

        for pattern in DEFAULT_TITLE_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
        {
            let regex = Regex::new(pattern).map_err(|e| IngestError::InvalidTitlePattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            patterns.push(regex);
        }

        Ok(Self { patterns })
    }

    /// Index of the first pattern matching a single-line text.
    pub fn matching_pattern(&self, text: &str) -> Option<usize> {
        let text = text.trim();
        if text.is_empty() || text.contains('\n') {
            return None;
        }
        self.patterns.iter().position(|p| p.is_match(text))
    }

    pub fn is_title(&self, text: &str) -> bool {
        self.matching_pattern(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Partitions elements into sections.
pub struct SectionGrouper<'a> {
    matcher: &'a TitleMatcher,
    split_by_title: bool,
}

impl<'a> SectionGrouper<'a> {
    pub fn new(matcher: &'a TitleMatcher, split_by_title: bool) -> Self {
        Self {
            matcher,
            split_by_title,
        }
    }

    /// Group elements in order.
    ///
    /// Returns at least one section whenever some element carries text or
    /// images; sections without content are dropped.
    pub fn group(&self, elements: &[Element]) -> Vec<Section> {
        if !self.split_by_title {
            return fallback_section(elements).into_iter().collect();
        }

        let mut sections = Vec::new();
        let mut current = Section::new(LEADING_SECTION_TITLE, 0);

        for element in elements {
            let text = element.text.trim();

            if self.starts_section(element) {
                if !current.is_empty() {
                    sections.push(current);
                }
                current = Section::new(text, element.page);
                continue;
            }

            if !has_content(element) {
                continue;
            }
            if current.page == 0 {
                current.page = element.page;
            }
            current.elements.push(element.clone());
        }

        if !current.is_empty() {
            sections.push(current);
        }

        if sections.is_empty() {
            return fallback_section(elements).into_iter().collect();
        }

        sections
    }

    fn starts_section(&self, element: &Element) -> bool {
        if element.text.trim().is_empty() {
            return false;
        }
        match element.kind {
            ElementKind::Heading => true,
            ElementKind::Paragraph => self.matcher.is_title(&element.text),
            ElementKind::Image => false,
        }
    }
}

fn has_content(element: &Element) -> bool {
    !element.text.trim().is_empty() || !element.images.is_empty()
}

/// Collapse the whole stream into one synthetic section.
fn fallback_section(elements: &[Element]) -> Option<Section> {
    let content: Vec<Element> = elements.iter().filter(|e| has_content(e)).cloned().collect();
    if content.is_empty() {
        return None;
    }

    let page = content.iter().map(|e| e.page).find(|p| *p > 0).unwrap_or(0);
    Some(Section {
        title: FALLBACK_SECTION_TITLE.to_string(),
        elements: content,
        page,
    })
}
