//! Size-bounded splitting of section text into chunks.
//!
//! Fenced code regions (a pair of triple backticks and everything between)
//! are located up front and kept out of every splitting decision: a region
//! always lands whole in exactly one chunk and never takes part in overlap.
//! The text itself is never rewritten with markers; regions are tracked as
//! spans next to it.

use docslice_config::{ChunkingConfig, SectionImagePolicy};
use docslice_core::Section;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static FENCED_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fence regex"));

static IMAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMG:([^\]]+)\]").expect("valid image token regex"));

const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// A chunk before identity is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftChunk {
    pub section: String,
    pub page: u32,
    pub text: String,
    pub images: Vec<String>,
}

/// Paths of all inline image tokens in a text, in order, deduplicated.
pub fn inline_image_paths(text: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for caps in IMAGE_TOKEN.captures_iter(text) {
        let path = caps[1].to_string();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Byte spans of fenced code regions.
fn fenced_regions(text: &str) -> Vec<Range<usize>> {
    FENCED_REGION.find_iter(text).map(|m| m.range()).collect()
}

/// A paragraph unit: one trimmed line, or one whole fenced region.
#[derive(Debug, Clone)]
struct Unit<'t> {
    text: &'t str,
    atomic: bool,
    /// Separator to the previous unit as found in the source.
    sep: &'static str,
    len: usize,
}

/// Collects units in source order, recording the separator to the previous one.
struct UnitBuilder<'t> {
    text: &'t str,
    units: Vec<Unit<'t>>,
    prev_end: Option<usize>,
}

impl<'t> UnitBuilder<'t> {
    fn push(&mut self, range: Range<usize>, atomic: bool) {
        let sep = match self.prev_end {
            None => "",
            Some(prev) => {
                let gap = &self.text[prev..range.start];
                if gap.contains('\n') {
                    "\n"
                } else if gap.is_empty() {
                    ""
                } else {
                    " "
                }
            }
        };
        self.prev_end = Some(range.end);
        let slice = &self.text[range];
        self.units.push(Unit {
            text: slice,
            atomic,
            sep,
            len: slice.chars().count(),
        });
    }

    /// One unit per non-blank trimmed line of `text[from..to]`.
    fn push_lines(&mut self, from: usize, to: usize) {
        let mut offset = from;
        for line in self.text[from..to].split('\n') {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let start = offset + (line.len() - line.trim_start().len());
                self.push(start..start + trimmed.len(), false);
            }
            offset += line.len() + 1;
        }
    }
}

/// Split text into paragraph units without breaking fenced regions.
fn paragraph_units(text: &str) -> Vec<Unit<'_>> {
    let mut builder = UnitBuilder {
        text,
        units: Vec::new(),
        prev_end: None,
    };

    let mut pos = 0;
    for region in fenced_regions(text) {
        builder.push_lines(pos, region.start);
        pos = region.end;
        builder.push(region, true);
    }
    builder.push_lines(pos, text.len());

    builder.units
}

fn render(units: &[Unit<'_>], indices: &[usize]) -> String {
    let mut out = String::new();
    for (n, &i) in indices.iter().enumerate() {
        if n > 0 {
            out.push_str(units[i].sep);
        }
        out.push_str(units[i].text);
    }
    out
}

/// Splits one section's text into bounded chunks.
pub struct Segmenter<'a> {
    config: &'a ChunkingConfig,
}

impl<'a> Segmenter<'a> {
    pub fn new(config: &'a ChunkingConfig) -> Self {
        Self { config }
    }

    /// Segment a section and attach its images.
    pub fn segment(&self, section: &Section) -> Vec<DraftChunk> {
        let pieces = self.split_text(&section.text());
        let section_images = section.images();

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut images = match self.config.section_images {
                    SectionImagePolicy::FirstChunk if i == 0 => section_images.clone(),
                    _ => Vec::new(),
                };
                for path in inline_image_paths(&text) {
                    if !images.contains(&path) {
                        images.push(path);
                    }
                }
                DraftChunk {
                    section: section.title.clone(),
                    page: section.page,
                    text,
                    images,
                }
            })
            .collect()
    }

    /// Split text into chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return vec![];
        }

        // If it fits in one chunk, return it
        if text.chars().count() <= self.config.max_chunk_size {
            return vec![text.to_string()];
        }

        if self.config.split_by_paragraph {
            self.split_paragraphs(text)
        } else {
            self.split_window(text)
        }
    }

    /// Paragraph-aware accumulation with one-unit overlap.
    fn split_paragraphs(&self, text: &str) -> Vec<String> {
        let max = self.config.max_chunk_size;
        let units = paragraph_units(text);

        let mut pieces = Vec::new();
        let mut buffer: Vec<usize> = Vec::new();
        let mut buffer_len = 0;

        for (i, unit) in units.iter().enumerate() {
            if unit.len > max {
                if !buffer.is_empty() {
                    pieces.push(render(&units, &buffer));
                    buffer.clear();
                    buffer_len = 0;
                }
                if unit.atomic || !self.config.force_max_size {
                    pieces.push(unit.text.to_string());
                } else {
                    pieces.extend(self.split_window(unit.text));
                }
                continue;
            }

            let joined = if buffer.is_empty() {
                unit.len
            } else {
                buffer_len + unit.sep.len() + unit.len
            };
            if joined <= max {
                buffer.push(i);
                buffer_len = joined;
                continue;
            }

            // Overflow: flush and seed the next chunk with the last unit
            let last = buffer[buffer.len() - 1];
            pieces.push(render(&units, &buffer));
            buffer.clear();

            let seed = &units[last];
            let seeded_len = seed.len + unit.sep.len() + unit.len;
            if self.config.chunk_overlap > 0 && !seed.atomic && seeded_len <= max {
                buffer.push(last);
                buffer.push(i);
                buffer_len = seeded_len;
            } else {
                buffer.push(i);
                buffer_len = unit.len;
            }
        }

        if !buffer.is_empty() {
            pieces.push(render(&units, &buffer));
        }

        pieces
    }

    /// Sliding character window, cutting at sentence ends where possible.
    fn split_window(&self, text: &str) -> Vec<String> {
        let max = self.config.max_chunk_size;
        let overlap = self.config.chunk_overlap;
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let fences = fenced_char_spans(text);
        let regions = protected_char_spans(text, &fences);

        let mut pieces = Vec::new();
        let mut start = 0;

        while start < n {
            let mut end = (start + max).min(n);
            let mut before_region = false;

            if end < n {
                if let Some(cut) = sentence_cut(&chars, start, end, max) {
                    end = cut;
                }
                if let Some(region) = regions.iter().find(|r| r.start < end && end < r.end) {
                    if region.start > start {
                        end = region.start;
                        before_region = true;
                    } else {
                        end = region.end;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }

            if end >= n {
                break;
            }

            // The next window starts at the region when we stopped in front of it
            let mut next = if overlap > 0 && !before_region {
                (start + 1).max(end.saturating_sub(overlap))
            } else {
                end
            };
            // A fence already emitted whole is never repeated as overlap
            for fence in fences.iter() {
                if fence.start < end && next < fence.end {
                    next = next.max(fence.end);
                }
            }
            if let Some(region) = regions.iter().find(|r| r.start < next && next < r.end) {
                next = region.end;
            }
            start = next;
        }

        pieces
    }
}

fn to_char_span(text: &str, r: Range<usize>) -> Range<usize> {
    let start = text[..r.start].chars().count();
    start..start + text[r].chars().count()
}

fn fenced_char_spans(text: &str) -> Vec<Range<usize>> {
    fenced_regions(text)
        .into_iter()
        .map(|r| to_char_span(text, r))
        .collect()
}

/// Char spans that a window cut may not fall into: fenced regions and image tokens.
fn protected_char_spans(text: &str, fences: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut spans = fences.to_vec();
    for m in IMAGE_TOKEN.find_iter(text) {
        let span = to_char_span(text, m.range());
        if !spans.iter().any(|s| s.start <= span.start && span.end <= s.end) {
            spans.push(span);
        }
    }
    spans.sort_by_key(|s| s.start);
    spans
}

/// Nearest sentence terminator in the last 30% of the window; returns the cut after it.
fn sentence_cut(chars: &[char], start: usize, end: usize, max: usize) -> Option<usize> {
    (start..end)
        .rev()
        .take_while(|&k| (k - start) * 10 > max * 7)
        .find(|&k| SENTENCE_TERMINATORS.contains(&chars[k]))
        .map(|k| k + 1)
}
