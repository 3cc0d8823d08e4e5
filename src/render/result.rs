//! Extraction result with metadata and statistics.

use serde::{Deserialize, Serialize};

use super::ContentEvent;
use crate::model::Metadata;
use crate::pipeline::ExtractionSummary;

/// A finished extraction: the recorded stream, the metadata record and the
/// warnings of a partial extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub metadata: Metadata,

    pub events: Vec<ContentEvent>,

    /// Messages of the errors that were downgraded to warnings
    pub warnings: Vec<String>,

    pub stats: ExtractionStats,
}

impl Extraction {
    pub fn new(metadata: Metadata, events: Vec<ContentEvent>, summary: &ExtractionSummary) -> Self {
        let mut stats = ExtractionStats::from_events(&events);
        stats.ocr_page_count = summary.ocr_page_count as u32;
        stats.unmapped_char_count = summary.unmapped_chars as u32;
        stats.embedded_count = summary.embedded_count as u32;
        Self {
            metadata,
            events,
            warnings: summary.warnings.iter().map(ToString::to_string).collect(),
            stats,
        }
    }

    /// True when some errors were caught along the way.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn text(&self) -> String {
        super::to_text(&self.events)
    }
}

/// Statistics over the content stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Number of page divs
    pub page_count: u32,

    pub paragraph_count: u32,

    pub table_count: u32,

    pub image_count: u32,

    pub link_count: u32,

    pub list_item_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,

    pub unmapped_char_count: u32,

    pub ocr_page_count: u32,

    pub embedded_count: u32,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count elements and text in a recorded stream.
    pub fn from_events(events: &[ContentEvent]) -> Self {
        let mut stats = Self::new();
        for event in events {
            if event.is_page_start() {
                stats.add_page();
                continue;
            }
            match event {
                ContentEvent::StartElement { name, .. } => match name.as_str() {
                    "p" => stats.add_paragraph(),
                    "table" => stats.add_table(),
                    "img" => stats.add_image(),
                    "a" => stats.add_link(),
                    "li" => stats.add_list_item(),
                    _ => {}
                },
                ContentEvent::Characters { text } => stats.count_text(text),
                _ => {}
            }
        }
        stats
    }

    pub fn add_page(&mut self) {
        self.page_count += 1;
    }

    pub fn add_paragraph(&mut self) {
        self.paragraph_count += 1;
    }

    pub fn add_table(&mut self) {
        self.table_count += 1;
    }

    pub fn add_image(&mut self) {
        self.image_count += 1;
    }

    pub fn add_link(&mut self) {
        self.link_count += 1;
    }

    pub fn add_list_item(&mut self) {
        self.list_item_count += 1;
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.page_count += other.page_count;
        self.paragraph_count += other.paragraph_count;
        self.table_count += other.table_count;
        self.image_count += other.image_count;
        self.link_count += other.link_count;
        self.list_item_count += other.list_item_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
        self.unmapped_char_count += other.unmapped_char_count;
        self.ocr_page_count += other.ocr_page_count;
        self.embedded_count += other.embedded_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Attributes;

    #[test]
    fn test_count_text() {
        let mut stats = ExtractionStats::new();
        stats.count_text("Hello, world! This is a test.");
        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.char_count, 24);
    }

    #[test]
    fn test_from_events() {
        let events = vec![
            ContentEvent::start("div", Attributes::new().with("class", "page")),
            ContentEvent::start("p", Attributes::new()),
            ContentEvent::characters("two words"),
            ContentEvent::start("a", Attributes::new().with("href", "https://example.com")),
            ContentEvent::end("a"),
            ContentEvent::end("p"),
            ContentEvent::start("img", Attributes::new()),
            ContentEvent::end("img"),
            ContentEvent::end("div"),
        ];
        let stats = ExtractionStats::from_events(&events);
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.paragraph_count, 1);
        assert_eq!(stats.link_count, 1);
        assert_eq!(stats.image_count, 1);
        assert_eq!(stats.word_count, 2);
    }

    #[test]
    fn test_merge() {
        let mut a = ExtractionStats {
            paragraph_count: 5,
            ocr_page_count: 1,
            ..Default::default()
        };
        let b = ExtractionStats {
            paragraph_count: 3,
            image_count: 4,
            ocr_page_count: 2,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.paragraph_count, 8);
        assert_eq!(a.image_count, 4);
        assert_eq!(a.ocr_page_count, 3);
    }
}
