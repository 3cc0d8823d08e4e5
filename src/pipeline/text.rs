//! Glyphs to words, lines and paragraphs.
//!
//! The assembler buffers one page worth of glyphs and writes them out when
//! the page ends, inside the `p` the walker opened. Paragraph breaks close
//! that `p` and open a new one.

use std::collections::HashMap;

use unicode_bidi::BidiInfo;
use unicode_normalization::UnicodeNormalization;

use super::options::ExtractOptions;
use crate::error::Result;
use crate::model::Glyph;
use crate::render::{Attributes, ContentHandler};

/// Baseline difference, in glyph heights, that starts a new line.
const BASELINE_TOLERANCE: f32 = 0.5;

/// Layout parameters taken from [`ExtractOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TextLayout {
    pub sort_by_position: bool,
    pub enable_auto_space: bool,
    pub suppress_duplicates: bool,
    pub average_char_tolerance: f32,
    pub spacing_tolerance: f32,
    pub drop_threshold: f32,
}

impl From<&ExtractOptions> for TextLayout {
    fn from(options: &ExtractOptions) -> Self {
        Self {
            sort_by_position: options.sort_by_position,
            enable_auto_space: options.enable_auto_space,
            suppress_duplicates: options.suppress_duplicate_overlapping_text,
            average_char_tolerance: options.average_char_tolerance,
            spacing_tolerance: options.spacing_tolerance,
            drop_threshold: options.drop_threshold,
        }
    }
}

/// A finished line with the geometry paragraph detection needs.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    baseline: f32,
    height: f32,
}

pub(crate) struct TextAssembler {
    layout: TextLayout,
    glyphs: Vec<Glyph>,
}

impl TextAssembler {
    pub fn new(layout: TextLayout) -> Self {
        Self {
            layout,
            glyphs: Vec::new(),
        }
    }

    pub fn push(&mut self, glyph: &Glyph) {
        if glyph.is_mapped() {
            self.glyphs.push(glyph.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Drain the buffer into paragraphs of lines.
    pub fn paragraphs(&mut self) -> Vec<Vec<String>> {
        let mut glyphs = std::mem::take(&mut self.glyphs);
        if self.layout.sort_by_position {
            glyphs.sort_by(|a, b| b.y().total_cmp(&a.y()).then(a.x().total_cmp(&b.x())));
        }
        if self.layout.suppress_duplicates {
            glyphs = suppress_duplicates(glyphs);
        }

        let lines = self.lines(&glyphs);
        let mut paragraphs: Vec<Vec<String>> = Vec::new();
        let mut previous: Option<&Line> = None;
        for line in &lines {
            let breaks = match previous {
                None => true,
                Some(prev) => {
                    let drop = prev.baseline - line.baseline;
                    drop > self.layout.drop_threshold * prev.height
                }
            };
            if breaks {
                paragraphs.push(Vec::new());
            }
            if let Some(paragraph) = paragraphs.last_mut() {
                paragraph.push(line.text.clone());
            }
            previous = Some(line);
        }
        paragraphs
    }

    /// Write the buffered text. The caller has a `p` open and closes the
    /// last one itself.
    pub fn flush(&mut self, handler: &mut dyn ContentHandler) -> Result<()> {
        for (i, paragraph) in self.paragraphs().into_iter().enumerate() {
            if i > 0 {
                handler.end_element("p")?;
                handler.start_element("p", &Attributes::new())?;
            }
            for line in paragraph {
                handler.characters(&line)?;
                handler.characters("\n")?;
            }
        }
        Ok(())
    }

    fn lines(&self, glyphs: &[Glyph]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut baseline = 0.0_f32;
        let mut height = 0.0_f32;
        let mut last: Option<&Glyph> = None;
        let mut width_sum = 0.0_f32;
        let mut char_count = 0usize;

        for glyph in glyphs {
            if let Some(prev) = last {
                let tolerance = BASELINE_TOLERANCE * prev.height().min(glyph.height());
                if (glyph.y() - baseline).abs() > tolerance {
                    lines.push(finish_line(&current, baseline, height));
                    current.clear();
                    height = 0.0;
                    width_sum = 0.0;
                    char_count = 0;
                    last = None;
                }
            }

            match last {
                None => baseline = glyph.y(),
                Some(prev) => {
                    let avg_char_width = if char_count > 0 {
                        width_sum / char_count as f32
                    } else {
                        prev.width
                    };
                    if self.needs_space(prev, glyph, avg_char_width)
                        && !current.ends_with(char::is_whitespace)
                        && !glyph.text().starts_with(char::is_whitespace)
                    {
                        current.push(' ');
                    }
                }
            }

            current.push_str(glyph.text());
            height = height.max(glyph.height());
            width_sum += glyph.width;
            char_count += glyph.text().chars().count().max(1);
            last = Some(glyph);
        }
        if !current.is_empty() {
            lines.push(finish_line(&current, baseline, height));
        }
        lines
    }

    fn needs_space(&self, prev: &Glyph, glyph: &Glyph, avg_char_width: f32) -> bool {
        if !self.layout.enable_auto_space {
            return false;
        }
        let gap = glyph.x() - (prev.x() + prev.width);
        let by_char = self.layout.average_char_tolerance * avg_char_width;
        let threshold = match prev.space_width.filter(|w| *w > 0.0) {
            Some(space) => (self.layout.spacing_tolerance * space).min(by_char),
            None => by_char,
        };
        gap > threshold
    }
}

fn finish_line(raw: &str, baseline: f32, height: f32) -> Line {
    Line {
        text: visual_order(&raw.nfkc().collect::<String>()),
        baseline,
        height: height.max(0.1),
    }
}

/// Reorder a right-to-left line for display.
fn visual_order(line: &str) -> String {
    let bidi = BidiInfo::new(line, None);
    if !bidi.has_rtl() {
        return line.to_string();
    }
    match bidi.paragraphs.first() {
        Some(paragraph) => bidi
            .reorder_line(paragraph, paragraph.range.clone())
            .into_owned(),
        None => line.to_string(),
    }
}

/// Drop glyphs repeating an already placed glyph at nearly the same spot,
/// as produced by fake-bold rendering.
fn suppress_duplicates(glyphs: Vec<Glyph>) -> Vec<Glyph> {
    let mut placed: HashMap<String, Vec<(f32, f32, f32)>> = HashMap::new();
    let mut kept = Vec::with_capacity(glyphs.len());
    for glyph in glyphs {
        let tolerance = glyph.width.abs().max(0.1) / 3.0;
        let spots = placed.entry(glyph.text().to_string()).or_default();
        let duplicate = spots.iter().any(|&(x, y, t)| {
            let t = t.max(tolerance);
            (glyph.x() - x).abs() <= t && (glyph.y() - y).abs() <= t
        });
        if !duplicate {
            spots.push((glyph.x(), glyph.y(), tolerance));
            kept.push(glyph);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::EventRecorder;

    fn layout() -> TextLayout {
        TextLayout::from(&ExtractOptions::default())
    }

    fn word(assembler: &mut TextAssembler, text: &str, x: f32, y: f32) -> f32 {
        let mut x = x;
        for ch in text.chars() {
            let mut glyph = Glyph::new(ch.to_string(), x, y, 6.0, 12.0);
            glyph.space_width = Some(3.0);
            assembler.push(&glyph);
            x += 6.0;
        }
        x
    }

    #[test]
    fn test_word_gap_inserts_space() {
        let mut assembler = TextAssembler::new(layout());
        let end = word(&mut assembler, "Hello", 72.0, 700.0);
        word(&mut assembler, "world", end + 5.0, 700.0);
        assert_eq!(assembler.paragraphs(), vec![vec!["Hello world".to_string()]]);
    }

    #[test]
    fn test_auto_space_disabled() {
        let mut options = ExtractOptions::default();
        options.enable_auto_space = false;
        let mut assembler = TextAssembler::new(TextLayout::from(&options));
        let end = word(&mut assembler, "ab", 72.0, 700.0);
        word(&mut assembler, "cd", end + 20.0, 700.0);
        assert_eq!(assembler.paragraphs(), vec![vec!["abcd".to_string()]]);
    }

    #[test]
    fn test_lines_and_paragraphs() {
        let mut assembler = TextAssembler::new(layout());
        word(&mut assembler, "one", 72.0, 700.0);
        word(&mut assembler, "two", 72.0, 686.0);
        // 100pt drop is far beyond 2.5 line heights
        word(&mut assembler, "three", 72.0, 586.0);
        assert_eq!(
            assembler.paragraphs(),
            vec![
                vec!["one".to_string(), "two".to_string()],
                vec!["three".to_string()]
            ]
        );
    }

    #[test]
    fn test_sort_by_position() {
        let mut options = ExtractOptions::default();
        options.sort_by_position = true;
        let mut assembler = TextAssembler::new(TextLayout::from(&options));
        word(&mut assembler, "below", 72.0, 686.0);
        word(&mut assembler, "above", 72.0, 700.0);
        assert_eq!(
            assembler.paragraphs(),
            vec![vec!["above".to_string(), "below".to_string()]]
        );
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut options = ExtractOptions::default();
        options.suppress_duplicate_overlapping_text = true;
        let mut assembler = TextAssembler::new(TextLayout::from(&options));
        word(&mut assembler, "B", 72.0, 700.0);
        word(&mut assembler, "B", 72.5, 700.0);
        word(&mut assembler, "d", 78.0, 700.0);
        assert_eq!(assembler.paragraphs(), vec![vec!["Bd".to_string()]]);
    }

    #[test]
    fn test_ligature_normalized() {
        let mut assembler = TextAssembler::new(layout());
        word(&mut assembler, "\u{FB01}sh", 72.0, 700.0);
        assert_eq!(assembler.paragraphs(), vec![vec!["fish".to_string()]]);
    }

    #[test]
    fn test_rtl_line_reordered() {
        // logical order alef, bet, gimel
        let line = visual_order("\u{05D0}\u{05D1}\u{05D2}");
        assert_eq!(line, "\u{05D2}\u{05D1}\u{05D0}");
        assert_eq!(visual_order("abc"), "abc");
    }

    #[test]
    fn test_flush_splits_paragraphs() {
        let mut assembler = TextAssembler::new(layout());
        word(&mut assembler, "top", 72.0, 700.0);
        word(&mut assembler, "bottom", 72.0, 400.0);
        let mut recorder = EventRecorder::new();
        assembler.flush(&mut recorder).unwrap();
        assert_eq!(recorder.text(), "top\nbottom\n");
        assert_eq!(recorder.elements("p").count(), 1);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_unmapped_glyphs_skipped() {
        let mut assembler = TextAssembler::new(layout());
        assembler.push(&Glyph::unmapped(72.0, 700.0, 6.0, 12.0));
        assert!(assembler.is_empty());
    }
}
