//! Plain text projection of the content stream.

use super::{Attributes, ContentEvent, ContentHandler};
use crate::error::Result;

/// Elements followed by a line break.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "tr", "thead",
    "tbody", "title", "pre", "blockquote",
];

/// Accumulates character data, breaking lines after block elements and
/// separating table cells with tabs.
#[derive(Debug, Default)]
pub struct TextHandler {
    out: String,
}

impl TextHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}

impl ContentHandler for TextHandler {
    fn start_element(&mut self, name: &str, _attributes: &Attributes) -> Result<()> {
        if name == "p" || name == "li" {
            self.newline();
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        if name == "td" || name == "th" {
            self.out.push('\t');
        } else if BLOCK_ELEMENTS.contains(&name) {
            self.newline();
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.out.push_str(text);
        Ok(())
    }
}

/// Convert recorded events to plain text.
pub fn to_text(events: &[ContentEvent]) -> String {
    let mut handler = TextHandler::new();
    for event in events {
        // TextHandler never fails
        let _ = event.replay(&mut handler);
    }
    handler.into_string().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text() {
        let events = vec![
            ContentEvent::start("div", Attributes::new().with("class", "page")),
            ContentEvent::start("p", Attributes::new()),
            ContentEvent::characters("Hello, world!"),
            ContentEvent::end("p"),
            ContentEvent::start("p", Attributes::new()),
            ContentEvent::characters("Second paragraph."),
            ContentEvent::end("p"),
            ContentEvent::end("div"),
        ];
        assert_eq!(to_text(&events), "Hello, world!\nSecond paragraph.");
    }

    #[test]
    fn test_table_cells() {
        let events = vec![
            ContentEvent::start("tr", Attributes::new()),
            ContentEvent::start("td", Attributes::new()),
            ContentEvent::characters("a"),
            ContentEvent::end("td"),
            ContentEvent::start("td", Attributes::new()),
            ContentEvent::characters("b"),
            ContentEvent::end("td"),
            ContentEvent::end("tr"),
        ];
        assert_eq!(to_text(&events), "a\tb");
    }
}
