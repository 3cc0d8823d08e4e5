//! XHTML serialization of the content stream.

use std::io::Write;

use quick_xml::escape::escape;

use super::{Attributes, ContentEvent, ContentHandler};
use crate::error::{Error, Result};
use crate::model::Metadata;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Elements written as `<name/>`.
const VOID_ELEMENTS: &[&str] = &["img", "br", "hr", "meta"];

/// Writes the stream as an XHTML document.
///
/// The `head` carries one `meta` per metadata value known when the writer
/// was created, plus the title.
pub struct XhtmlWriter<W: Write> {
    out: W,
    head: Metadata,
}

impl<W: Write> XhtmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            head: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.head = metadata.clone();
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, s: &str) -> Result<()> {
        self.out.write_all(s.as_bytes()).map_err(Error::Io)
    }

    fn write_head(&mut self) -> Result<()> {
        let mut head = String::from("<head>");
        for (key, values) in self.head.iter() {
            for value in values {
                head.push_str(&format!(
                    "<meta name=\"{}\" content=\"{}\"/>",
                    escape(key),
                    escape(value.as_str())
                ));
            }
        }
        match self.head.get(crate::model::keys::TITLE) {
            Some(title) => head.push_str(&format!("<title>{}</title>", escape(title))),
            None => head.push_str("<title/>"),
        }
        head.push_str("</head>");
        self.write(&head)
    }
}

impl<W: Write> ContentHandler for XhtmlWriter<W> {
    fn start_document(&mut self) -> Result<()> {
        self.write(&format!("<html xmlns=\"{XHTML_NS}\">"))?;
        self.write_head()?;
        self.write("<body>")
    }

    fn end_document(&mut self) -> Result<()> {
        self.write("</body></html>")?;
        self.out.flush().map_err(Error::Io)
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        let mut tag = format!("<{name}");
        for (key, value) in attributes.iter() {
            tag.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        tag.push_str(if VOID_ELEMENTS.contains(&name) { "/>" } else { ">" });
        self.write(&tag)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        if VOID_ELEMENTS.contains(&name) {
            return Ok(());
        }
        self.write(&format!("</{name}>"))
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        let escaped = escape(text);
        self.write(&escaped)
    }
}

/// Serialize recorded events to an XHTML string.
pub fn to_xhtml(events: &[ContentEvent], metadata: &Metadata) -> Result<String> {
    let mut writer = XhtmlWriter::new(Vec::new()).with_metadata(metadata);
    for event in events {
        event.replay(&mut writer)?;
    }
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::keys;

    #[test]
    fn test_escaping_and_void_elements() {
        let events = vec![
            ContentEvent::StartDocument,
            ContentEvent::start("p", Attributes::new()),
            ContentEvent::characters("a < b & c"),
            ContentEvent::end("p"),
            ContentEvent::start("img", Attributes::new().with("src", "embedded:image0.png")),
            ContentEvent::end("img"),
            ContentEvent::EndDocument,
        ];
        let mut metadata = Metadata::new();
        metadata.set(keys::TITLE, "R&D");

        let xhtml = to_xhtml(&events, &metadata).unwrap();
        assert!(xhtml.starts_with("<html xmlns=\"http://www.w3.org/1999/xhtml\"><head>"));
        assert!(xhtml.contains("<title>R&amp;D</title>"));
        assert!(xhtml.contains("<p>a &lt; b &amp; c</p>"));
        assert!(xhtml.contains("<img src=\"embedded:image0.png\"/>"));
        assert!(!xhtml.contains("</img>"));
        assert!(xhtml.ends_with("</body></html>"));
    }
}
