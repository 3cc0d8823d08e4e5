//! The tagged content stream.
//!
//! Extraction output is a sequence of element and character events, in the
//! shape of an XHTML body. Everything downstream (serializers, the event
//! recorder, the streaming channel) is a [`ContentHandler`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordered element attributes. Setting a name that is already present
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Attributes::set`].
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    /// Set only when `value` is present.
    pub fn set_opt(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Receives the content stream of one extraction.
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()>;

    fn end_element(&mut self, name: &str) -> Result<()>;

    fn characters(&mut self, text: &str) -> Result<()>;
}

impl<H: ContentHandler + ?Sized> ContentHandler for &mut H {
    fn start_document(&mut self) -> Result<()> {
        (**self).start_document()
    }

    fn end_document(&mut self) -> Result<()> {
        (**self).end_document()
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        (**self).start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        (**self).end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        (**self).characters(text)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl ContentHandler for NullHandler {
    fn start_element(&mut self, _name: &str, _attributes: &Attributes) -> Result<()> {
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn characters(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Forwards to another handler but swallows the document boundaries, so
/// nested output (OCR text, embedded documents) lands inside the parent.
pub struct EmbeddedContentHandler<'h> {
    inner: &'h mut dyn ContentHandler,
}

impl<'h> EmbeddedContentHandler<'h> {
    pub fn new(inner: &'h mut dyn ContentHandler) -> Self {
        Self { inner }
    }
}

impl ContentHandler for EmbeddedContentHandler<'_> {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.inner.start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.inner.end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.inner.characters(text)
    }
}

/// Caps the number of characters passed through.
///
/// The write that crosses the limit is truncated to fit, then the handler
/// fails with [`Error::WriteLimitReached`]; so does every later write.
pub struct LimitedHandler<H> {
    inner: H,
    limit: usize,
    written: usize,
    reached: bool,
}

impl<H: ContentHandler> LimitedHandler<H> {
    pub fn new(inner: H, limit: usize) -> Self {
        Self {
            inner,
            limit,
            written: 0,
            reached: false,
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.reached
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: ContentHandler> ContentHandler for LimitedHandler<H> {
    fn start_document(&mut self) -> Result<()> {
        self.inner.start_document()
    }

    fn end_document(&mut self) -> Result<()> {
        self.inner.end_document()
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.inner.start_element(name, attributes)
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.inner.end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if self.reached {
            return Err(Error::WriteLimitReached(self.limit));
        }
        let count = text.chars().count();
        if self.written + count <= self.limit {
            self.written += count;
            return self.inner.characters(text);
        }

        let room = self.limit - self.written;
        let cut = text.char_indices().nth(room).map(|(i, _)| i).unwrap_or(text.len());
        if cut > 0 {
            self.inner.characters(&text[..cut])?;
        }
        self.written = self.limit;
        self.reached = true;
        Err(Error::WriteLimitReached(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::EventRecorder;

    #[test]
    fn test_attributes_replace_in_place() {
        let mut attrs = Attributes::new().with("class", "action").with("type", "Launch");
        attrs.set("class", "embedded");
        attrs.set_opt("id", None);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.iter().next(), Some(("class", "embedded")));
    }

    #[test]
    fn test_limited_handler_truncates() {
        let mut limited = LimitedHandler::new(EventRecorder::new(), 5);
        limited.characters("abc").unwrap();
        let err = limited.characters("defgh").unwrap_err();
        assert!(matches!(err, Error::WriteLimitReached(5)));
        assert!(limited.limit_reached());
        assert!(limited.characters("x").is_err());
        assert_eq!(limited.into_inner().text(), "abcde");
    }

    #[test]
    fn test_embedded_handler_hides_document_events() {
        let mut recorder = EventRecorder::new();
        {
            let mut embedded = EmbeddedContentHandler::new(&mut recorder);
            embedded.start_document().unwrap();
            embedded.characters("ocr text").unwrap();
            embedded.end_document().unwrap();
        }
        assert_eq!(recorder.events().len(), 1);
    }
}
