//! Content events as values.
//!
//! [`EventRecorder`] keeps the stream in memory; [`ChannelHandler`] pushes
//! it through a bounded crossbeam channel so a consumer can process a large
//! document while the extraction is still running on another thread.
//!
//! # Example
//!
//! ```no_run
//! use pdfsift::render::{stream_extract, ContentEvent};
//! use pdfsift::{Extractor, Metadata};
//!
//! fn main() -> pdfsift::Result<()> {
//!     let data = std::fs::read("large-document.pdf")?;
//!     let stream = stream_extract(&Extractor::new(), data, Metadata::new(), 256);
//!
//!     for event in stream.events.iter() {
//!         if let ContentEvent::Characters { text } = &event {
//!             print!("{}", text);
//!         }
//!     }
//!     let (_metadata, summary) = stream.finish()?;
//!     println!("{} pages", summary.page_count);
//!     Ok(())
//! }
//! ```

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use super::{Attributes, ContentHandler};
use crate::error::{Error, Result};
use crate::model::Metadata;
use crate::pipeline::{ExtractionSummary, Extractor};

/// One event of the content stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContentEvent {
    StartDocument,
    EndDocument,
    StartElement { name: String, attributes: Attributes },
    EndElement { name: String },
    Characters { text: String },
}

impl ContentEvent {
    pub fn start(name: &str, attributes: Attributes) -> Self {
        ContentEvent::StartElement {
            name: name.to_string(),
            attributes,
        }
    }

    pub fn end(name: &str) -> Self {
        ContentEvent::EndElement {
            name: name.to_string(),
        }
    }

    pub fn characters(text: &str) -> Self {
        ContentEvent::Characters {
            text: text.to_string(),
        }
    }

    /// Check if this is a content-bearing event.
    pub fn has_content(&self) -> bool {
        matches!(self, ContentEvent::Characters { .. })
    }

    /// Get the text if this is a character event.
    pub fn content(&self) -> Option<&str> {
        match self {
            ContentEvent::Characters { text } => Some(text),
            _ => None,
        }
    }

    /// Start of a `div class=page`.
    pub fn is_page_start(&self) -> bool {
        match self {
            ContentEvent::StartElement { name, attributes } => {
                name == "div" && attributes.get("class") == Some("page")
            }
            _ => false,
        }
    }

    /// Element name for start and end events.
    pub fn element_name(&self) -> Option<&str> {
        match self {
            ContentEvent::StartElement { name, .. } | ContentEvent::EndElement { name } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// Deliver this event to a handler.
    pub fn replay(&self, handler: &mut dyn ContentHandler) -> Result<()> {
        match self {
            ContentEvent::StartDocument => handler.start_document(),
            ContentEvent::EndDocument => handler.end_document(),
            ContentEvent::StartElement { name, attributes } => {
                handler.start_element(name, attributes)
            }
            ContentEvent::EndElement { name } => handler.end_element(name),
            ContentEvent::Characters { text } => handler.characters(text),
        }
    }
}

/// Collects the stream in memory. Adjacent character events are merged.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<ContentEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ContentEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ContentEvent> {
        self.events
    }

    /// All character data, concatenated.
    pub fn text(&self) -> String {
        self.events.iter().filter_map(ContentEvent::content).collect()
    }

    /// Number of `div class=page` elements seen.
    pub fn page_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_page_start()).count()
    }

    /// Start events for elements named `name`.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attributes> + 'a {
        self.events.iter().filter_map(move |e| match e {
            ContentEvent::StartElement { name: n, attributes } if n == name => Some(attributes),
            _ => None,
        })
    }
}

impl ContentHandler for EventRecorder {
    fn start_document(&mut self) -> Result<()> {
        self.events.push(ContentEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push(ContentEvent::EndDocument);
        Ok(())
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.events.push(ContentEvent::start(name, attributes.clone()));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.events.push(ContentEvent::end(name));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(ContentEvent::Characters { text: last }) = self.events.last_mut() {
            last.push_str(text);
        } else {
            self.events.push(ContentEvent::characters(text));
        }
        Ok(())
    }
}

/// Sends every event into a channel.
///
/// A dropped receiver fails the next write, which stops the extraction.
pub struct ChannelHandler {
    sender: Sender<ContentEvent>,
}

impl ChannelHandler {
    pub fn new(sender: Sender<ContentEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: ContentEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| Error::Other("event receiver disconnected".to_string()))
    }
}

impl ContentHandler for ChannelHandler {
    fn start_document(&mut self) -> Result<()> {
        self.send(ContentEvent::StartDocument)
    }

    fn end_document(&mut self) -> Result<()> {
        self.send(ContentEvent::EndDocument)
    }

    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.send(ContentEvent::start(name, attributes.clone()))
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.send(ContentEvent::end(name))
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.send(ContentEvent::characters(text))
    }
}

/// A running extraction on a worker thread.
pub struct ExtractionStream {
    /// Events in emission order; closes when the worker finishes
    pub events: Receiver<ContentEvent>,
    handle: JoinHandle<Result<(Metadata, ExtractionSummary)>>,
}

impl ExtractionStream {
    /// Wait for the worker and return the final metadata and summary.
    ///
    /// Events still queued are dropped.
    pub fn finish(self) -> Result<(Metadata, ExtractionSummary)> {
        drop(self.events);
        self.handle
            .join()
            .map_err(|_| Error::Other("extraction thread panicked".to_string()))?
    }
}

/// Extract `data` on a worker thread, feeding events through a channel of
/// the given capacity.
pub fn stream_extract(
    extractor: &Extractor,
    data: Vec<u8>,
    metadata: Metadata,
    capacity: usize,
) -> ExtractionStream {
    let (sender, receiver) = bounded(capacity.max(1));
    let extractor = extractor.clone();
    let handle = std::thread::spawn(move || {
        let mut metadata = metadata;
        let mut handler = ChannelHandler::new(sender);
        let summary = extractor.extract(&data, &mut metadata, &mut handler, None)?;
        Ok((metadata, summary))
    });
    ExtractionStream {
        events: receiver,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_merges_characters() {
        let mut recorder = EventRecorder::new();
        recorder.start_element("p", &Attributes::new()).unwrap();
        recorder.characters("Hel").unwrap();
        recorder.characters("lo").unwrap();
        recorder.characters("").unwrap();
        recorder.end_element("p").unwrap();

        assert_eq!(recorder.events().len(), 3);
        assert_eq!(recorder.text(), "Hello");
    }

    #[test]
    fn test_page_start_predicate() {
        let page = ContentEvent::start("div", Attributes::new().with("class", "page"));
        let other = ContentEvent::start("div", Attributes::new().with("class", "annotation"));
        assert!(page.is_page_start());
        assert!(!other.is_page_start());
        assert_eq!(page.element_name(), Some("div"));
        assert!(!page.has_content());
    }

    #[test]
    fn test_channel_handler_disconnect() {
        let (sender, receiver) = bounded(4);
        let mut handler = ChannelHandler::new(sender);
        handler.characters("a").unwrap();
        assert_eq!(receiver.recv().unwrap(), ContentEvent::characters("a"));
        drop(receiver);
        assert!(handler.characters("b").is_err());
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&ContentEvent::end("p")).unwrap();
        assert_eq!(json, r#"{"event":"end_element","name":"p"}"#);
    }
}
