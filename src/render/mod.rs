//! The content stream and its serializers.

mod handler;
mod json;
mod result;
pub mod streaming;
mod text;
mod xhtml;

pub use handler::{Attributes, ContentHandler, EmbeddedContentHandler, LimitedHandler, NullHandler};
pub use json::{to_json, JsonFormat};
pub use result::{Extraction, ExtractionStats};
pub use streaming::{stream_extract, ChannelHandler, ContentEvent, EventRecorder, ExtractionStream};
pub use text::{to_text, TextHandler};
pub use xhtml::{to_xhtml, XhtmlWriter};
