//! Page-model providers and the content stream interpreter.

pub mod backend;
pub mod content;
mod date;
mod graph;
mod lopdf_backend;
mod memory;

pub use backend::{
    decode_text_simple, DocumentLoader, EmbeddedDocumentExtractor, GlyphVisitor, OcrEngine,
    PageModelProvider, PageRenderer, PasswordProvider, RenderRequest, RenderedPage,
};
pub use content::{ContentInterpreter, ContentOp, FontMetrics, FormXObject, PdfValue, ResourceScope};
pub use date::parse_pdf_date;
pub use lopdf_backend::{LopdfLoader, LopdfProvider};
pub use memory::{InMemoryLoader, InMemoryProvider};
