//! Collaborator interfaces.
//!
//! The pipeline never touches a concrete PDF library, rasterizer or OCR
//! engine. Everything it consumes goes through the traits below, so the
//! lopdf provider, the in-memory provider and test doubles are
//! interchangeable.

use image::DynamicImage;

use crate::error::Result;
use crate::model::{Document, Glyph, ImagePayload, Matrix, Metadata, ObjectId, PageImage};
use crate::pipeline::options::{ColorSpace, RenderStrategy};
use crate::render::ContentHandler;

/// Receives the glyphs of one page in content-stream order.
pub trait GlyphVisitor {
    fn on_glyph(&mut self, glyph: &Glyph) -> Result<()>;
}

impl<F> GlyphVisitor for F
where
    F: FnMut(&Glyph) -> Result<()>,
{
    fn on_glyph(&mut self, glyph: &Glyph) -> Result<()> {
        self(glyph)
    }
}

/// A loaded document: the object graph plus glyph visitation per page.
pub trait PageModelProvider: Send {
    /// The document graph.
    fn document(&self) -> &Document;

    /// Mutable access for rotation normalization.
    fn document_mut(&mut self) -> &mut Document;

    /// Run the content stream of one page, delivering every shown glyph.
    ///
    /// With `prefix`, the page is interpreted as if the transform had been
    /// prepended to its content.
    fn visit_glyphs(
        &self,
        page_index: usize,
        prefix: Option<&Matrix>,
        visitor: &mut dyn GlyphVisitor,
    ) -> Result<()>;

    /// Decoded bytes of a stream (embedded file, XMP).
    fn read_stream(&self, id: ObjectId) -> Result<Vec<u8>>;

    /// Encoded bytes of an image XObject.
    fn read_image(&self, image: &PageImage) -> Result<ImagePayload>;
}

/// Turns raw bytes into a [`PageModelProvider`]. This is the unlock hook.
pub trait DocumentLoader: Send + Sync {
    /// Load `data`, decrypting with `password` when the file is encrypted.
    ///
    /// Fails with `Encrypted` when no password was given and the empty
    /// password does not work, and with `InvalidPassword` when the given
    /// one is rejected.
    fn load(&self, data: &[u8], password: Option<&str>) -> Result<Box<dyn PageModelProvider>>;
}

/// Supplies a password for an encrypted document.
pub trait PasswordProvider: Send + Sync {
    fn password(&self, metadata: &Metadata) -> Option<String>;
}

/// A fixed password.
impl PasswordProvider for String {
    fn password(&self, _metadata: &Metadata) -> Option<String> {
        Some(self.clone())
    }
}

/// One page to rasterize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: usize,
    pub dpi: f32,
    pub strategy: RenderStrategy,
    pub color_space: ColorSpace,
}

/// A rasterized page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_index: usize,
    pub rotation: i32,
    pub image: DynamicImage,
}

/// Rasterizes pages of a document.
pub trait PageRenderer: Send + Sync {
    fn render(&self, document: &[u8], request: &RenderRequest) -> Result<Vec<RenderedPage>>;
}

/// Optical character recognition.
pub trait OcrEngine: Send + Sync {
    /// Whether the engine accepts images of this media type.
    fn supports(&self, media_type: &str) -> bool;

    /// Recognize text in an encoded image and write it to `handler`.
    fn recognize(
        &self,
        image: &[u8],
        metadata: &Metadata,
        handler: &mut dyn ContentHandler,
    ) -> Result<()>;
}

/// Receives embedded payloads: attachments, scripts, XMP, revisions.
pub trait EmbeddedDocumentExtractor: Send + Sync {
    fn should_parse(&self, metadata: &Metadata) -> bool;

    fn parse_embedded(
        &self,
        bytes: &[u8],
        metadata: &Metadata,
        handler: &mut dyn ContentHandler,
        emit_markup: bool,
    ) -> Result<()>;
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_closure_visitor() {
        let mut seen = 0;
        {
            let mut visitor = |_: &Glyph| -> Result<()> {
                seen += 1;
                Ok(())
            };
            let glyph = Glyph::new("a", 0.0, 0.0, 5.0, 10.0);
            visitor.on_glyph(&glyph).unwrap();
            visitor.on_glyph(&glyph).unwrap();
        }
        assert_eq!(seen, 2);
    }
}
