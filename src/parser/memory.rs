//! In-memory page model.
//!
//! Holds a hand-built [`Document`] plus the glyphs of every page. Used by the
//! test suite and by callers that already have positioned text from another
//! source.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{Document, Glyph, ImagePayload, Matrix, ObjectId, PageImage};
use crate::parser::backend::{DocumentLoader, GlyphVisitor, PageModelProvider};
use crate::parser::content::malformed;

/// Default glyph size used by [`InMemoryProvider::with_text`].
const TEXT_SIZE: f32 = 12.0;
const TEXT_ADVANCE: f32 = 6.0;
const TEXT_LEADING: f32 = 14.0;

#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    document: Document,
    glyphs: Vec<Vec<Glyph>>,
    failures: HashMap<usize, String>,
    streams: HashMap<ObjectId, Vec<u8>>,
    images: HashMap<ObjectId, ImagePayload>,
}

impl InMemoryProvider {
    pub fn new(document: Document) -> Self {
        let glyphs = vec![Vec::new(); document.page_count()];
        Self {
            document,
            glyphs,
            failures: HashMap::new(),
            streams: HashMap::new(),
            images: HashMap::new(),
        }
    }

    /// A document of `count` pages without text.
    pub fn with_pages(count: usize) -> Self {
        Self::new(Document::with_pages(count))
    }

    pub fn with_glyphs(mut self, page: usize, glyphs: Vec<Glyph>) -> Self {
        if let Some(slot) = self.glyphs.get_mut(page) {
            *slot = glyphs;
        }
        self
    }

    /// Lay `text` out left to right from the top of the page, one glyph per
    /// character; `\n` starts a new line.
    pub fn with_text(self, page: usize, text: &str) -> Self {
        let mut glyphs = Vec::new();
        let (mut x, mut y) = (72.0, 720.0);
        for ch in text.chars() {
            if ch == '\n' {
                x = 72.0;
                y -= TEXT_LEADING;
                continue;
            }
            let mut glyph = Glyph::new(ch.to_string(), x, y, TEXT_ADVANCE, TEXT_SIZE);
            glyph.space_width = Some(TEXT_ADVANCE);
            glyphs.push(glyph);
            x += TEXT_ADVANCE;
        }
        self.with_glyphs(page, glyphs)
    }

    /// Make the glyph pass of `page` fail with a malformed-stream error.
    pub fn with_page_failure(mut self, page: usize, message: impl Into<String>) -> Self {
        self.failures.insert(page, message.into());
        self
    }

    pub fn with_stream(mut self, id: ObjectId, bytes: impl Into<Vec<u8>>) -> Self {
        self.streams.insert(id, bytes.into());
        self
    }

    pub fn with_image(mut self, id: ObjectId, payload: ImagePayload) -> Self {
        self.images.insert(id, payload);
        self
    }
}

impl PageModelProvider for InMemoryProvider {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn visit_glyphs(
        &self,
        page_index: usize,
        prefix: Option<&Matrix>,
        visitor: &mut dyn GlyphVisitor,
    ) -> Result<()> {
        if let Some(message) = self.failures.get(&page_index) {
            return Err(malformed(page_index + 1, message.clone()));
        }
        let glyphs = self
            .glyphs
            .get(page_index)
            .ok_or_else(|| Error::PdfParse(format!("no page at index {page_index}")))?;
        for glyph in glyphs {
            match prefix {
                Some(prefix) => visitor.on_glyph(&glyph.under_prefix(prefix))?,
                None => visitor.on_glyph(glyph)?,
            }
        }
        Ok(())
    }

    fn read_stream(&self, id: ObjectId) -> Result<Vec<u8>> {
        self.streams
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Embedded(format!("no stream for object {} {}", id.0, id.1)))
    }

    fn read_image(&self, image: &PageImage) -> Result<ImagePayload> {
        self.images
            .get(&image.id)
            .cloned()
            .ok_or_else(|| Error::Embedded(format!("no data for image {}", image.name)))
    }
}

/// Hands out clones of one [`InMemoryProvider`], optionally behind a
/// password.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    provider: InMemoryProvider,
    password: Option<String>,
}

impl InMemoryLoader {
    pub fn new(provider: InMemoryProvider) -> Self {
        Self {
            provider,
            password: None,
        }
    }

    /// Require `password` to load; the document is marked encrypted.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.provider.document.encrypted = true;
        self.password = Some(password.into());
        self
    }
}

impl DocumentLoader for InMemoryLoader {
    fn load(&self, _data: &[u8], password: Option<&str>) -> Result<Box<dyn PageModelProvider>> {
        match (&self.password, password) {
            (None, _) => {}
            (Some(expected), Some(given)) if expected == given => {}
            (Some(_), Some(_)) => return Err(Error::InvalidPassword),
            (Some(expected), None) if expected.is_empty() => {}
            (Some(_), None) => return Err(Error::Encrypted),
        }
        Ok(Box::new(self.provider.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(provider: &dyn PageModelProvider, page: usize, prefix: Option<&Matrix>) -> Result<Vec<Glyph>> {
        let mut out = Vec::new();
        let mut push = |g: &Glyph| -> Result<()> {
            out.push(g.clone());
            Ok(())
        };
        provider.visit_glyphs(page, prefix, &mut push)?;
        Ok(out)
    }

    #[test]
    fn test_with_text_lines() {
        let provider = InMemoryProvider::with_pages(1).with_text(0, "ab\nc");
        let glyphs = collect(&provider, 0, None).unwrap();
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[1].x(), 78.0);
        assert_eq!(glyphs[2].y(), 706.0);
    }

    #[test]
    fn test_page_failure() {
        let provider = InMemoryProvider::with_pages(2).with_page_failure(1, "bad operator");
        assert!(collect(&provider, 0, None).is_ok());
        let err = collect(&provider, 1, None).unwrap_err();
        assert!(matches!(err, Error::MalformedStream { page: 2, .. }));
    }

    #[test]
    fn test_loader_passwords() {
        let loader = InMemoryLoader::new(InMemoryProvider::with_pages(1)).with_password("s3cret");
        assert!(matches!(loader.load(b"", None), Err(Error::Encrypted)));
        assert!(matches!(loader.load(b"", Some("nope")), Err(Error::InvalidPassword)));
        let provider = loader.load(b"", Some("s3cret")).unwrap();
        assert!(provider.document().encrypted);
    }
}
