//! Per-page OCR decision and execution.

use log::debug;

use super::options::{AutoThresholds, OcrStrategy};
use super::rendering::RenderStatus;
use super::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{keys, Page};
use crate::render::EmbeddedContentHandler;

/// Whether a page with `total` glyphs, `unmapped` of them without unicode,
/// goes through recognition.
///
/// Under AUTO the unmapped check only applies to pages with more than
/// `total_chars_per_page` glyphs. A limit below 1.0 is a fraction of the
/// page's glyphs, anything else an absolute count.
pub fn needs_ocr(
    strategy: OcrStrategy,
    thresholds: &AutoThresholds,
    total: usize,
    unmapped: usize,
) -> bool {
    match strategy {
        OcrStrategy::NoOcr => false,
        OcrStrategy::OcrOnly | OcrStrategy::OcrAndTextExtraction => true,
        OcrStrategy::Auto => {
            let limit = thresholds.unmapped_unicode_chars_per_page;
            let sparse = total <= thresholds.total_chars_per_page;
            let exceeds = !sparse
                && if limit < 1.0 {
                    unmapped as f32 / total as f32 > limit
                } else {
                    unmapped as f32 > limit
                };
            sparse || exceeds
        }
    }
}

impl Walk<'_> {
    /// Render the page and run the OCR engine over it.
    pub(super) fn ocr_current_page(&mut self, page: &Page) -> Result<()> {
        let (options, extractor) = (self.options, self.extractor);
        let ocr = &options.ocr;
        if ocr.strategy == OcrStrategy::NoOcr {
            return Ok(());
        }
        let media_type = ocr.media_type();
        let engine = match &extractor.ocr {
            Some(engine) if extractor.ocr_supported => engine,
            _ if ocr.strategy == OcrStrategy::Auto => {
                debug!("no OCR engine for {media_type}, skipping page {}", page.number());
                return Ok(());
            }
            _ => return Err(Error::OcrUnavailable(media_type)),
        };

        let rendered = self.renderer.render(self.data, page);
        let image = match (&rendered.status, rendered.image.as_ref()) {
            (RenderStatus::Success, Some(image)) => image,
            _ => return Err(self.render_failure(&rendered, page)),
        };
        let bytes = self.renderer.encode(image)?;

        let mut metadata = rendered.metadata.clone();
        metadata.set(keys::CONTENT_TYPE_OVERRIDE, &media_type);
        debug!("OCR on page {} ({} bytes of {media_type})", page.number(), bytes.len());
        engine.recognize(&bytes, &metadata, &mut EmbeddedContentHandler::new(&mut *self.handler))?;
        self.state.ocr_pages += 1;
        Ok(())
    }
}
