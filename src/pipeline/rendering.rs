//! Page rasterization for OCR and page hand-off.
//!
//! Wraps the optional [`PageRenderer`] with the size caps, color
//! conversion, encoding and a per-document cache.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use log::debug;

use super::options::{ColorSpace, ImageFormat, OcrOptions, RenderStrategy};
use super::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{keys, EmbeddedResourceType, Metadata, Page, Rect};
use crate::parser::{PageRenderer, RenderRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Success,
    Exception,
}

/// Outcome of rendering one page. Consumed once by whoever asked for it.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub status: RenderStatus,
    /// Per-document tracking id, starting at 1
    pub id: usize,
    pub image: Option<DynamicImage>,
    /// Page number, rotation and id; the failure message on `Exception`
    pub metadata: Metadata,
}

type CacheKey = (usize, u32, RenderStrategy, ColorSpace);

pub(crate) struct RenderingAdapter {
    renderer: Option<Arc<dyn PageRenderer>>,
    dpi: u32,
    format: ImageFormat,
    quality: f32,
    color_space: ColorSpace,
    strategy: RenderStrategy,
    max_edge: u32,
    cache: HashMap<CacheKey, DynamicImage>,
    next_id: usize,
}

impl RenderingAdapter {
    pub fn new(renderer: Option<Arc<dyn PageRenderer>>, ocr: &OcrOptions) -> Self {
        Self {
            renderer,
            dpi: ocr.dpi,
            format: ocr.image_format,
            quality: ocr.image_quality,
            color_space: ocr.color_space,
            strategy: ocr.render_strategy,
            max_edge: ocr.max_image_edge,
            cache: HashMap::new(),
            next_id: 0,
        }
    }

    /// Render `page` of the document in `data`. Never fails; a failure is
    /// reported through the result status.
    pub fn render(&mut self, data: &[u8], page: &Page) -> RenderResult {
        self.next_id += 1;
        let id = self.next_id;
        let mut metadata = Metadata::new();
        metadata.set(keys::RENDER_PAGE_NUMBER, page.number());
        metadata.set(keys::RENDER_ROTATION, page.rotation);
        metadata.set(keys::RENDER_ID, id);

        match self.rasterize(data, page) {
            Ok(image) => RenderResult {
                status: RenderStatus::Success,
                id,
                image: Some(image),
                metadata,
            },
            Err(err) => {
                debug!("rendering page {} failed: {err}", page.number());
                metadata.add(keys::EMBEDDED_STREAM_EXCEPTION, err.to_string());
                RenderResult {
                    status: RenderStatus::Exception,
                    id,
                    image: None,
                    metadata,
                }
            }
        }
    }

    fn rasterize(&mut self, data: &[u8], page: &Page) -> Result<DynamicImage> {
        let dpi = clamp_dpi(self.dpi as f32, self.max_edge, &page.media_box);
        let key = (page.index, dpi.to_bits(), self.strategy, self.color_space);
        if let Some(image) = self.cache.get(&key) {
            return Ok(image.clone());
        }

        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| Error::Render("no page renderer configured".into()))?;
        let request = RenderRequest {
            page_index: page.index,
            dpi,
            strategy: self.strategy,
            color_space: self.color_space,
        };
        let rendered = renderer
            .render(data, &request)?
            .into_iter()
            .find(|r| r.page_index == page.index)
            .ok_or_else(|| Error::Render(format!("no image for page {}", page.number())))?;

        let image = convert_color(fit_within(rendered.image, self.max_edge), self.color_space);
        self.cache.insert(key, image.clone());
        Ok(image)
    }

    /// Encode in the configured format.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        match self.format {
            ImageFormat::Jpeg => {
                let quality = (self.quality * 100.0).round().clamp(1.0, 100.0) as u8;
                // no alpha channel in JPEG
                let opaque = match image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image.clone(),
                    _ => DynamicImage::ImageRgb8(image.to_rgb8()),
                };
                opaque.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
            }
            format => image.write_to(&mut out, format.image_format())?,
        }
        Ok(out.into_inner())
    }

    pub fn media_type(&self) -> String {
        format!("image/{}", self.format.as_str())
    }
}

/// Lower `dpi` so the longest edge of `media_box` stays within `max_edge`
/// pixels.
pub fn clamp_dpi(dpi: f32, max_edge: u32, media_box: &Rect) -> f32 {
    let longest = media_box.width().max(media_box.height());
    if longest <= 0.0 {
        return dpi;
    }
    dpi.min(max_edge as f32 * 72.0 / longest)
}

/// Downscale, keeping the aspect ratio, when either edge exceeds
/// `max_edge`. Smaller images are returned as they are.
pub fn fit_within(image: DynamicImage, max_edge: u32) -> DynamicImage {
    if image.width() <= max_edge && image.height() <= max_edge {
        image
    } else {
        image.resize(max_edge, max_edge, FilterType::Triangle)
    }
}

fn convert_color(image: DynamicImage, color_space: ColorSpace) -> DynamicImage {
    match color_space {
        ColorSpace::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorSpace::Rgb => DynamicImage::ImageRgb8(image.to_rgb8()),
        ColorSpace::Argb => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

impl Walk<'_> {
    /// Copy a failed render's message into the document metadata and turn
    /// it into a recoverable error.
    pub(super) fn render_failure(&mut self, rendered: &RenderResult, page: &Page) -> Error {
        let messages = rendered.metadata.get_all(keys::EMBEDDED_STREAM_EXCEPTION);
        for message in messages {
            self.metadata.add(keys::EMBEDDED_STREAM_EXCEPTION, message);
        }
        let reason = messages.first().map(String::as_str).unwrap_or("no image");
        Error::Render(format!("page {}: {reason}", page.number()))
    }

    /// Render the page and pass the image on as a `RENDERING` resource.
    pub(super) fn hand_off_rendered_page(&mut self, page: &Page) -> Result<()> {
        let rendered = self.renderer.render(self.data, page);
        let Some(image) = rendered.image.as_ref() else {
            return Err(self.render_failure(&rendered, page));
        };

        let mut metadata = rendered.metadata.clone();
        metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Rendering);
        metadata.set(keys::CONTENT_TYPE, self.renderer.media_type());
        if !self.extractor.embedded.should_parse(&metadata) {
            return Ok(());
        }
        let bytes = self.renderer.encode(image)?;
        self.hand_off(&bytes, &metadata, true)
    }
}
