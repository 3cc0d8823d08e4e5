//! Image XObjects of a page.

use log::debug;

use super::walker::Walk;
use crate::error::Result;
use crate::model::{keys, EmbeddedResourceType, Metadata, Page, PageImage};
use crate::render::Attributes;

impl Walk<'_> {
    pub(super) fn extract_page_images(&mut self, page: &Page) -> Result<()> {
        let options = self.options;
        if !options.extract_inline_images && !options.extract_inline_image_metadata_only {
            return Ok(());
        }
        for image in &page.images {
            self.extract_image(page, image)?;
        }
        Ok(())
    }

    fn extract_image(&mut self, page: &Page, image: &PageImage) -> Result<()> {
        let (options, extractor) = (self.options, self.extractor);
        let number = match self.state.inline_images.get(&image.id) {
            Some(_) if options.extract_unique_inline_images_only => return Ok(()),
            Some(&number) => number,
            None => {
                self.state.image_counter += 1;
                let number = self.state.image_counter;
                self.state.inline_images.insert(image.id, number);
                number
            }
        };
        let name = format!("image{number}.{}", image.suffix);

        let mut attributes = Attributes::new().with("src", format!("embedded:{name}"));
        attributes.set("alt", name.as_str());
        self.empty("img", &attributes)?;

        let mut metadata = Metadata::new();
        metadata.set(keys::RESOURCE_NAME, &name);
        metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Inline);
        metadata.set(keys::PAGE_NUMBER, page.number());

        if options.extract_inline_image_metadata_only {
            metadata.set(keys::IMAGE_WIDTH, image.width);
            metadata.set(keys::IMAGE_LENGTH, image.height);
            if extractor.embedded.should_parse(&metadata) {
                self.hand_off(&[], &metadata, false)?;
            }
            return Ok(());
        }

        match self.provider.read_image(image) {
            Ok(payload) => {
                metadata.set(keys::CONTENT_TYPE, &payload.mime_type);
                metadata.set(keys::IMAGE_WIDTH, image.width);
                metadata.set(keys::IMAGE_LENGTH, image.height);
                if extractor.embedded.should_parse(&metadata) {
                    self.hand_off(&payload.bytes, &metadata, false)?;
                }
            }
            Err(err) => {
                debug!("could not read image {} on page {}: {err}", image.name, page.number());
                self.metadata.add(keys::EMBEDDED_STREAM_EXCEPTION, err.to_string());
            }
        }
        Ok(())
    }
}
