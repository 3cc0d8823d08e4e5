//! Annotation dispatch at page end.

use super::walker::Walk;
use crate::error::Result;
use crate::model::{keys, Annotation, AnnotationKind, MarkupText};
use crate::render::Attributes;

const NULL_NAME: &str = "null";

impl Walk<'_> {
    pub(super) fn process_annotation(&mut self, annotation: &Annotation) -> Result<()> {
        self.state
            .annotation_types
            .insert(annotation.name.clone().unwrap_or_else(|| NULL_NAME.to_string()));
        self.state
            .annotation_subtypes
            .insert(annotation.subtype.clone().unwrap_or_else(|| NULL_NAME.to_string()));

        match &annotation.kind {
            AnnotationKind::FileAttachment {
                file: Some(file),
                attachment_name,
                ..
            } => {
                let name = attachment_name.as_deref().unwrap_or("");
                self.extract_complex_from(name, "annotationFileAttachment", *file)?;
            }
            AnnotationKind::FileAttachment { file: None, .. } => {}
            AnnotationKind::Widget => self.handle_widget(annotation)?,
            AnnotationKind::Markup(_) | AnnotationKind::Link | AnnotationKind::Other => {
                let subtype = annotation.subtype.as_deref().unwrap_or("unknown");
                if subtype == "3D" || annotation.has_3d_data {
                    self.metadata.set(keys::HAS_3D, true);
                }
                for &spec in &annotation.nested_file_specs {
                    self.extract_complex_from("", subtype, spec)?;
                }
            }
        }

        if self.options.extract_annotation_text {
            if let Some(link) = annotation.uri().filter(|link| !link.trim().is_empty()) {
                self.start("div", &Attributes::new().with("class", "annotation"))?;
                self.element("a", &Attributes::new().with("href", link), link)?;
                self.end("div")?;
            }
            if let Some(markup) = annotation.markup().filter(|m| !m.is_empty()) {
                self.write_markup(markup)?;
            }
        }
        Ok(())
    }

    fn write_markup(&mut self, markup: &MarkupText) -> Result<()> {
        self.start("div", &Attributes::new().with("class", "annotation"))?;
        for (class, text) in [
            ("annotationTitle", &markup.title),
            ("annotationSubject", &markup.subject),
            ("annotationContents", &markup.contents),
        ] {
            if let Some(text) = text {
                self.element("div", &Attributes::new().with("class", class), text)?;
            }
        }
        self.end("div")
    }
}
