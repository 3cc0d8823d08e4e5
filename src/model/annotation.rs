//! Page annotations.

use super::{Action, FileSpecId, TriggeredAction};
use serde::{Deserialize, Serialize};

/// Popup title, subject and body of a markup annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkupText {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub contents: Option<String>,
}

impl MarkupText {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.subject.is_none() && self.contents.is_none()
    }
}

/// Closed set of annotation kinds the page walker dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationKind {
    FileAttachment {
        file: Option<FileSpecId>,
        attachment_name: Option<String>,
        markup: MarkupText,
    },
    Markup(MarkupText),
    Link,
    Widget,
    Other,
}

/// An annotation on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// `/NM`
    pub name: Option<String>,
    /// `/Subtype`
    pub subtype: Option<String>,
    pub kind: AnnotationKind,
    /// `/A`
    pub action: Option<Action>,
    /// `/AA`
    pub additional_actions: Vec<TriggeredAction>,
    /// File specifications nested anywhere inside the annotation dictionary
    pub nested_file_specs: Vec<FileSpecId>,
    /// Carries a `/3DD` stream
    pub has_3d_data: bool,
}

impl Annotation {
    pub fn new(subtype: impl Into<String>, kind: AnnotationKind) -> Self {
        Self {
            name: None,
            subtype: Some(subtype.into()),
            kind,
            action: None,
            additional_actions: Vec::new(),
            nested_file_specs: Vec::new(),
            has_3d_data: false,
        }
    }

    pub fn link(uri: impl Into<String>) -> Self {
        let mut annotation = Self::new("Link", AnnotationKind::Link);
        annotation.action = Some(Action::uri(uri));
        annotation
    }

    pub fn file_attachment(file: FileSpecId, attachment_name: Option<String>) -> Self {
        Self::new(
            "FileAttachment",
            AnnotationKind::FileAttachment {
                file: Some(file),
                attachment_name,
                markup: MarkupText::default(),
            },
        )
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_additional_action(mut self, action: TriggeredAction) -> Self {
        self.additional_actions.push(action);
        self
    }

    /// Markup text for the markup family, file attachments included.
    pub fn markup(&self) -> Option<&MarkupText> {
        match &self.kind {
            AnnotationKind::Markup(m) => Some(m),
            AnnotationKind::FileAttachment { markup, .. } => Some(markup),
            _ => None,
        }
    }

    /// Target of the annotation's URI action, if it has one.
    pub fn uri(&self) -> Option<&str> {
        self.action.as_ref().and_then(Action::uri_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_uri() {
        let annotation = Annotation::link("https://example.com/a");
        assert_eq!(annotation.uri(), Some("https://example.com/a"));
        assert!(annotation.markup().is_none());
    }

    #[test]
    fn test_file_attachment_is_markup() {
        let annotation = Annotation::file_attachment(0, Some("a.txt".into()));
        assert!(annotation.markup().is_some_and(MarkupText::is_empty));
    }
}
