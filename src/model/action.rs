//! Actions and the events that trigger them.

use super::FileSpecId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The event an action is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionTrigger {
    AfterDocumentPrint,
    AfterDocumentSave,
    AnnotationCursorEnters,
    AnnotationCursorExit,
    AnnotationLoseInputFocus,
    AnnotationMouseClick,
    AnnotationMouseReleased,
    AnnotationPageClosed,
    AnnotationPageNoLongerVisible,
    AnnotationPageOpened,
    AnnotationPageVisible,
    AnnotationReceivesFocus,
    AnnotationWidget,
    BeforeDocumentClose,
    BeforeDocumentPrint,
    BeforeDocumentSave,
    DocumentOpen,
    FormField,
    FormFieldFormatted,
    FormFieldKeystroke,
    FormFieldRecalculate,
    FormFieldValueChange,
    PageClose,
    PageOpen,
    Bookmark,
}

impl ActionTrigger {
    pub fn as_str(&self) -> &'static str {
        use ActionTrigger::*;
        match self {
            AfterDocumentPrint => "AFTER_DOCUMENT_PRINT",
            AfterDocumentSave => "AFTER_DOCUMENT_SAVE",
            AnnotationCursorEnters => "ANNOTATION_CURSOR_ENTERS",
            AnnotationCursorExit => "ANNOTATION_CURSOR_EXIT",
            AnnotationLoseInputFocus => "ANNOTATION_LOSE_INPUT_FOCUS",
            AnnotationMouseClick => "ANNOTATION_MOUSE_CLICK",
            AnnotationMouseReleased => "ANNOTATION_MOUSE_RELEASED",
            AnnotationPageClosed => "ANNOTATION_PAGE_CLOSED",
            AnnotationPageNoLongerVisible => "ANNOTATION_PAGE_NO_LONGER_VISIBLE",
            AnnotationPageOpened => "ANNOTATION_PAGE_OPENED",
            AnnotationPageVisible => "ANNOTATION_PAGE_VISIBLE",
            AnnotationReceivesFocus => "ANNOTATION_RECEIVES_FOCUS",
            AnnotationWidget => "ANNOTATION_WIDGET",
            BeforeDocumentClose => "BEFORE_DOCUMENT_CLOSE",
            BeforeDocumentPrint => "BEFORE_DOCUMENT_PRINT",
            BeforeDocumentSave => "BEFORE_DOCUMENT_SAVE",
            DocumentOpen => "DOCUMENT_OPEN",
            FormField => "FORM_FIELD",
            FormFieldFormatted => "FORM_FIELD_FORMATTED",
            FormFieldKeystroke => "FORM_FIELD_KEYSTROKE",
            FormFieldRecalculate => "FORM_FIELD_RECALCULATE",
            FormFieldValueChange => "FORM_FIELD_VALUE_CHANGE",
            PageClose => "PAGE_CLOSE",
            PageOpen => "PAGE_OPEN",
            Bookmark => "BOOKMARK",
        }
    }

    /// Annotation additional-action key (`/AA`) to trigger.
    pub fn from_annotation_key(key: &[u8]) -> Option<Self> {
        use ActionTrigger::*;
        Some(match key {
            b"Bl" => AnnotationLoseInputFocus,
            b"D" => AnnotationMouseClick,
            b"E" => AnnotationCursorEnters,
            b"Fo" => AnnotationReceivesFocus,
            b"PC" => AnnotationPageClosed,
            b"PI" => AnnotationPageNoLongerVisible,
            b"PO" => AnnotationPageOpened,
            b"PV" => AnnotationPageVisible,
            b"U" => AnnotationMouseReleased,
            b"X" => AnnotationCursorExit,
            _ => return None,
        })
    }

    /// Form-field additional-action key to trigger.
    pub fn from_field_key(key: &[u8]) -> Option<Self> {
        use ActionTrigger::*;
        Some(match key {
            b"C" => FormFieldRecalculate,
            b"F" => FormFieldFormatted,
            b"K" => FormFieldKeystroke,
            b"V" => FormFieldValueChange,
            _ => return None,
        })
    }
}

impl fmt::Display for ActionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of action variants the extractor dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    ImportData {
        file: Option<FileSpecId>,
    },
    Launch {
        file: Option<FileSpecId>,
        /// `/F` as a plain string, when given that way
        file_name: Option<String>,
        default_directory: Option<String>,
        operation: Option<String>,
        parameters: Option<String>,
    },
    RemoteGoTo {
        file: Option<FileSpecId>,
    },
    JavaScript {
        script: Option<String>,
    },
    Uri {
        uri: Option<String>,
    },
    /// An explicit destination rather than an action
    Destination,
    /// Any other `/S` type
    Other {
        subtype: String,
    },
}

/// An action, possibly chained to further actions via `/Next`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind }
    }

    pub fn javascript(script: impl Into<String>) -> Self {
        Self::new(ActionKind::JavaScript {
            script: Some(script.into()),
        })
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        Self::new(ActionKind::Uri {
            uri: Some(uri.into()),
        })
    }

    /// `/S` name of the action, or "Destination".
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ActionKind::ImportData { .. } => "ImportData",
            ActionKind::Launch { .. } => "Launch",
            ActionKind::RemoteGoTo { .. } => "GoToR",
            ActionKind::JavaScript { .. } => "JavaScript",
            ActionKind::Uri { .. } => "URI",
            ActionKind::Destination => "Destination",
            ActionKind::Other { subtype } => subtype,
        }
    }

    pub fn is_destination(&self) -> bool {
        matches!(self.kind, ActionKind::Destination)
    }

    /// Target of a URI action.
    pub fn uri_target(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Uri { uri } => uri.as_deref(),
            _ => None,
        }
    }
}

/// An action together with the event that fires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAction {
    pub trigger: ActionTrigger,
    pub action: Action,
}

impl TriggeredAction {
    pub fn new(trigger: ActionTrigger, action: Action) -> Self {
        Self { trigger, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_names() {
        assert_eq!(ActionTrigger::DocumentOpen.to_string(), "DOCUMENT_OPEN");
        assert_eq!(
            ActionTrigger::AnnotationPageNoLongerVisible.as_str(),
            "ANNOTATION_PAGE_NO_LONGER_VISIBLE"
        );
    }

    #[test]
    fn test_additional_action_keys() {
        assert_eq!(
            ActionTrigger::from_annotation_key(b"Fo"),
            Some(ActionTrigger::AnnotationReceivesFocus)
        );
        assert_eq!(
            ActionTrigger::from_field_key(b"K"),
            Some(ActionTrigger::FormFieldKeystroke)
        );
        assert_eq!(ActionTrigger::from_field_key(b"Fo"), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Action::javascript("app.alert(1)").type_name(), "JavaScript");
        let other = Action::new(ActionKind::Other {
            subtype: "SubmitForm".into(),
        });
        assert_eq!(other.type_name(), "SubmitForm");
        assert_eq!(Action::uri("https://example.com").uri_target(), Some("https://example.com"));
    }
}
