//! Action dispatch.

use super::walker::Walk;
use crate::error::Result;
use crate::model::{keys, Action, ActionKind, ActionTrigger, Annotation, EmbeddedResourceType, Metadata, TriggeredAction};
use crate::render::Attributes;

/// Order in which a widget's additional actions are visited (`/AA` keys
/// Bl, D, E, Fo, PC, PI, PO, PV, U, X).
pub const WIDGET_TRIGGERS: [ActionTrigger; 10] = [
    ActionTrigger::AnnotationLoseInputFocus,
    ActionTrigger::AnnotationMouseClick,
    ActionTrigger::AnnotationCursorEnters,
    ActionTrigger::AnnotationReceivesFocus,
    ActionTrigger::AnnotationPageClosed,
    ActionTrigger::AnnotationPageNoLongerVisible,
    ActionTrigger::AnnotationPageOpened,
    ActionTrigger::AnnotationPageVisible,
    ActionTrigger::AnnotationMouseReleased,
    ActionTrigger::AnnotationCursorExit,
];

/// Form field additional actions (C, F, K, V).
pub const FIELD_TRIGGERS: [ActionTrigger; 4] = [
    ActionTrigger::FormFieldRecalculate,
    ActionTrigger::FormFieldFormatted,
    ActionTrigger::FormFieldKeystroke,
    ActionTrigger::FormFieldValueChange,
];

/// `actions` ordered by `order`; triggers not listed are dropped.
pub fn in_trigger_order<'a>(
    actions: &'a [TriggeredAction],
    order: &'a [ActionTrigger],
) -> impl Iterator<Item = &'a TriggeredAction> + 'a {
    order
        .iter()
        .flat_map(move |trigger| actions.iter().filter(move |a| a.trigger == *trigger))
}

impl Walk<'_> {
    pub(super) fn handle_action(&mut self, action: Option<&Action>, trigger: ActionTrigger) -> Result<()> {
        if !self.options.extract_actions {
            return Ok(());
        }
        let Some(action) = action else {
            return Ok(());
        };

        let class = if action.is_destination() { "destination" } else { "action" };
        let mut attributes = Attributes::new()
            .with("class", class)
            .with("type", action.type_name())
            .with("trigger", trigger.as_str());

        match &action.kind {
            ActionKind::ImportData { file } | ActionKind::RemoteGoTo { file } => {
                self.process_file_spec("", *file, attributes)?;
            }
            ActionKind::Launch {
                file,
                file_name,
                default_directory,
                operation,
                parameters,
            } => {
                attributes.set_opt("id", file_name.as_deref());
                attributes.set_opt("defaultDirectory", default_directory.as_deref());
                attributes.set_opt("operation", operation.as_deref());
                attributes.set_opt("parameters", parameters.as_deref());
                self.process_file_spec(file_name.as_deref().unwrap_or(""), *file, attributes)?;
            }
            ActionKind::JavaScript { script } => {
                let extractor = self.extractor;
                let mut metadata = Metadata::new();
                metadata.set(keys::CONTENT_TYPE, "application/javascript");
                metadata.set(keys::CONTENT_ENCODING, "UTF-8");
                metadata.set(keys::ACTION_TRIGGER, trigger);
                metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Macro);
                if let Some(script) = script.as_deref().filter(|s| !s.is_empty()) {
                    if extractor.embedded.should_parse(&metadata) {
                        self.hand_off(script.as_bytes(), &metadata, true)?;
                    }
                }
                attributes.set("class", "javascript");
                self.empty("div", &attributes)?;
            }
            ActionKind::Uri { .. } | ActionKind::Destination | ActionKind::Other { .. } => {
                self.empty("div", &attributes)?;
            }
        }

        self.metadata.add_unique(keys::ACTION_TRIGGERS, trigger);
        self.metadata.add_unique(keys::ACTION_TYPES, action.type_name());
        Ok(())
    }

    /// The widget's own action, then its additional actions.
    pub(super) fn handle_widget(&mut self, widget: &Annotation) -> Result<()> {
        self.handle_action(widget.action.as_ref(), ActionTrigger::AnnotationWidget)?;
        for triggered in in_trigger_order(&widget.additional_actions, &WIDGET_TRIGGERS) {
            self.handle_action(Some(&triggered.action), triggered.trigger)?;
        }
        Ok(())
    }
}
