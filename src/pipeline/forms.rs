//! Interactive form content: the XFA packet when it parses, the AcroForm
//! field tree otherwise.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use super::actions::{in_trigger_order, FIELD_TRIGGERS};
use super::walker::Walk;
use super::xfa::{parse_xfa, XfaContent};
use crate::error::{Error, Result};
use crate::model::{keys, AcroForm, Document, FieldKind, FormField, Signature};
use crate::render::Attributes;

const SIGNATURE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// "partName: value", leaving out a value recorded as `null`.
fn field_text(field: &FormField) -> String {
    let mut text = String::new();
    if let Some(name) = field.partial_name.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(name);
        text.push_str(": ");
    }
    if let Some(value) = field.value.as_deref().filter(|v| *v != "null") {
        text.push_str(value);
    }
    text
}

/// Signature values keyed by their `signdata` name, blanks dropped.
fn signature_data(signature: &Signature) -> BTreeMap<&'static str, String> {
    let mut data = BTreeMap::new();
    for (key, value) in [
        ("contactInfo", &signature.contact_info),
        ("location", &signature.location),
        ("name", &signature.name),
        ("reason", &signature.reason),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            data.insert(key, value.to_string());
        }
    }
    if let Some(date) = &signature.date {
        data.insert("date", date.format(SIGNATURE_DATE_FORMAT).to_string());
    }
    data
}

impl Walk<'_> {
    pub(super) fn extract_acroform(&mut self, doc: &Document) -> Result<()> {
        let Some(form) = &doc.acro_form else {
            return Ok(());
        };
        if let Some(xfa) = &form.xfa {
            match parse_xfa(xfa) {
                Ok(content) => return self.write_xfa(&content),
                Err(err) => {
                    debug!("falling back to AcroForm fields");
                    self.record_warning(err);
                }
            }
        }
        if !form.has_fields() {
            return Ok(());
        }

        self.start("div", &Attributes::new().with("class", "acroform"))?;
        self.start("ol", &Attributes::new())?;
        let mut seen = HashSet::new();
        for &root in &form.roots {
            self.process_field(form, root, 0, &mut seen)?;
        }
        self.end("ol")?;
        self.end("div")
    }

    /// Free text of the packet, then one `li` per template field.
    pub(super) fn write_xfa(&mut self, content: &XfaContent) -> Result<()> {
        self.start("div", &Attributes::new().with("class", "xfa_content"))?;
        for paragraph in &content.paragraphs {
            self.element("p", &Attributes::new(), paragraph)?;
        }
        if !content.fields.is_empty() {
            self.start("div", &Attributes::new().with("class", "xfa_form"))?;
            self.start("ol", &Attributes::new())?;
            for field in &content.fields {
                let attributes = Attributes::new().with("fieldName", field.name.as_str());
                self.element("li", &attributes, &field.label())?;
            }
            self.end("ol")?;
            self.end("div")?;
        }
        self.end("div")
    }

    fn process_field(
        &mut self,
        form: &AcroForm,
        index: usize,
        depth: usize,
        seen: &mut HashSet<usize>,
    ) -> Result<()> {
        let max_depth = self.options.max_recursion_depth;
        if depth > max_depth {
            return self.catchable(Error::RecursionLimit(max_depth));
        }
        if !seen.insert(index) {
            return Ok(());
        }
        let Some(field) = form.fields.get(index) else {
            return Ok(());
        };

        for triggered in in_trigger_order(&field.actions, &FIELD_TRIGGERS) {
            self.handle_action(Some(&triggered.action), triggered.trigger)?;
        }
        for widget in &field.widgets {
            self.handle_widget(widget)?;
        }

        if let FieldKind::Signature { signature } = &field.kind {
            return self.write_signature(field, signature.as_ref());
        }

        let mut attributes = Attributes::new();
        attributes.set_opt("altName", field.alternate_name.as_deref());
        let text = field_text(field);
        if !attributes.is_empty() || !text.is_empty() {
            self.element("li", &attributes, &text)?;
        }

        let children = field.children();
        if !children.is_empty() {
            self.start("ol", &Attributes::new())?;
            for &child in children {
                self.process_field(form, child, depth + 1, seen)?;
            }
            self.end("ol")?;
        }
        Ok(())
    }

    fn write_signature(&mut self, field: &FormField, signature: Option<&Signature>) -> Result<()> {
        let data = signature.map(signature_data).unwrap_or_default();
        if data.is_empty() {
            return Ok(());
        }
        let mut attributes = Attributes::new();
        attributes.set_opt("altName", field.alternate_name.as_deref());
        self.start("li", &attributes)?;
        self.chars(&field_text(field))?;
        self.start("ol", &Attributes::new().with("type", "signaturedata"))?;
        for (key, value) in &data {
            self.element("li", &Attributes::new().with("signdata", *key), value)?;
        }
        self.end("ol")?;
        self.end("li")?;
        self.metadata.set(keys::HAS_SIGNATURE, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_field_text() {
        let mut field = FormField::text("Name", "Ada");
        assert_eq!(field_text(&field), "Name: Ada");
        field.value = Some("null".to_string());
        assert_eq!(field_text(&field), "Name: ");
        field.partial_name = None;
        field.value = Some("x".to_string());
        assert_eq!(field_text(&field), "x");
    }

    #[test]
    fn test_signature_data_sorted_and_blank_free() {
        let signature = Signature {
            name: Some("A. Lovelace".to_string()),
            contact_info: Some("  ".to_string()),
            location: Some("London".to_string()),
            reason: None,
            date: Some(DateTime::parse_from_rfc3339("2021-03-04T05:06:07+01:00").unwrap()),
        };
        let data = signature_data(&signature);
        let keys: Vec<_> = data.keys().copied().collect();
        assert_eq!(keys, vec!["date", "location", "name"]);
        assert_eq!(data["date"], "2021-03-04T05:06:07+0100");
    }
}
