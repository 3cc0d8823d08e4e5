//! Interactive form data (AcroForm fields and the XFA packet).

use super::{Annotation, TriggeredAction};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Values of a signature dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub location: Option<String>,
    pub reason: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Terminal,
    NonTerminal { children: Vec<usize> },
    Signature { signature: Option<Signature> },
}

/// One field in the field arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// `/T`
    pub partial_name: Option<String>,
    /// `/TU`
    pub alternate_name: Option<String>,
    /// `/V` rendered as text
    pub value: Option<String>,
    pub kind: FieldKind,
    /// Field additional actions (`/AA` C, F, K, V)
    pub actions: Vec<TriggeredAction>,
    pub widgets: Vec<Annotation>,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            partial_name: Some(name.into()),
            alternate_name: None,
            value: Some(value.into()),
            kind: FieldKind::Terminal,
            actions: Vec::new(),
            widgets: Vec::new(),
        }
    }

    pub fn children(&self) -> &[usize] {
        match &self.kind {
            FieldKind::NonTerminal { children } => children,
            _ => &[],
        }
    }
}

/// The interactive form of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcroForm {
    pub fields: Vec<FormField>,
    /// Indices of `/Fields` entries
    pub roots: Vec<usize>,
    /// Concatenated XFA packet
    #[serde(skip)]
    pub xfa: Option<Vec<u8>>,
}

impl AcroForm {
    /// Append a field and return its index.
    pub fn push(&mut self, field: FormField) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    pub fn has_fields(&self) -> bool {
        !self.roots.is_empty()
    }
}
