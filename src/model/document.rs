//! Document-level types.

use super::{AcroForm, Action, FileSpec, FileSpecId, Outline, Page, StructTree};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Permission flags from the encryption dictionary (`/P`).
///
/// An unencrypted document allows everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_print: bool,
    pub can_modify: bool,
    pub can_extract_content: bool,
    pub can_modify_annotations: bool,
    pub can_fill_in_form: bool,
    pub can_extract_for_accessibility: bool,
    pub can_assemble_document: bool,
    pub can_print_faithful: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::from_p_flags(-1)
    }
}

impl Permissions {
    /// Decode the `/P` integer (bits 3-6 and 9-12, 1-based).
    pub fn from_p_flags(p: i64) -> Self {
        let bit = |n: u32| p & (1 << (n - 1)) != 0;
        Self {
            can_print: bit(3),
            can_modify: bit(4),
            can_extract_content: bit(5),
            can_modify_annotations: bit(6),
            can_fill_in_form: bit(9),
            can_extract_for_accessibility: bit(10),
            can_assemble_document: bit(11),
            can_print_faithful: bit(12),
        }
    }

    /// Everything allowed except the given extraction flags.
    pub fn with_extraction(mut self, content: bool, accessibility: bool) -> Self {
        self.can_extract_content = content;
        self.can_extract_for_accessibility = accessibility;
        self
    }
}

/// The document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub created: Option<DateTime<FixedOffset>>,
    pub modified: Option<DateTime<FixedOffset>>,
    pub trapped: Option<String>,
    /// Non-standard keys
    pub custom: BTreeMap<String, String>,
}

/// Node of the embedded-files name tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameTreeNode {
    /// `/Names` pairs
    pub names: Vec<(String, FileSpecId)>,
    /// `/Kids` as arena indices; may point back up the tree
    pub kids: Vec<usize>,
}

/// Embedded-files name tree, stored as an arena.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameTree {
    pub nodes: Vec<NameTreeNode>,
    pub root: usize,
}

impl NameTree {
    /// Single-node tree holding the given entries.
    pub fn flat(names: Vec<(String, FileSpecId)>) -> Self {
        Self {
            nodes: vec![NameTreeNode {
                names,
                kids: Vec::new(),
            }],
            root: 0,
        }
    }

    pub fn push(&mut self, node: NameTreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// Catalog `/OpenAction` and document `/AA`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentActions {
    pub open: Option<Action>,
    pub after_print: Option<Action>,
    pub after_save: Option<Action>,
    pub before_close: Option<Action>,
    pub before_print: Option<Action>,
    pub before_save: Option<Action>,
}

/// The document graph handed over by a page-model provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Header version, e.g. "1.7"
    pub version: String,
    pub encrypted: bool,
    pub permissions: Permissions,
    pub info: DocInfo,
    /// Catalog `/Lang`
    pub language: Option<String>,
    pub pages: Vec<Page>,
    /// File-specification table
    pub file_specs: Vec<FileSpec>,
    /// Specs found by scanning the whole object graph
    pub scanned_file_specs: Vec<FileSpecId>,
    pub embedded_files: Option<NameTree>,
    pub outline: Option<Outline>,
    pub acro_form: Option<AcroForm>,
    pub structure: Option<StructTree>,
    pub actions: DocumentActions,
    /// Catalog XMP packet
    #[serde(skip)]
    pub xmp: Option<Vec<u8>>,
    /// Catalog has a `/Collection` (portfolio)
    pub has_collection: bool,
}

impl Document {
    /// A document with `page_count` empty pages.
    pub fn with_pages(page_count: usize) -> Self {
        Self {
            version: "1.7".to_string(),
            pages: (0..page_count).map(Page::new).collect(),
            ..Self::default()
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Register a file specification and return its id.
    pub fn add_file_spec(&mut self, spec: FileSpec) -> FileSpecId {
        self.file_specs.push(spec);
        self.file_specs.len() - 1
    }

    pub fn file_spec(&self, id: FileSpecId) -> Option<&FileSpec> {
        self.file_specs.get(id)
    }

    /// Page index for a page object id.
    pub fn page_index_of(&self, id: super::ObjectId) -> Option<usize> {
        self.pages.iter().position(|p| p.object_id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_bits() {
        let all = Permissions::default();
        assert!(all.can_extract_content && all.can_print_faithful);

        // print + accessibility only
        let p = Permissions::from_p_flags(0b0010_0000_0100);
        assert!(p.can_print);
        assert!(p.can_extract_for_accessibility);
        assert!(!p.can_extract_content);
        assert!(!p.can_modify);
    }

    #[test]
    fn test_with_pages_contiguous() {
        let doc = Document::with_pages(3);
        let indices: Vec<_> = doc.pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
