//! Multi-valued metadata record.
//!
//! Every fact the pipeline learns about a document lands here: counters,
//! de-duplicated name sets, permission flags and recorded warnings. Values
//! are strings; typed accessors parse on read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known metadata keys.
pub mod keys {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_TYPE_OVERRIDE: &str = "Content-Type-Override";
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    pub const RESOURCE_NAME: &str = "resourceName";
    pub const ORIGINAL_RESOURCE_NAME: &str = "extract:originalResourceName";
    pub const EMBEDDED_RESOURCE_TYPE: &str = "embeddedResourceType";

    pub const N_PAGES: &str = "xmpTPg:NPages";
    pub const CHARS_PER_PAGE: &str = "pdf:charsPerPage";
    pub const UNMAPPED_CHARS_PER_PAGE: &str = "pdf:unmappedUnicodeCharsPerPage";
    pub const TOTAL_UNMAPPED_CHARS: &str = "pdf:totalUnmappedUnicodeChars";
    pub const OVERALL_PERCENTAGE_UNMAPPED: &str = "pdf:overallPercentageUnmappedUnicodeChars";
    pub const OCR_PAGE_COUNT: &str = "pdf:ocrPageCount";

    pub const INCREMENTAL_UPDATE_COUNT: &str = "pdf:incrementalUpdateCount";
    pub const INCREMENTAL_UPDATE_NUMBER: &str = "pdf:incrementalUpdateNumber";
    pub const EOF_OFFSETS: &str = "pdf:eofOffsets";

    pub const ANNOTATION_TYPES: &str = "pdf:annotationTypes";
    pub const ANNOTATION_SUBTYPES: &str = "pdf:annotationSubtypes";
    pub const ACTION_TRIGGER: &str = "pdf:actionTrigger";
    pub const ACTION_TRIGGERS: &str = "pdf:actionTriggers";
    pub const ACTION_TYPES: &str = "pdf:actionTypes";
    pub const FONT_NAMES: &str = "pdf:fontNames";
    pub const IMAGE_COUNT: &str = "pdf:imageCount";

    pub const ENCRYPTED: &str = "pdf:encrypted";
    pub const PDF_VERSION: &str = "pdf:PDFVersion";
    pub const HAS_COLLECTION: &str = "pdf:hasCollection";
    pub const HAS_XFA: &str = "pdf:hasXFA";
    pub const HAS_XMP: &str = "pdf:hasXMP";
    pub const HAS_MARKED_CONTENT: &str = "pdf:hasMarkedContent";
    pub const HAS_ACROFORM_FIELDS: &str = "pdf:hasAcroFormFields";
    pub const HAS_3D: &str = "pdf:has3D";
    pub const HAS_SIGNATURE: &str = "pdf:hasSignature";
    pub const XMP_LOCATION: &str = "pdf:xmpLocation";
    pub const EMBEDDED_FILE_DESCRIPTION: &str = "pdf:embeddedFileDescription";
    pub const EMBEDDED_FILE_RELATIONSHIP: &str = "pdf:embeddedFileRelationship";

    pub const EXTRACT_CONTENT: &str = "access_permission:extract_content";
    pub const EXTRACT_FOR_ACCESSIBILITY: &str = "access_permission:extract_for_accessibility";
    pub const ASSEMBLE_DOCUMENT: &str = "access_permission:assemble_document";
    pub const FILL_IN_FORM: &str = "access_permission:fill_in_form";
    pub const CAN_MODIFY: &str = "access_permission:can_modify";
    pub const CAN_MODIFY_ANNOTATIONS: &str = "access_permission:modify_annotations";
    pub const CAN_PRINT: &str = "access_permission:can_print";
    pub const CAN_PRINT_FAITHFUL: &str = "access_permission:can_print_faithful";

    pub const TITLE: &str = "dc:title";
    pub const CREATOR: &str = "dc:creator";
    pub const SUBJECT: &str = "dc:subject";
    pub const LANGUAGE: &str = "dc:language";
    pub const CREATED: &str = "dcterms:created";
    pub const MODIFIED: &str = "dcterms:modified";
    pub const CREATOR_TOOL: &str = "xmp:CreatorTool";
    pub const PRODUCER: &str = "pdf:producer";
    pub const DOC_INFO_TITLE: &str = "pdf:docinfo:title";
    pub const DOC_INFO_CREATOR: &str = "pdf:docinfo:creator";
    pub const DOC_INFO_SUBJECT: &str = "pdf:docinfo:subject";
    pub const DOC_INFO_KEYWORDS: &str = "pdf:docinfo:keywords";
    pub const DOC_INFO_CREATOR_TOOL: &str = "pdf:docinfo:creator_tool";
    pub const DOC_INFO_PRODUCER: &str = "pdf:docinfo:producer";
    pub const DOC_INFO_TRAPPED: &str = "pdf:docinfo:trapped";
    pub const DOC_INFO_CREATED: &str = "pdf:docinfo:created";
    pub const DOC_INFO_MODIFIED: &str = "pdf:docinfo:modified";
    pub const DOC_INFO_CUSTOM_PREFIX: &str = "pdf:docinfo:custom:";

    pub const PAGE_NUMBER: &str = "pdf:pageNumber";
    pub const IMAGE_WIDTH: &str = "tiff:ImageWidth";
    pub const IMAGE_LENGTH: &str = "tiff:ImageLength";

    pub const RENDER_PAGE_NUMBER: &str = "rendering:pageNumber";
    pub const RENDER_ROTATION: &str = "rendering:rotation";
    pub const RENDER_ID: &str = "rendering:id";

    pub const WARNING: &str = "extract:warning";
    pub const EMBEDDED_STREAM_EXCEPTION: &str = "extract:embeddedStreamException";
    pub const WRITE_LIMIT_REACHED: &str = "extract:writeLimitReached";
}

/// What kind of embedded payload a metadata record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbeddedResourceType {
    Attachment,
    Inline,
    Macro,
    Metadata,
    Rendering,
    Version,
}

impl EmbeddedResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddedResourceType::Attachment => "ATTACHMENT",
            EmbeddedResourceType::Inline => "INLINE",
            EmbeddedResourceType::Macro => "MACRO",
            EmbeddedResourceType::Metadata => "METADATA",
            EmbeddedResourceType::Rendering => "RENDERING",
            EmbeddedResourceType::Version => "VERSION",
        }
    }
}

impl fmt::Display for EmbeddedResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only, multi-valued key/value record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    values: BTreeMap<String, Vec<String>>,
}

impl Metadata {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`.
    pub fn add(&mut self, key: &str, value: impl ToString) {
        self.values
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Replace all values under `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.values.insert(key.to_string(), vec![value.to_string()]);
    }

    /// Set only when a value is present and not blank.
    pub fn set_if_present(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            self.set(key, v);
        }
    }

    /// Append only if the value is not already recorded under `key`.
    pub fn add_unique(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        let entry = self.values.entry(key.to_string()).or_default();
        if !entry.contains(&value) {
            entry.push(value);
        }
    }

    /// First value under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values under `key`.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.values.remove(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_set() {
        let mut m = Metadata::new();
        m.add(keys::CHARS_PER_PAGE, 10);
        m.add(keys::CHARS_PER_PAGE, 20);
        assert_eq!(m.get_all(keys::CHARS_PER_PAGE), &["10", "20"]);
        assert_eq!(m.get(keys::CHARS_PER_PAGE), Some("10"));

        m.set(keys::CHARS_PER_PAGE, 5);
        assert_eq!(m.get_all(keys::CHARS_PER_PAGE), &["5"]);
    }

    #[test]
    fn test_typed_accessors() {
        let mut m = Metadata::new();
        m.set(keys::N_PAGES, 12);
        m.set(keys::ENCRYPTED, false);
        assert_eq!(m.get_i64(keys::N_PAGES), Some(12));
        assert_eq!(m.get_bool(keys::ENCRYPTED), Some(false));
        assert_eq!(m.get_i64("missing"), None);
    }

    #[test]
    fn test_add_unique_and_blank() {
        let mut m = Metadata::new();
        m.add_unique(keys::ACTION_TYPES, "Launch");
        m.add_unique(keys::ACTION_TYPES, "Launch");
        assert_eq!(m.get_all(keys::ACTION_TYPES).len(), 1);

        m.set_if_present(keys::TITLE, Some("   "));
        m.set_if_present(keys::SUBJECT, None);
        assert!(!m.contains(keys::TITLE));
        assert!(!m.contains(keys::SUBJECT));
    }

    #[test]
    fn test_serializes_as_map() {
        let mut m = Metadata::new();
        m.add("a", "1");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"a":["1"]}"#);
    }
}
