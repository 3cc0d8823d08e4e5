//! Document-level metadata: what the graph says before the walk, and the
//! totals after it.

use chrono::{DateTime, FixedOffset, SecondsFormat};

use super::options::ExtractOptions;
use super::revisions::RevisionScan;
use super::walker::ExtractionState;
use crate::model::{keys, DocInfo, Document, Metadata, Permissions};

/// Whether the document has a structure tree worth walking.
pub fn has_marked_content(doc: &Document) -> bool {
    doc.structure
        .as_ref()
        .is_some_and(|tree| !tree.root.is_empty())
}

fn rfc3339(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Record what is known from the document graph alone.
pub fn record_document(metadata: &mut Metadata, doc: &Document) {
    metadata.set(keys::CONTENT_TYPE, "application/pdf");
    metadata.set_if_present(keys::PDF_VERSION, Some(doc.version.as_str()));
    metadata.set(keys::N_PAGES, doc.page_count());
    metadata.set(keys::ENCRYPTED, doc.encrypted);
    record_permissions(metadata, &doc.permissions);
    record_info(metadata, &doc.info);
    metadata.set_if_present(keys::LANGUAGE, doc.language.as_deref());

    let form = doc.acro_form.as_ref();
    metadata.set(keys::HAS_COLLECTION, doc.has_collection);
    metadata.set(keys::HAS_XFA, form.is_some_and(|f| f.xfa.is_some()));
    metadata.set(
        keys::HAS_XMP,
        doc.xmp.is_some() || doc.pages.iter().any(|p| p.xmp.is_some()),
    );
    metadata.set(keys::HAS_MARKED_CONTENT, has_marked_content(doc));
    metadata.set(keys::HAS_ACROFORM_FIELDS, form.is_some_and(|f| f.has_fields()));
}

fn record_permissions(metadata: &mut Metadata, permissions: &Permissions) {
    for (key, allowed) in [
        (keys::EXTRACT_CONTENT, permissions.can_extract_content),
        (keys::EXTRACT_FOR_ACCESSIBILITY, permissions.can_extract_for_accessibility),
        (keys::ASSEMBLE_DOCUMENT, permissions.can_assemble_document),
        (keys::FILL_IN_FORM, permissions.can_fill_in_form),
        (keys::CAN_MODIFY, permissions.can_modify),
        (keys::CAN_MODIFY_ANNOTATIONS, permissions.can_modify_annotations),
        (keys::CAN_PRINT, permissions.can_print),
        (keys::CAN_PRINT_FAITHFUL, permissions.can_print_faithful),
    ] {
        metadata.set(key, allowed);
    }
}

fn record_info(metadata: &mut Metadata, info: &DocInfo) {
    let pairs = [
        (&info.title, keys::TITLE, keys::DOC_INFO_TITLE),
        (&info.author, keys::CREATOR, keys::DOC_INFO_CREATOR),
        (&info.creator, keys::CREATOR_TOOL, keys::DOC_INFO_CREATOR_TOOL),
        (&info.producer, keys::PRODUCER, keys::DOC_INFO_PRODUCER),
    ];
    for (value, common, docinfo) in pairs {
        metadata.set_if_present(common, value.as_deref());
        metadata.set_if_present(docinfo, value.as_deref());
    }
    metadata.set_if_present(keys::DOC_INFO_SUBJECT, info.subject.as_deref());
    metadata.set_if_present(keys::DOC_INFO_TRAPPED, info.trapped.as_deref());

    if let Some(keywords) = info.keywords.as_deref().filter(|k| !k.trim().is_empty()) {
        metadata.set(keys::DOC_INFO_KEYWORDS, keywords);
        for keyword in keywords.split([',', ';']).map(str::trim).filter(|k| !k.is_empty()) {
            metadata.add_unique(keys::SUBJECT, keyword);
        }
    }
    if let Some(created) = &info.created {
        metadata.set(keys::CREATED, rfc3339(created));
        metadata.set(keys::DOC_INFO_CREATED, rfc3339(created));
    }
    if let Some(modified) = &info.modified {
        metadata.set(keys::MODIFIED, rfc3339(modified));
        metadata.set(keys::DOC_INFO_MODIFIED, rfc3339(modified));
    }
    for (key, value) in &info.custom {
        if !value.trim().is_empty() {
            metadata.add(&format!("{}{key}", keys::DOC_INFO_CUSTOM_PREFIX), value);
        }
    }
}

/// Document totals, written once after the last page.
pub fn finalize(
    metadata: &mut Metadata,
    state: &ExtractionState,
    scan: Option<&RevisionScan>,
    options: &ExtractOptions,
) {
    metadata.set(keys::TOTAL_UNMAPPED_CHARS, state.total_unmapped);
    if state.total_chars > 0 {
        let share = state.total_unmapped as f64 / state.total_chars as f64;
        metadata.set(keys::OVERALL_PERCENTAGE_UNMAPPED, share as f32);
    }
    metadata.set(keys::OCR_PAGE_COUNT, state.ocr_pages);
    if options.extract_inline_images || options.extract_inline_image_metadata_only {
        metadata.set(keys::IMAGE_COUNT, state.image_counter);
    }

    if options.extract_incremental_update_info {
        if let Some(scan) = scan {
            metadata.remove(keys::EOF_OFFSETS);
            for offset in &scan.eof_offsets {
                metadata.add(keys::EOF_OFFSETS, offset);
            }
            metadata.set(keys::INCREMENTAL_UPDATE_COUNT, scan.update_count());
        }
    }
}
