//! Attachments, metadata packets and earlier revisions.
//!
//! Every embedded file stream funnels through [`Walk::process_file_spec`],
//! which extracts a stream at most once however many paths reach it.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use super::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{
    keys, ComplexFileSpec, Document, EmbeddedResourceType, FileSpec, FileSpecId, Metadata, NameTree,
};
use crate::render::{Attributes, EmbeddedContentHandler};

/// Collect the entries of the embedded-files name tree, breadth of each
/// node before its kids.
///
/// Nodes deeper than `max_depth` are not visited; the entries gathered up
/// to that point stay in `out` and the walk reports `RecursionLimit`.
pub fn collect_names(
    tree: &NameTree,
    node: usize,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<usize>,
    out: &mut BTreeMap<String, FileSpecId>,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::RecursionLimit(max_depth));
    }
    if !seen.insert(node) {
        return Ok(());
    }
    let Some(current) = tree.nodes.get(node) else {
        return Ok(());
    };
    for (name, spec) in &current.names {
        out.entry(name.clone()).or_insert(*spec);
    }
    for &kid in &current.kids {
        collect_names(tree, kid, depth + 1, max_depth, seen, out)?;
    }
    Ok(())
}

fn first_non_blank<'s>(candidates: [Option<&'s str>; 3]) -> &'s str {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or("")
}

impl Walk<'_> {
    /// Name tree first, then the whole-document scan.
    pub(super) fn extract_embedded_documents(&mut self, doc: &Document) -> Result<()> {
        if let Some(tree) = &doc.embedded_files {
            let mut names = BTreeMap::new();
            let walked = collect_names(
                tree,
                tree.root,
                0,
                self.options.max_recursion_depth,
                &mut HashSet::new(),
                &mut names,
            );
            debug!("{} entries in the embedded files tree", names.len());
            for (name, spec) in names {
                self.process_file_spec(&name, Some(spec), Attributes::new())?;
            }
            if let Err(err) = walked {
                self.catchable(err)?;
            }
        }
        for &spec in &doc.scanned_file_specs {
            self.process_file_spec("", Some(spec), Attributes::new())?;
        }
        Ok(())
    }

    /// Extract a file specification: every embedded variant of a complex
    /// spec, a `linked` marker for a simple one.
    pub(super) fn process_file_spec(
        &mut self,
        display_name: &str,
        spec: Option<FileSpecId>,
        mut attributes: Attributes,
    ) -> Result<()> {
        let doc = std::rc::Rc::clone(&self.doc);
        match spec.and_then(|id| doc.file_spec(id)) {
            None => Ok(()),
            Some(FileSpec::Simple { file }) => {
                attributes.set("class", "linked");
                attributes.set("id", file.as_str());
                self.empty("div", &attributes)
            }
            Some(FileSpec::Complex(complex)) => {
                if !attributes.contains("source") {
                    attributes.set("source", "attachment");
                }
                self.extract_complex(display_name, complex, attributes)
            }
        }
    }

    /// Extract a complex spec found outside the file-spec graph walk, e.g.
    /// on an annotation.
    pub(super) fn extract_complex_from(
        &mut self,
        display_name: &str,
        source: &str,
        spec: FileSpecId,
    ) -> Result<()> {
        let doc = std::rc::Rc::clone(&self.doc);
        if let Some(FileSpec::Complex(complex)) = doc.file_spec(spec) {
            let attributes = Attributes::new().with("source", source);
            self.extract_complex(display_name, complex, attributes)?;
        }
        Ok(())
    }

    fn extract_complex(
        &mut self,
        display_name: &str,
        spec: &ComplexFileSpec,
        mut attributes: Attributes,
    ) -> Result<()> {
        let extractor = self.extractor;
        for variant in &spec.variants {
            let Some(file) = &variant.file else {
                continue;
            };
            if !self.state.extracted_files.insert(file.id) {
                debug!("embedded stream {:?} already extracted", file.id);
                continue;
            }
            let name = first_non_blank([
                variant.name.as_deref(),
                spec.unicode_name.as_deref(),
                Some(display_name),
            ]);

            let mut metadata = Metadata::new();
            metadata.set(keys::RESOURCE_NAME, name);
            metadata.set(keys::ORIGINAL_RESOURCE_NAME, name);
            metadata.set_if_present(keys::CONTENT_TYPE, file.subtype.as_deref());
            if let Some(size) = file.size {
                metadata.set(keys::CONTENT_LENGTH, size);
            }
            metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Attachment);
            metadata.set_if_present(keys::EMBEDDED_FILE_DESCRIPTION, spec.description.as_deref());
            metadata.set_if_present(keys::EMBEDDED_FILE_RELATIONSHIP, spec.relationship.as_deref());
            if !extractor.embedded.should_parse(&metadata) {
                continue;
            }

            let bytes = match self.provider.read_stream(file.id) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!("could not read embedded file {name}: {err}");
                    self.metadata.add(keys::EMBEDDED_STREAM_EXCEPTION, err.to_string());
                    continue;
                }
            };
            attributes.set("class", "embedded");
            attributes.set("id", name);
            self.empty("div", &attributes)?;
            self.hand_off(&bytes, &metadata, false)?;
        }
        Ok(())
    }

    /// Pass bytes to the embedded document extractor. Its output lands in
    /// the current position of the content stream.
    pub(super) fn hand_off(&mut self, bytes: &[u8], metadata: &Metadata, emit_markup: bool) -> Result<()> {
        let extractor = self.extractor;
        self.state.embedded_count += 1;
        let mut handler = EmbeddedContentHandler::new(&mut *self.handler);
        extractor
            .embedded
            .parse_embedded(bytes, metadata, &mut handler, emit_markup)
    }

    /// Catalog XMP, page XMP and the XFA packet.
    pub(super) fn hand_off_xmp(&mut self, doc: &Document) -> Result<()> {
        let extractor = self.extractor;
        let mut packets: Vec<(&[u8], &str, String)> = Vec::new();
        if let Some(xmp) = &doc.xmp {
            packets.push((xmp, "application/rdf+xml", "document-catalog".to_string()));
        }
        for page in &doc.pages {
            if let Some(xmp) = &page.xmp {
                packets.push((xmp, "application/rdf+xml", format!("page:{}", page.number())));
            }
        }
        if let Some(xfa) = doc.acro_form.as_ref().and_then(|form| form.xfa.as_deref()) {
            packets.push((xfa, "application/vnd.adobe.xdp+xml", "xfa".to_string()));
        }

        for (bytes, content_type, location) in packets {
            let mut metadata = Metadata::new();
            metadata.set(keys::CONTENT_TYPE, content_type);
            metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Metadata);
            metadata.set(keys::XMP_LOCATION, location);
            if extractor.embedded.should_parse(&metadata) {
                self.hand_off(bytes, &metadata, true)?;
            }
        }
        Ok(())
    }

    /// Every earlier revision as its own PDF.
    pub(super) fn hand_off_revisions(&mut self) -> Result<()> {
        if !self.options.parse_incremental_updates {
            return Ok(());
        }
        let Some(scan) = &self.revisions else {
            return Ok(());
        };
        let (extractor, data) = (self.extractor, self.data);
        let revisions = scan.revisions(self.options.max_incremental_updates);
        debug!("extracting {} earlier revisions", revisions.len());
        for revision in revisions {
            let mut metadata = Metadata::new();
            metadata.set(keys::INCREMENTAL_UPDATE_NUMBER, revision.number);
            metadata.set(keys::RESOURCE_NAME, format!("version-number-{}", revision.number));
            metadata.set(keys::EMBEDDED_RESOURCE_TYPE, EmbeddedResourceType::Version);
            metadata.set(keys::CONTENT_TYPE, "application/pdf");
            if extractor.embedded.should_parse(&metadata) {
                self.hand_off(&data[..revision.end], &metadata, true)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameTreeNode;

    /// A chain of `depth + 1` nodes, one entry each.
    fn chain(depth: usize) -> NameTree {
        let mut tree = NameTree::default();
        for level in 0..=depth {
            let kids = if level < depth { vec![level + 1] } else { Vec::new() };
            tree.push(NameTreeNode {
                names: vec![(format!("file{level:03}"), level)],
                kids,
            });
        }
        tree
    }

    #[test]
    fn test_deep_tree_is_truncated() {
        let tree = chain(150);
        let mut names = BTreeMap::new();
        let result = collect_names(&tree, 0, 0, 100, &mut HashSet::new(), &mut names);
        assert!(matches!(result, Err(Error::RecursionLimit(100))));
        assert_eq!(names.len(), 101);
        assert!(names.contains_key("file100"));
        assert!(!names.contains_key("file101"));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut tree = chain(2);
        tree.nodes[2].kids.push(0);
        let mut names = BTreeMap::new();
        collect_names(&tree, 0, 0, 100, &mut HashSet::new(), &mut names).unwrap();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_name_fallback() {
        assert_eq!(first_non_blank([None, Some(" "), Some("shown.txt")]), "shown.txt");
        assert_eq!(first_non_blank([Some("a.pdf"), Some("b.pdf"), None]), "a.pdf");
        assert_eq!(first_non_blank([None, None, None]), "");
    }
}
