//! Copies a `lopdf` object table into the [`Document`] model.
//!
//! Trees that may loop in the file (outline, name tree, form fields,
//! structure tree) are built with a work queue and an object-id memo, so a
//! cycle in the file becomes a cycle of arena indices instead of unbounded
//! recursion here. Bounding those walks is the pipeline's job.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use lopdf::{Dictionary, Object, Stream};

use crate::error::{Error, Result};
use crate::model::{
    AcroForm, Action, ActionKind, ActionTrigger, Annotation, AnnotationKind, ComplexFileSpec,
    DocInfo, Document, EmbeddedFile, FieldKind, FileSpec, FileSpecId, FileVariant, FormField,
    MarkupText, NameTree, NameTreeNode, ObjectId, Outline, Page, PageImage, Permissions,
    Platform, Rect, Signature, StructElement, StructKid, StructTree, TriggeredAction,
};
use crate::parser::backend::decode_text_simple;
use crate::parser::date::parse_pdf_date;

/// Longest chain of indirect references followed.
const MAX_DEREF: usize = 32;

/// Annotation subtypes that carry markup text.
const MARKUP_SUBTYPES: &[&str] = &[
    "Text", "FreeText", "Line", "Square", "Circle", "Polygon", "PolyLine", "Highlight",
    "Underline", "Squiggly", "StrikeOut", "Stamp", "Caret", "Ink", "Sound", "Redact",
];

// ---------------------------------------------------------------------------
// Object helpers
// ---------------------------------------------------------------------------

pub(crate) fn deref<'a>(doc: &'a lopdf::Document, mut obj: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_DEREF {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            _ => return Some(obj),
        }
    }
    None
}

pub(crate) fn as_dict<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match deref(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn entry<'a>(
    doc: &'a lopdf::Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    deref(doc, dict.get(key).ok()?)
}

pub(crate) fn entry_dict<'a>(
    doc: &'a lopdf::Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    as_dict(doc, dict.get(key).ok()?)
}

pub(crate) fn entry_array<'a>(
    doc: &'a lopdf::Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    match entry(doc, dict, key)? {
        Object::Array(items) => Some(items),
        _ => None,
    }
}

pub(crate) fn entry_name(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match entry(doc, dict, key)? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

/// A text string, or a name where a lenient reader would accept one.
pub(crate) fn entry_text(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    object_text(deref(doc, dict.get(key).ok()?)?)
}

fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_simple(bytes)),
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

pub(crate) fn entry_number(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    number(entry(doc, dict, key)?)
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn reference(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    match dict.get(key).ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

/// Page attribute looked up through `/Parent` when absent on the page.
pub(crate) fn inherited<'a>(
    doc: &'a lopdf::Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_DEREF {
        if let Some(value) = entry(doc, node, key) {
            return Some(value);
        }
        node = entry_dict(doc, node, b"Parent")?;
    }
    None
}

/// Decoded stream data; unfiltered streams are returned as stored.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::Embedded(format!("cannot decode stream: {e}")))
}

fn referenced_stream_bytes(doc: &lopdf::Document, obj: &Object) -> Option<Vec<u8>> {
    match deref(doc, obj)? {
        Object::Stream(s) => stream_bytes(s).ok(),
        _ => None,
    }
}

/// Last filter of an image stream, mapped to the file suffix it is saved as.
pub(crate) fn image_suffix(doc: &lopdf::Document, dict: &Dictionary) -> &'static str {
    let filter = match entry(doc, dict, b"Filter") {
        Some(Object::Name(n)) => Some(n.as_slice()),
        Some(Object::Array(items)) => items.last().and_then(|o| match o {
            Object::Name(n) => Some(n.as_slice()),
            _ => None,
        }),
        _ => None,
    };
    match filter {
        Some(b"DCTDecode") => "jpg",
        Some(b"JPXDecode") => "jp2",
        _ => "png",
    }
}

// ---------------------------------------------------------------------------
// Graph reader
// ---------------------------------------------------------------------------

/// Read the whole object graph. `permissions` come from the encryption
/// dictionary when the file was encrypted.
pub(crate) fn read_document(
    doc: &lopdf::Document,
    permissions: Option<Permissions>,
    max_depth: usize,
) -> Result<Document> {
    GraphReader {
        doc,
        max_depth,
        model: Document::default(),
        spec_index: HashMap::new(),
    }
    .read(permissions)
}

struct GraphReader<'a> {
    doc: &'a lopdf::Document,
    max_depth: usize,
    model: Document,
    /// File-spec object id to table index
    spec_index: HashMap<ObjectId, FileSpecId>,
}

impl<'a> GraphReader<'a> {
    fn read(mut self, permissions: Option<Permissions>) -> Result<Document> {
        let doc = self.doc;
        self.model.version = doc.version.clone();
        self.model.encrypted = permissions.is_some();
        self.model.permissions = permissions.unwrap_or_default();
        if let Some(info) = entry_dict(doc, &doc.trailer, b"Info") {
            self.model.info = self.read_info(info);
        }

        let catalog = entry_dict(doc, &doc.trailer, b"Root")
            .ok_or_else(|| Error::PdfParse("missing document catalog".into()))?;

        for (index, id) in doc.get_pages().into_values().enumerate() {
            let page = self.read_page(index, id);
            self.model.pages.push(page);
        }
        log::debug!("read {} pages", self.model.pages.len());

        self.model.language = entry_text(doc, catalog, b"Lang");
        self.model.has_collection = catalog.has(b"Collection");
        self.model.xmp = catalog
            .get(b"Metadata")
            .ok()
            .and_then(|o| referenced_stream_bytes(doc, o));

        if let Some(open) = catalog.get(b"OpenAction").ok() {
            self.model.actions.open = self.read_action(open);
        }
        if let Some(aa) = entry_dict(doc, catalog, b"AA") {
            let [wc, ws, ds, wp, dp] = [b"WC".as_slice(), b"WS", b"DS", b"WP", b"DP"]
                .map(|key| aa.get(key).ok().and_then(|o| self.read_action(o)));
            let actions = &mut self.model.actions;
            actions.before_close = wc;
            actions.before_save = ws;
            actions.after_save = ds;
            actions.before_print = wp;
            actions.after_print = dp;
        }
        if let Some(outlines) = entry_dict(doc, catalog, b"Outlines") {
            self.model.outline = Some(self.read_outline(outlines));
        }
        if let Some(tree) = entry_dict(doc, catalog, b"Names")
            .and_then(|names| names.get(b"EmbeddedFiles").ok())
        {
            self.model.embedded_files = self.read_name_tree(tree);
        }
        if let Some(form) = entry_dict(doc, catalog, b"AcroForm") {
            self.model.acro_form = Some(self.read_acro_form(form));
        }
        if let Some(root) = entry_dict(doc, catalog, b"StructTreeRoot") {
            self.model.structure = Some(self.read_structure(root));
        }

        self.scan_file_specs();
        Ok(self.model)
    }

    fn read_info(&self, info: &Dictionary) -> DocInfo {
        let doc = self.doc;
        let mut out = DocInfo {
            title: entry_text(doc, info, b"Title"),
            author: entry_text(doc, info, b"Author"),
            subject: entry_text(doc, info, b"Subject"),
            keywords: entry_text(doc, info, b"Keywords"),
            creator: entry_text(doc, info, b"Creator"),
            producer: entry_text(doc, info, b"Producer"),
            created: entry_text(doc, info, b"CreationDate").and_then(|d| parse_pdf_date(&d)),
            modified: entry_text(doc, info, b"ModDate").and_then(|d| parse_pdf_date(&d)),
            trapped: entry_text(doc, info, b"Trapped"),
            ..DocInfo::default()
        };
        const STANDARD: &[&[u8]] = &[
            b"Title", b"Author", b"Subject", b"Keywords", b"Creator", b"Producer",
            b"CreationDate", b"ModDate", b"Trapped",
        ];
        for (key, value) in info.iter() {
            if STANDARD.contains(&key.as_slice()) {
                continue;
            }
            if let Some(text) = deref(doc, value).and_then(object_text) {
                out.custom.insert(String::from_utf8_lossy(key).into_owned(), text);
            }
        }
        out
    }

    fn read_page(&mut self, index: usize, id: ObjectId) -> Page {
        let doc = self.doc;
        let mut page = Page::new(index);
        page.object_id = Some(id);
        let Ok(dict) = doc.get_dictionary(id) else {
            log::warn!("page {}: object {:?} is not a dictionary", index + 1, id);
            return page;
        };

        if let Some(rotate) = inherited(doc, dict, b"Rotate").and_then(number) {
            page.rotation = (rotate as i32).rem_euclid(360);
        }
        if let Some(Object::Array(edges)) = inherited(doc, dict, b"MediaBox") {
            let values: Vec<f32> = edges.iter().filter_map(|o| deref(doc, o).and_then(number)).collect();
            if let [x0, y0, x1, y1] = values[..] {
                page.media_box = Rect::new(x0, y0, x1, y1);
            }
        }

        if let Some(annots) = entry_array(doc, dict, b"Annots") {
            for annot in annots {
                if let Some(annot) = as_dict(doc, annot) {
                    let annotation = self.read_annotation(annot);
                    page.annotations.push(annotation);
                }
            }
        }

        if let Some(aa) = entry_dict(doc, dict, b"AA") {
            if let Ok(open) = aa.get(b"O") {
                page.actions.open = self.read_action(open);
            }
            if let Ok(close) = aa.get(b"C") {
                page.actions.close = self.read_action(close);
            }
        }

        if let Some(resources) = inherited(doc, dict, b"Resources").and_then(|o| as_dict(doc, o)) {
            page.font_names = self.font_descriptor_names(resources);
            page.images = self.page_images(resources);
        }
        page.xmp = dict
            .get(b"Metadata")
            .ok()
            .and_then(|o| referenced_stream_bytes(doc, o));
        page
    }

    fn font_descriptor_names(&self, resources: &Dictionary) -> Vec<String> {
        let doc = self.doc;
        let mut names = BTreeSet::new();
        let Some(fonts) = entry_dict(doc, resources, b"Font") else {
            return Vec::new();
        };
        for (_, font) in fonts.iter() {
            let Some(font) = as_dict(doc, font) else { continue };
            let descriptor = entry_dict(doc, font, b"FontDescriptor").or_else(|| {
                entry_array(doc, font, b"DescendantFonts")
                    .and_then(|d| d.first())
                    .and_then(|d| as_dict(doc, d))
                    .and_then(|d| entry_dict(doc, d, b"FontDescriptor"))
            });
            if let Some(name) = descriptor.and_then(|d| entry_name(doc, d, b"FontName")) {
                names.insert(name);
            }
        }
        names.into_iter().collect()
    }

    fn page_images(&self, resources: &Dictionary) -> Vec<PageImage> {
        let doc = self.doc;
        let Some(xobjects) = entry_dict(doc, resources, b"XObject") else {
            return Vec::new();
        };
        let mut images = Vec::new();
        for (name, obj) in xobjects.iter() {
            let Object::Reference(id) = obj else { continue };
            let Ok(Object::Stream(stream)) = doc.get_object(*id) else { continue };
            if entry_name(doc, &stream.dict, b"Subtype").as_deref() != Some("Image") {
                continue;
            }
            let dim = |key: &[u8]| entry_number(doc, &stream.dict, key).unwrap_or(0.0).max(0.0) as u32;
            images.push(PageImage {
                id: *id,
                name: String::from_utf8_lossy(name).into_owned(),
                width: dim(b"Width"),
                height: dim(b"Height"),
                suffix: image_suffix(doc, &stream.dict).to_string(),
            });
        }
        images
    }

    fn read_annotation(&mut self, dict: &Dictionary) -> Annotation {
        let doc = self.doc;
        let subtype = entry_name(doc, dict, b"Subtype");
        let markup = || MarkupText {
            title: entry_text(doc, dict, b"T"),
            subject: entry_text(doc, dict, b"Subj"),
            contents: entry_text(doc, dict, b"Contents"),
        };
        let kind = match subtype.as_deref() {
            Some("FileAttachment") => AnnotationKind::FileAttachment {
                file: dict.get(b"FS").ok().and_then(|fs| self.file_spec(fs)),
                attachment_name: entry_text(doc, dict, b"Name"),
                markup: markup(),
            },
            Some("Link") => AnnotationKind::Link,
            Some("Widget") => AnnotationKind::Widget,
            Some(s) if MARKUP_SUBTYPES.contains(&s) => AnnotationKind::Markup(markup()),
            _ => AnnotationKind::Other,
        };

        let action = dict
            .get(b"A")
            .ok()
            .or_else(|| dict.get(b"Dest").ok())
            .and_then(|a| self.read_action(a));

        let mut additional_actions = Vec::new();
        if let Some(aa) = entry_dict(doc, dict, b"AA") {
            for key in [b"Bl".as_slice(), b"D", b"E", b"Fo", b"PC", b"PI", b"PO", b"PV", b"U", b"X"] {
                let Some(trigger) = ActionTrigger::from_annotation_key(key) else { continue };
                if let Some(action) = aa.get(key).ok().and_then(|a| self.read_action(a)) {
                    additional_actions.push(TriggeredAction::new(trigger, action));
                }
            }
        }

        let nested_file_specs = if matches!(kind, AnnotationKind::FileAttachment { .. }) {
            Vec::new()
        } else {
            self.nested_file_specs(dict)
        };

        Annotation {
            name: entry_text(doc, dict, b"NM"),
            subtype,
            kind,
            action,
            additional_actions,
            nested_file_specs,
            has_3d_data: dict.has(b"3DD"),
        }
    }

    /// File specifications anywhere below an annotation dictionary.
    fn nested_file_specs(&mut self, dict: &Dictionary) -> Vec<FileSpecId> {
        let doc = self.doc;
        let mut found: Vec<&Object> = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: Vec<(&Object, usize)> = dict.iter().map(|(_, v)| (v, 1)).collect();
        while let Some((obj, depth)) = stack.pop() {
            if depth > self.max_depth {
                continue;
            }
            if let Object::Reference(id) = obj {
                if !seen.insert(*id) {
                    continue;
                }
            }
            match deref(doc, obj) {
                Some(Object::Dictionary(d)) => {
                    if entry_name(doc, d, b"Type").as_deref() == Some("Filespec") {
                        found.push(obj);
                    }
                    stack.extend(d.iter().filter(|(k, _)| k.as_slice() != b"Parent").map(|(_, v)| (v, depth + 1)));
                }
                Some(Object::Array(items)) => stack.extend(items.iter().map(|v| (v, depth + 1))),
                _ => {}
            }
        }
        found.into_iter().filter_map(|obj| self.file_spec(obj)).collect()
    }

    /// Intern a file specification (string or dictionary).
    fn file_spec(&mut self, obj: &Object) -> Option<FileSpecId> {
        let doc = self.doc;
        let id = match obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(existing) = id.and_then(|id| self.spec_index.get(&id)) {
            return Some(*existing);
        }

        let spec = match deref(doc, obj)? {
            Object::String(bytes, _) => FileSpec::Simple {
                file: decode_text_simple(bytes),
            },
            Object::Dictionary(dict) => FileSpec::Complex(self.complex_file_spec(dict)),
            _ => return None,
        };
        let spec_id = self.model.add_file_spec(spec);
        if let Some(id) = id {
            self.spec_index.insert(id, spec_id);
        }
        Some(spec_id)
    }

    fn complex_file_spec(&self, dict: &Dictionary) -> ComplexFileSpec {
        let doc = self.doc;
        let ef = entry_dict(doc, dict, b"EF");
        let mut variants = Vec::new();
        for platform in Platform::ALL {
            let key = platform.key();
            let mut file = ef.and_then(|ef| self.embedded_file(ef, key));
            if file.is_none() && platform == Platform::Default {
                file = ef.and_then(|ef| self.embedded_file(ef, b"UF"));
            }
            let name = entry_text(doc, dict, key);
            if name.is_some() || file.is_some() {
                variants.push(FileVariant { platform, name, file });
            }
        }
        ComplexFileSpec {
            unicode_name: entry_text(doc, dict, b"UF"),
            description: entry_text(doc, dict, b"Desc"),
            relationship: entry_name(doc, dict, b"AFRelationship"),
            variants,
        }
    }

    fn embedded_file(&self, ef: &Dictionary, key: &[u8]) -> Option<EmbeddedFile> {
        let doc = self.doc;
        let id = reference(ef, key)?;
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return None;
        };
        let size = entry_dict(doc, &stream.dict, b"Params")
            .and_then(|p| entry_number(doc, p, b"Size"))
            .map(|s| s.max(0.0) as u64);
        Some(EmbeddedFile {
            id,
            subtype: entry_name(doc, &stream.dict, b"Subtype"),
            size,
        })
    }

    /// Every `/Filespec` dictionary with an `/EF` entry, in object order.
    fn scan_file_specs(&mut self) {
        let doc = self.doc;
        let ids: Vec<ObjectId> = doc
            .objects
            .iter()
            .filter_map(|(id, obj)| match obj {
                Object::Dictionary(d)
                    if entry_name(doc, d, b"Type").as_deref() == Some("Filespec") && d.has(b"EF") =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .collect();
        for id in ids {
            if let Some(spec) = self.file_spec(&Object::Reference(id)) {
                self.model.scanned_file_specs.push(spec);
            }
        }
    }

    fn read_action(&mut self, obj: &Object) -> Option<Action> {
        let doc = self.doc;
        let dict = match deref(doc, obj)? {
            Object::Dictionary(d) => d,
            Object::Array(_) | Object::Name(_) | Object::String(..) => {
                return Some(Action::new(ActionKind::Destination));
            }
            _ => return None,
        };
        let Some(subtype) = entry_name(doc, dict, b"S") else {
            return dict.has(b"D").then(|| Action::new(ActionKind::Destination));
        };
        let kind = match subtype.as_str() {
            "ImportData" => ActionKind::ImportData {
                file: dict.get(b"F").ok().and_then(|f| self.file_spec(f)),
            },
            "GoToR" => ActionKind::RemoteGoTo {
                file: dict.get(b"F").ok().and_then(|f| self.file_spec(f)),
            },
            "Launch" => {
                let win = entry_dict(doc, dict, b"Win");
                let win_text = |key: &[u8]| win.and_then(|w| entry_text(doc, w, key));
                ActionKind::Launch {
                    file_name: win_text(b"F"),
                    default_directory: win_text(b"D"),
                    operation: win_text(b"O"),
                    parameters: win_text(b"P"),
                    file: dict.get(b"F").ok().and_then(|f| self.file_spec(f)),
                }
            }
            "JavaScript" => ActionKind::JavaScript {
                script: match entry(doc, dict, b"JS") {
                    Some(Object::String(bytes, _)) => Some(decode_text_simple(bytes)),
                    Some(Object::Stream(s)) => stream_bytes(s).ok().map(|b| decode_text_simple(&b)),
                    _ => None,
                },
            },
            "URI" => ActionKind::Uri {
                uri: entry_text(doc, dict, b"URI"),
            },
            _ => ActionKind::Other { subtype },
        };
        Some(Action::new(kind))
    }

    fn read_outline(&mut self, root: &Dictionary) -> Outline {
        let mut outline = Outline::new();
        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();

        if let Some(first) = reference(root, b"First") {
            let slot = intern(first, &mut index, &mut queue, || outline.push(""));
            outline.first = Some(slot);
        }
        while let Some(id) = queue.pop_front() {
            let slot = index[&id];
            let Ok(item) = self.doc.get_dictionary(id) else { continue };
            let title = entry_text(self.doc, item, b"Title").unwrap_or_default();
            let action = item
                .get(b"A")
                .ok()
                .or_else(|| item.get(b"Dest").ok())
                .and_then(|a| self.read_action(a));
            let first_child = reference(item, b"First")
                .map(|c| intern(c, &mut index, &mut queue, || outline.push("")));
            let next_sibling = reference(item, b"Next")
                .map(|n| intern(n, &mut index, &mut queue, || outline.push("")));

            let filled = &mut outline.items[slot];
            filled.title = title;
            filled.action = action;
            filled.first_child = first_child;
            filled.next_sibling = next_sibling;
        }
        outline
    }

    fn read_name_tree(&mut self, root: &Object) -> Option<NameTree> {
        let doc = self.doc;
        let root_dict = as_dict(doc, root)?;
        let mut tree = NameTree::default();
        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();

        let root_slot = tree.push(NameTreeNode::default());
        tree.root = root_slot;
        if let Object::Reference(id) = root {
            index.insert(*id, tree.root);
        }
        let mut pending: Vec<(usize, &Dictionary)> = vec![(tree.root, root_dict)];

        loop {
            for (slot, node) in pending.drain(..) {
                let mut names = Vec::new();
                if let Some(pairs) = entry_array(doc, node, b"Names") {
                    for pair in pairs.chunks(2) {
                        let [key, value] = pair else { continue };
                        let Some(key) = deref(doc, key).and_then(object_text) else { continue };
                        if let Some(spec) = self.file_spec(value) {
                            names.push((key, spec));
                        }
                    }
                }
                let mut kids = Vec::new();
                for kid in entry_array(doc, node, b"Kids").into_iter().flatten() {
                    if let Object::Reference(id) = kid {
                        kids.push(intern(*id, &mut index, &mut queue, || {
                            tree.push(NameTreeNode::default())
                        }));
                    }
                }
                tree.nodes[slot] = NameTreeNode { names, kids };
            }
            let Some(id) = queue.pop_front() else { break };
            if let Ok(node) = doc.get_dictionary(id) {
                pending.push((index[&id], node));
            }
        }
        Some(tree)
    }

    fn read_acro_form(&mut self, form: &Dictionary) -> AcroForm {
        let doc = self.doc;
        let mut acro = AcroForm {
            xfa: self.read_xfa(form),
            ..AcroForm::default()
        };
        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();
        let mut field_types: HashMap<ObjectId, String> = HashMap::new();

        for field in entry_array(doc, form, b"Fields").into_iter().flatten() {
            if let Object::Reference(id) = field {
                let slot = intern(*id, &mut index, &mut queue, || acro.push(FormField::text("", "")));
                acro.roots.push(slot);
            }
        }

        while let Some(id) = queue.pop_front() {
            let slot = index[&id];
            let Ok(dict) = doc.get_dictionary(id) else { continue };
            let field_type = entry_name(doc, dict, b"FT").or_else(|| field_types.get(&id).cloned());

            let mut children = Vec::new();
            let mut widgets = Vec::new();
            if dict.has(b"Subtype") {
                widgets.push(self.read_annotation(dict));
            }
            for kid in entry_array(doc, dict, b"Kids").into_iter().flatten() {
                let Object::Reference(kid_id) = kid else { continue };
                let Ok(kid_dict) = doc.get_dictionary(*kid_id) else { continue };
                if kid_dict.has(b"T") {
                    if let Some(ft) = &field_type {
                        field_types.entry(*kid_id).or_insert_with(|| ft.clone());
                    }
                    children.push(intern(*kid_id, &mut index, &mut queue, || {
                        acro.push(FormField::text("", ""))
                    }));
                } else {
                    widgets.push(self.read_annotation(kid_dict));
                }
            }

            let mut actions = Vec::new();
            if let Some(aa) = entry_dict(doc, dict, b"AA") {
                for key in [b"C".as_slice(), b"F", b"K", b"V"] {
                    let Some(trigger) = ActionTrigger::from_field_key(key) else { continue };
                    if let Some(action) = aa.get(key).ok().and_then(|a| self.read_action(a)) {
                        actions.push(TriggeredAction::new(trigger, action));
                    }
                }
            }

            let kind = if field_type.as_deref() == Some("Sig") {
                FieldKind::Signature {
                    signature: entry_dict(doc, dict, b"V").map(|v| Signature {
                        name: entry_text(doc, v, b"Name"),
                        contact_info: entry_text(doc, v, b"ContactInfo"),
                        location: entry_text(doc, v, b"Location"),
                        reason: entry_text(doc, v, b"Reason"),
                        date: entry_text(doc, v, b"M").and_then(|m| parse_pdf_date(&m)),
                    }),
                }
            } else if children.is_empty() {
                FieldKind::Terminal
            } else {
                FieldKind::NonTerminal { children }
            };

            acro.fields[slot] = FormField {
                partial_name: entry_text(doc, dict, b"T"),
                alternate_name: entry_text(doc, dict, b"TU"),
                value: self.field_value(dict),
                kind,
                actions,
                widgets,
            };
        }
        acro
    }

    fn field_value(&self, dict: &Dictionary) -> Option<String> {
        match entry(self.doc, dict, b"V")? {
            Object::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .filter_map(|o| deref(self.doc, o).and_then(object_text))
                    .collect();
                Some(values.join(", "))
            }
            other => object_text(other),
        }
    }

    fn read_xfa(&self, form: &Dictionary) -> Option<Vec<u8>> {
        let doc = self.doc;
        match entry(doc, form, b"XFA")? {
            Object::Stream(s) => stream_bytes(s).ok(),
            Object::Array(parts) => {
                let mut packet = Vec::new();
                for part in parts.iter().skip(1).step_by(2) {
                    if let Some(bytes) = referenced_stream_bytes(doc, part) {
                        packet.extend_from_slice(&bytes);
                    }
                }
                (!packet.is_empty()).then_some(packet)
            }
            _ => None,
        }
    }

    fn read_structure(&mut self, root: &Dictionary) -> StructTree {
        let doc = self.doc;
        let mut tree = StructTree::default();
        if let Some(role_map) = entry_dict(doc, root, b"RoleMap") {
            for (key, value) in role_map.iter() {
                if let Some(Object::Name(target)) = deref(doc, value) {
                    tree.role_map.insert(
                        String::from_utf8_lossy(key).into_owned(),
                        String::from_utf8_lossy(target).into_owned(),
                    );
                }
            }
        }

        let mut index: HashMap<ObjectId, usize> = HashMap::new();
        let mut pending: VecDeque<(usize, &Dictionary)> = VecDeque::new();
        let mut cx = StructContext {
            doc,
            tree: &mut tree,
            index: &mut index,
            pending: &mut pending,
        };
        let root_kids = root.get(b"K").ok().map(|k| cx.kids(k, None)).unwrap_or_default();
        while let Some((slot, element)) = cx.pending.pop_front() {
            let page = reference(element, b"Pg");
            let kids = element.get(b"K").ok().map(|k| cx.kids(k, page));
            cx.tree.elements[slot] = StructElement {
                role: entry_name(doc, element, b"S").unwrap_or_default(),
                page,
                kids,
            };
        }
        tree.root = root_kids;
        tree
    }
}

/// Arena slot for an object id, allocating and queueing it on first sight.
fn intern(
    id: ObjectId,
    index: &mut HashMap<ObjectId, usize>,
    queue: &mut VecDeque<ObjectId>,
    allocate: impl FnOnce() -> usize,
) -> usize {
    if let Some(slot) = index.get(&id) {
        return *slot;
    }
    let slot = allocate();
    index.insert(id, slot);
    queue.push_back(id);
    slot
}

struct StructContext<'d, 't> {
    doc: &'d lopdf::Document,
    tree: &'t mut StructTree,
    index: &'t mut HashMap<ObjectId, usize>,
    pending: &'t mut VecDeque<(usize, &'d Dictionary)>,
}

impl<'d, 't> StructContext<'d, 't> {
    fn kids(&mut self, k: &'d Object, page: Option<ObjectId>) -> Vec<StructKid> {
        match deref(self.doc, k) {
            Some(Object::Array(items)) => items.iter().filter_map(|kid| self.kid(kid, page)).collect(),
            Some(_) => self.kid(k, page).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn kid(&mut self, kid: &'d Object, page: Option<ObjectId>) -> Option<StructKid> {
        let doc = self.doc;
        let dict = match deref(doc, kid)? {
            Object::Integer(mcid) => return Some(StructKid::Mcid { mcid: *mcid, page }),
            Object::Dictionary(d) => d,
            _ => return None,
        };
        match entry_name(doc, dict, b"Type").as_deref() {
            Some("MCR") => {
                let mcid = entry_number(doc, dict, b"MCID")? as i64;
                Some(StructKid::Mcid {
                    mcid,
                    page: reference(dict, b"Pg").or(page),
                })
            }
            Some("OBJR") => {
                let target = entry_dict(doc, dict, b"Obj");
                let uri = target
                    .and_then(|t| entry_dict(doc, t, b"A"))
                    .and_then(|a| entry_text(doc, a, b"URI"));
                Some(StructKid::Link { uri })
            }
            _ => {
                let slot = match kid {
                    Object::Reference(id) => {
                        if let Some(slot) = self.index.get(id) {
                            return Some(StructKid::Element(*slot));
                        }
                        let slot = self.allocate(dict);
                        self.index.insert(*id, slot);
                        slot
                    }
                    _ => self.allocate(dict),
                };
                Some(StructKid::Element(slot))
            }
        }
    }

    fn allocate(&mut self, dict: &'d Dictionary) -> usize {
        let slot = self.tree.push("", None, Vec::new());
        self.pending.push_back((slot, dict));
        slot
    }
}
