//! Page-model provider backed by `lopdf`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use lopdf::{Dictionary, Object};

use crate::error::{Error, Result};
use crate::model::{Document, ImagePayload, Matrix, ObjectId, PageImage, Permissions};
use crate::parser::backend::{DocumentLoader, GlyphVisitor, PageModelProvider};
use crate::parser::content::{
    malformed, ContentInterpreter, ContentOp, FontMetrics, FormXObject, PdfValue, ResourceScope,
};
use crate::parser::graph::{
    as_dict, deref, entry, entry_array, entry_dict, entry_name, entry_number, inherited, number,
    read_document, stream_bytes,
};

/// Loads documents with `lopdf`.
#[derive(Debug, Clone)]
pub struct LopdfLoader {
    max_depth: usize,
}

impl Default for LopdfLoader {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl LopdfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth cap for searches inside the object graph.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl DocumentLoader for LopdfLoader {
    fn load(&self, data: &[u8], password: Option<&str>) -> Result<Box<dyn PageModelProvider>> {
        Ok(Box::new(LopdfProvider::from_bytes(data, password, self.max_depth)?))
    }
}

/// A loaded `lopdf` document plus the model read from it.
pub struct LopdfProvider {
    doc: lopdf::Document,
    model: Document,
    max_depth: usize,
}

impl LopdfProvider {
    pub fn from_bytes(data: &[u8], password: Option<&str>, max_depth: usize) -> Result<Self> {
        let mut doc = lopdf::Document::load_mem(data)?;

        let permissions = if doc.is_encrypted() {
            let flags = entry_dict(&doc, &doc.trailer, b"Encrypt")
                .and_then(|e| match entry(&doc, e, b"P") {
                    Some(Object::Integer(p)) => Some(*p),
                    _ => None,
                })
                .unwrap_or(-1);
            match password {
                Some(pw) => doc.decrypt(pw).map_err(|_| Error::InvalidPassword)?,
                None => doc.decrypt("").map_err(|_| Error::Encrypted)?,
            }
            log::debug!("decrypted document, permission flags {flags:#x}");
            Some(Permissions::from_p_flags(flags))
        } else {
            None
        };

        let model = read_document(&doc, permissions, max_depth)?;
        Ok(Self { doc, model, max_depth })
    }

    fn page_dictionary(&self, page_index: usize) -> Result<&Dictionary> {
        let id = self
            .model
            .pages
            .get(page_index)
            .and_then(|p| p.object_id)
            .ok_or_else(|| Error::PdfParse(format!("no page at index {page_index}")))?;
        Ok(self.doc.get_dictionary(id)?)
    }
}

impl PageModelProvider for LopdfProvider {
    fn document(&self) -> &Document {
        &self.model
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.model
    }

    fn visit_glyphs(
        &self,
        page_index: usize,
        prefix: Option<&Matrix>,
        visitor: &mut dyn GlyphVisitor,
    ) -> Result<()> {
        let page = self.page_dictionary(page_index)?;
        let content = page_content(&self.doc, page);
        let operations = decode_operations(&content).map_err(|e| malformed(page_index + 1, e))?;
        let resources = inherited(&self.doc, page, b"Resources").and_then(|r| as_dict(&self.doc, r));

        let scope = LopdfScope::new(&self.doc, resources);
        let initial = prefix.copied().unwrap_or_default();
        ContentInterpreter::new(page_index + 1, visitor)
            .with_max_depth(self.max_depth)
            .run(&operations, &scope, initial)
    }

    fn read_stream(&self, id: ObjectId) -> Result<Vec<u8>> {
        match self.doc.get_object(id) {
            Ok(Object::Stream(stream)) => stream_bytes(stream),
            Ok(_) => Err(Error::Embedded(format!("object {} {} is not a stream", id.0, id.1))),
            Err(e) => Err(Error::Embedded(e.to_string())),
        }
    }

    fn read_image(&self, image: &PageImage) -> Result<ImagePayload> {
        let stream = match self.doc.get_object(image.id) {
            Ok(Object::Stream(stream)) => stream,
            _ => return Err(Error::Embedded(format!("image {} is not a stream", image.name))),
        };
        match image.suffix.as_str() {
            "jpg" | "jp2" => Ok(ImagePayload::new(&image.suffix, stream.content.clone())),
            _ => {
                let samples = stream_bytes(stream)?;
                let png = encode_png(image.width, image.height, samples)?;
                Ok(ImagePayload::new("png", png))
            }
        }
    }
}

/// Concatenated content streams of a page. Unreadable parts are skipped.
fn page_content(doc: &lopdf::Document, page: &Dictionary) -> Vec<u8> {
    let mut content = Vec::new();
    let parts: Vec<&Object> = match entry(doc, page, b"Contents") {
        Some(Object::Array(items)) => items.iter().collect(),
        Some(_) => page.get(b"Contents").into_iter().collect(),
        None => Vec::new(),
    };
    for part in parts {
        if let Some(Object::Stream(stream)) = deref(doc, part) {
            match stream_bytes(stream) {
                Ok(data) => {
                    content.extend_from_slice(&data);
                    content.push(b' ');
                }
                Err(e) => log::warn!("skipping unreadable content stream: {e}"),
            }
        }
    }
    content
}

fn decode_operations(data: &[u8]) -> std::result::Result<Vec<ContentOp>, String> {
    let content = lopdf::content::Content::decode(data).map_err(|e| e.to_string())?;
    Ok(content
        .operations
        .into_iter()
        .map(|op| ContentOp {
            operator: op.operator,
            operands: op.operands.iter().map(convert_object).collect(),
        })
        .collect())
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        Object::Dictionary(d) => PdfValue::Dict(
            d.iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => PdfValue::Other,
    }
}

fn encode_png(width: u32, height: u32, mut samples: Vec<u8>) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if pixels == 0 {
        return Err(Error::Embedded("image has no pixels".into()));
    }
    let components = samples.len() / pixels;
    samples.truncate(pixels * components);
    let image = match components {
        1 => image::GrayImage::from_raw(width, height, samples).map(image::DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, samples).map(image::DynamicImage::ImageRgb8),
        n => {
            return Err(Error::Embedded(format!(
                "unsupported image layout: {n} bytes per pixel"
            )))
        }
    }
    .ok_or_else(|| Error::Embedded("image data shorter than its dimensions".into()))?;

    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Fonts and form XObjects of one resource dictionary.
struct LopdfScope<'d> {
    doc: &'d lopdf::Document,
    resources: Option<&'d Dictionary>,
    decoded: RefCell<HashMap<(Vec<u8>, Vec<u8>), Option<String>>>,
}

impl<'d> LopdfScope<'d> {
    fn new(doc: &'d lopdf::Document, resources: Option<&'d Dictionary>) -> Self {
        Self {
            doc,
            resources,
            decoded: RefCell::new(HashMap::new()),
        }
    }

    fn resource(&self, category: &[u8], name: &[u8]) -> Option<&'d Object> {
        let group = entry_dict(self.doc, self.resources?, category)?;
        group.get(name).ok()
    }

    fn font_dict(&self, name: &[u8]) -> Option<&'d Dictionary> {
        as_dict(self.doc, self.resource(b"Font", name)?)
    }
}

impl ResourceScope for LopdfScope<'_> {
    fn font(&self, name: &[u8]) -> Option<FontMetrics> {
        let doc = self.doc;
        let font = self.font_dict(name)?;
        let mut metrics = FontMetrics {
            base_name: entry_name(doc, font, b"BaseFont"),
            ..FontMetrics::default()
        };

        if entry_name(doc, font, b"Subtype").as_deref() == Some("Type0") {
            metrics.bytes_per_code = 2;
            metrics.default_width = 1000.0;
            let descendant = entry_array(doc, font, b"DescendantFonts")
                .and_then(|d| d.first())
                .and_then(|d| as_dict(doc, d));
            if let Some(cid_font) = descendant {
                if let Some(dw) = entry_number(doc, cid_font, b"DW") {
                    metrics.default_width = dw;
                }
                if let Some(w) = entry_array(doc, cid_font, b"W") {
                    metrics.cid_widths = cid_widths(doc, w);
                }
            }
            return Some(metrics);
        }

        metrics.first_char = entry_number(doc, font, b"FirstChar").unwrap_or(0.0) as u32;
        metrics.widths = entry_array(doc, font, b"Widths")
            .map(|w| {
                w.iter()
                    .map(|o| deref(doc, o).and_then(number).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(missing) = entry_dict(doc, font, b"FontDescriptor")
            .and_then(|d| entry_number(doc, d, b"MissingWidth"))
            .filter(|w| *w > 0.0)
        {
            metrics.default_width = missing;
        }
        Some(metrics)
    }

    fn decode(&self, font: &[u8], code: &[u8]) -> Option<String> {
        let key = (font.to_vec(), code.to_vec());
        if let Some(hit) = self.decoded.borrow().get(&key) {
            return hit.clone();
        }
        let text = self.font_dict(font).and_then(|dict| {
            let encoding = dict.get_font_encoding(self.doc).ok()?;
            lopdf::Document::decode_text(&encoding, code).ok()
        });
        self.decoded.borrow_mut().insert(key, text.clone());
        text
    }

    fn form(&self, name: &[u8]) -> Option<FormXObject<'_>> {
        let doc = self.doc;
        let Some(Object::Stream(stream)) = deref(doc, self.resource(b"XObject", name)?)
        else {
            return None;
        };
        if entry_name(doc, &stream.dict, b"Subtype").as_deref() != Some("Form") {
            return None;
        }
        let data = stream_bytes(stream).ok()?;
        let operations = match decode_operations(&data) {
            Ok(ops) => ops,
            Err(e) => {
                log::warn!("skipping malformed form XObject: {e}");
                return None;
            }
        };
        let matrix = match entry(doc, &stream.dict, b"Matrix") {
            Some(Object::Array(m)) if m.len() == 6 => {
                let v: Vec<f32> = m.iter().filter_map(number).collect();
                match v[..] {
                    [a, b, c, d, e, f] => Matrix::new(a, b, c, d, e, f),
                    _ => Matrix::identity(),
                }
            }
            _ => Matrix::identity(),
        };
        let resources = entry_dict(doc, &stream.dict, b"Resources").or(self.resources);
        Some(FormXObject {
            operations,
            matrix,
            resources: Box::new(LopdfScope::new(doc, resources)),
        })
    }
}

/// Largest CID; CIDs are two-byte codes.
const MAX_CID: u32 = 0xFFFF;

fn cid(value: f32) -> Option<u32> {
    (0.0..=MAX_CID as f32).contains(&value).then_some(value as u32)
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `cfirst clast w` runs.
/// Entries outside the CID range are dropped.
fn cid_widths(doc: &lopdf::Document, w: &[Object]) -> BTreeMap<u32, f32> {
    let mut widths = BTreeMap::new();
    let values: Vec<&Object> = w
        .iter()
        .filter_map(|o| deref(doc, o))
        .collect();
    let mut i = 0;
    while i < values.len() {
        let Some(start) = number(values[i]) else { break };
        match values.get(i + 1) {
            Some(Object::Array(run)) => {
                if let Some(start) = cid(start) {
                    for (offset, width) in run.iter().enumerate() {
                        let Some(code) = u32::try_from(offset)
                            .ok()
                            .and_then(|o| start.checked_add(o))
                            .filter(|c| *c <= MAX_CID)
                        else {
                            break;
                        };
                        if let Some(width) = number(width) {
                            widths.insert(code, width);
                        }
                    }
                }
                i += 2;
            }
            Some(end) => {
                let (Some(end), Some(width)) = (number(end), values.get(i + 2).and_then(|v| number(v)))
                else {
                    break;
                };
                if let Some(start) = cid(start) {
                    // float-to-int casts saturate, so negative ends give an empty run
                    for code in start..=(end as u32).min(MAX_CID) {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}
