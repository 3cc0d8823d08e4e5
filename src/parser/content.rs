//! Content stream interpreter.
//!
//! Runs the text and graphics-state operators of a page and reports one
//! [`Glyph`] per shown character code, positioned by the full text rendering
//! matrix. Fonts and form XObjects are looked up through a [`ResourceScope`],
//! which keeps the interpreter free of any concrete PDF library types.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::{Glyph, Matrix};
use crate::parser::backend::GlyphVisitor;

/// Form XObject nesting cap when none is configured.
const DEFAULT_MAX_DEPTH: usize = 100;

/// A value from a PDF content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(BTreeMap<Vec<u8>, PdfValue>),
    Other,
}

impl PdfValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// A single operation from a content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    pub fn new(operator: &str, operands: Vec<PdfValue>) -> Self {
        Self {
            operator: operator.to_string(),
            operands,
        }
    }

    fn number(&self, index: usize) -> Option<f32> {
        self.operands.get(index).and_then(PdfValue::as_number)
    }

    fn numbers<const N: usize>(&self) -> Option<[f32; N]> {
        if self.operands.len() < N {
            return None;
        }
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.number(i)?;
        }
        Some(out)
    }
}

/// Widths and code size of a font, in glyph space (1/1000 em).
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    pub base_name: Option<String>,
    /// 2 for composite (Type0) fonts, 1 otherwise
    pub bytes_per_code: usize,
    pub first_char: u32,
    pub widths: Vec<f32>,
    /// Per-CID widths from a `/W` array
    pub cid_widths: BTreeMap<u32, f32>,
    pub default_width: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            base_name: None,
            bytes_per_code: 1,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: BTreeMap::new(),
            default_width: 500.0,
        }
    }
}

impl FontMetrics {
    pub fn width(&self, code: u32) -> f32 {
        if let Some(w) = self.cid_widths.get(&code) {
            return *w;
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Width of the space glyph, when the font defines one.
    pub fn space_width(&self) -> Option<f32> {
        if self.bytes_per_code != 1 {
            return None;
        }
        32u32
            .checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
    }
}

/// A form XObject ready to run.
pub struct FormXObject<'s> {
    pub operations: Vec<ContentOp>,
    pub matrix: Matrix,
    pub resources: Box<dyn ResourceScope + 's>,
}

/// Resource lookup for one content stream.
pub trait ResourceScope {
    fn font(&self, name: &[u8]) -> Option<FontMetrics>;

    /// Unicode for one character code; `None` when the font has no mapping.
    fn decode(&self, font: &[u8], code: &[u8]) -> Option<String>;

    /// A form XObject by resource name; `None` for images and unknown names.
    fn form(&self, name: &[u8]) -> Option<FormXObject<'_>>;
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
    font: Option<Vec<u8>>,
    font_size: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 12.0,
        }
    }
}

/// Interprets a page's operations and reports glyphs to a visitor.
pub struct ContentInterpreter<'v> {
    visitor: &'v mut dyn GlyphVisitor,
    page: usize,
    max_depth: usize,
    /// A form XObject was skipped for nesting too deep
    truncated: bool,
}

impl<'v> ContentInterpreter<'v> {
    pub fn new(page: usize, visitor: &'v mut dyn GlyphVisitor) -> Self {
        Self {
            visitor,
            page,
            max_depth: DEFAULT_MAX_DEPTH,
            truncated: false,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Run `operations` with `initial` as the starting CTM.
    ///
    /// Form XObjects nested past the depth cap are skipped; the rest of the
    /// page still runs and the result is `RecursionLimit`.
    pub fn run(
        &mut self,
        operations: &[ContentOp],
        resources: &dyn ResourceScope,
        initial: Matrix,
    ) -> Result<()> {
        let state = GraphicsState {
            ctm: initial,
            ..GraphicsState::default()
        };
        self.run_with(operations, resources, state, 0)?;
        if self.truncated {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        Ok(())
    }

    fn run_with(
        &mut self,
        operations: &[ContentOp],
        resources: &dyn ResourceScope,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::identity();
        let mut line_matrix = Matrix::identity();
        let mut font = FontMetrics::default();
        let mut marked: Vec<Option<i64>> = Vec::new();

        for op in operations {
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                        font = self.load_font(resources, gs.font.as_deref());
                    }
                }
                "cm" => {
                    if let Some([a, b, c, d, e, f]) = op.numbers::<6>() {
                        gs.ctm = Matrix::new(a, b, c, d, e, f).multiply(&gs.ctm);
                    }
                }
                "BT" => {
                    text_matrix = Matrix::identity();
                    line_matrix = Matrix::identity();
                }
                "ET" => {}
                "Tc" => gs.char_spacing = op.number(0).unwrap_or(0.0),
                "Tw" => gs.word_spacing = op.number(0).unwrap_or(0.0),
                "Tz" => gs.horizontal_scaling = op.number(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.leading = op.number(0).unwrap_or(0.0),
                "Ts" => gs.rise = op.number(0).unwrap_or(0.0),
                "Tf" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        gs.font = Some(name.clone());
                        font = self.load_font(resources, Some(name));
                    }
                    gs.font_size = op.number(1).unwrap_or(12.0);
                }
                "Td" => {
                    if let Some([tx, ty]) = op.numbers::<2>() {
                        line_matrix = Matrix::translation(tx, ty).multiply(&line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "TD" => {
                    if let Some([tx, ty]) = op.numbers::<2>() {
                        gs.leading = -ty;
                        line_matrix = Matrix::translation(tx, ty).multiply(&line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "Tm" => {
                    if let Some([a, b, c, d, e, f]) = op.numbers::<6>() {
                        line_matrix = Matrix::new(a, b, c, d, e, f);
                        text_matrix = line_matrix;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translation(0.0, -gs.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" => {
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        self.show(bytes, &gs, &font, resources, &marked, &mut text_matrix)?;
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                PdfValue::Str(bytes) => {
                                    self.show(bytes, &gs, &font, resources, &marked, &mut text_matrix)?
                                }
                                other => {
                                    if let Some(adjust) = other.as_number() {
                                        let tx = -adjust / 1000.0 * gs.font_size * gs.horizontal_scaling;
                                        text_matrix = Matrix::translation(tx, 0.0).multiply(&text_matrix);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        gs.word_spacing = op.number(0).unwrap_or(gs.word_spacing);
                        gs.char_spacing = op.number(1).unwrap_or(gs.char_spacing);
                    }
                    line_matrix = Matrix::translation(0.0, -gs.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                    let text_idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(PdfValue::Str(bytes)) = op.operands.get(text_idx) {
                        self.show(bytes, &gs, &font, resources, &marked, &mut text_matrix)?;
                    }
                }
                "BMC" => marked.push(None),
                "BDC" => {
                    let mcid = match op.operands.get(1) {
                        Some(PdfValue::Dict(dict)) => match dict.get(b"MCID".as_slice()) {
                            Some(PdfValue::Integer(i)) => Some(*i),
                            _ => None,
                        },
                        _ => None,
                    };
                    marked.push(mcid);
                }
                "EMC" => {
                    marked.pop();
                }
                "Do" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        self.run_form(name, resources, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn run_form(
        &mut self,
        name: &[u8],
        resources: &dyn ResourceScope,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        if depth >= self.max_depth {
            log::debug!("page {}: form XObject nesting too deep, skipped", self.page);
            self.truncated = true;
            return Ok(());
        }
        let Some(form) = resources.form(name) else {
            return Ok(());
        };
        let state = GraphicsState {
            ctm: form.matrix.multiply(&gs.ctm),
            ..gs.clone()
        };
        self.run_with(&form.operations, form.resources.as_ref(), state, depth + 1)
    }

    fn load_font(&self, resources: &dyn ResourceScope, name: Option<&[u8]>) -> FontMetrics {
        name.and_then(|n| resources.font(n)).unwrap_or_default()
    }

    fn show(
        &mut self,
        bytes: &[u8],
        gs: &GraphicsState,
        font: &FontMetrics,
        resources: &dyn ResourceScope,
        marked: &[Option<i64>],
        text_matrix: &mut Matrix,
    ) -> Result<()> {
        let font_key = gs.font.as_deref().unwrap_or_default();
        let mcid = marked.iter().rev().find_map(|m| *m);
        let step = font.bytes_per_code.max(1);

        for chunk in bytes.chunks(step) {
            let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            let w0 = font.width(code) / 1000.0;
            let is_space = step == 1 && code == 32;

            let params = Matrix::new(
                gs.font_size * gs.horizontal_scaling,
                0.0,
                0.0,
                gs.font_size,
                0.0,
                gs.rise,
            );
            let trm = params.multiply(text_matrix).multiply(&gs.ctm);
            let user_scale = text_matrix.multiply(&gs.ctm).scale_x();

            let mut tx = w0 * gs.font_size + gs.char_spacing;
            if is_space {
                tx += gs.word_spacing;
            }
            tx *= gs.horizontal_scaling;

            let unicode = resources
                .decode(font_key, chunk)
                .filter(|s| !s.is_empty() && s != "\u{FFFD}");
            log::trace!("page {}: code {:#x} -> {:?}", self.page, code, unicode);

            let glyph = Glyph {
                unicode,
                matrix: trm,
                width: tx * user_scale,
                font_size: gs.font_size,
                space_width: font
                    .space_width()
                    .map(|w| w / 1000.0 * gs.font_size * gs.horizontal_scaling * user_scale),
                font_name: font.base_name.clone(),
                mcid,
            };
            self.visitor.on_glyph(&glyph)?;

            *text_matrix = Matrix::translation(tx, 0.0).multiply(text_matrix);
        }

        Ok(())
    }
}

/// Convert an interpreter failure into a page-scoped error.
pub fn malformed(page: usize, message: impl Into<String>) -> Error {
    Error::MalformedStream {
        page,
        message: message.into(),
    }
}
