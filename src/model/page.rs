//! Page-level types: geometry, glyphs and images.

use super::{Action, Annotation, ObjectId};
use serde::{Deserialize, Serialize};

/// Affine transform in PDF order `[a b c d e f]`.
///
/// Points are row vectors: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Counter-clockwise rotation about the origin.
    pub fn rotation_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self` followed by `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Text direction in whole degrees, in `-180..=180`.
    pub fn angle_degrees(&self) -> i32 {
        (self.b as f64).atan2(self.d as f64).to_degrees().round() as i32
    }

    /// Vertical scale factor.
    pub fn scale_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Horizontal scale factor.
    pub fn scale_x(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

/// Axis-aligned rectangle in default user space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// US Letter, 612 x 792 points.
    pub const fn letter() -> Self {
        Self::new(0.0, 0.0, 612.0, 792.0)
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::letter()
    }
}

/// One positioned glyph as shown by the content stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    /// Unicode mapping; `None` when the font gives no mapping for the code
    pub unicode: Option<String>,
    /// Text rendering matrix, font matrix included
    pub matrix: Matrix,
    /// Advance width in user space
    pub width: f32,
    /// Nominal font size in text space
    pub font_size: f32,
    /// Width of the font's space glyph in user space, if known
    pub space_width: Option<f32>,
    /// Base font name
    pub font_name: Option<String>,
    /// Marked-content id of the innermost enclosing sequence
    pub mcid: Option<i64>,
}

impl Glyph {
    /// A mapped glyph at `(x, y)` with a 1:1 text matrix scaled to `size`.
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, size: f32) -> Self {
        Self {
            unicode: Some(text.into()),
            matrix: Matrix::new(size, 0.0, 0.0, size, x, y),
            width,
            font_size: size,
            space_width: None,
            font_name: None,
            mcid: None,
        }
    }

    /// A glyph whose code has no unicode mapping.
    pub fn unmapped(x: f32, y: f32, width: f32, size: f32) -> Self {
        Self {
            unicode: None,
            ..Self::new("", x, y, width, size)
        }
    }

    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_font(mut self, name: impl Into<String>) -> Self {
        self.font_name = Some(name.into());
        self
    }

    pub fn with_mcid(mut self, mcid: i64) -> Self {
        self.mcid = Some(mcid);
        self
    }

    pub fn x(&self) -> f32 {
        self.matrix.e
    }

    pub fn y(&self) -> f32 {
        self.matrix.f
    }

    /// Rendered glyph height.
    pub fn height(&self) -> f32 {
        self.matrix.scale_y().max(0.1)
    }

    pub fn text(&self) -> &str {
        self.unicode.as_deref().unwrap_or("")
    }

    pub fn is_mapped(&self) -> bool {
        self.unicode.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Residual text direction.
    pub fn angle(&self) -> i32 {
        self.matrix.angle_degrees()
    }

    /// Apply a transform that was prepended to the page content.
    pub fn under_prefix(&self, prefix: &Matrix) -> Glyph {
        let mut glyph = self.clone();
        glyph.matrix = self.matrix.multiply(prefix);
        glyph
    }
}

/// Encoded image bytes as handed to the embedded extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    /// File suffix ("png", "jpg", "jp2", "tif")
    pub suffix: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(suffix: &str, bytes: Vec<u8>) -> Self {
        let mime_type = match suffix {
            "jpg" => "image/jpeg",
            "jp2" => "image/jp2",
            "tif" => "image/tiff",
            "jb2" => "image/x-jbig2",
            _ => "image/png",
        };
        Self {
            suffix: suffix.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }
}

/// An image XObject in a page's resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    /// Identity of the image stream
    pub id: ObjectId,
    /// Resource name on the page
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Suffix the payload will carry
    pub suffix: String,
}

/// Page-level additional actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageActions {
    pub open: Option<Action>,
    pub close: Option<Action>,
}

/// One page of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 0-based index, contiguous across the document
    pub index: usize,
    /// Identity of the page object, used to map marked content
    pub object_id: Option<ObjectId>,
    /// Rotation in degrees (multiple of 90)
    pub rotation: i32,
    pub media_box: Rect,
    pub annotations: Vec<Annotation>,
    pub actions: PageActions,
    /// Font descriptor names from the page resources
    pub font_names: Vec<String>,
    pub images: Vec<PageImage>,
    /// Page-level XMP packet
    #[serde(skip)]
    pub xmp: Option<Vec<u8>>,
}

impl Page {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            object_id: None,
            rotation: 0,
            media_box: Rect::letter(),
            annotations: Vec::new(),
            actions: PageActions::default(),
            font_names: Vec::new(),
            images: Vec::new(),
            xmp: None,
        }
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn with_rotation(mut self, rotation: i32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }
}
