//! Extraction options and configuration.
//!
//! Options deserialize from JSON with every field optional, so a config file
//! only names what it changes:
//!
//! ```
//! use pdfsift::{ExtractOptions, OcrStrategy};
//!
//! let options = ExtractOptions::from_json_str(
//!     r#"{ "extract_actions": true, "ocr": { "strategy": "NO_OCR" } }"#,
//! ).unwrap();
//! assert!(options.extract_actions);
//! assert_eq!(options.ocr.strategy, OcrStrategy::NoOcr);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the permission flags of an encrypted document are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessCheckMode {
    /// Extract regardless of the flags
    #[default]
    DontCheck,
    /// Refuse unless content or accessibility extraction is allowed
    AllowForAccessibility,
    /// Refuse unless content extraction is allowed
    Enforce,
}

/// When pages go through optical character recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcrStrategy {
    NoOcr,
    /// Recognition only; the text layer is ignored
    OcrOnly,
    /// Text layer and recognition, one after the other
    OcrAndTextExtraction,
    /// Recognition when the text layer looks insufficient
    #[default]
    Auto,
}

/// What the rasterizer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderStrategy {
    NoText,
    TextOnly,
    VectorGraphicsOnly,
    #[default]
    All,
}

/// Encoding of rendered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Tiff => "tiff",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Pixel layout of rendered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Gray,
    Rgb,
    Argb,
}

/// Thresholds of the AUTO strategy.
///
/// `unmapped_unicode_chars_per_page` below 1.0 is a fraction of the page's
/// characters; from 1.0 up it is an absolute count. A value of exactly 1.0
/// therefore means "more than one unmapped character", not "100%".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AutoThresholdsRepr", into = "AutoThresholdsRepr")]
pub struct AutoThresholds {
    pub unmapped_unicode_chars_per_page: f32,
    pub total_chars_per_page: usize,
}

impl AutoThresholds {
    /// OCR more pages.
    pub const BETTER: AutoThresholds = AutoThresholds {
        unmapped_unicode_chars_per_page: 10.0,
        total_chars_per_page: 10,
    };

    /// OCR fewer pages.
    pub const FASTER: AutoThresholds = AutoThresholds {
        unmapped_unicode_chars_per_page: 0.1,
        total_chars_per_page: 10,
    };

    pub fn new(unmapped_unicode_chars_per_page: f32, total_chars_per_page: usize) -> Self {
        Self {
            unmapped_unicode_chars_per_page,
            total_chars_per_page,
        }
    }
}

impl Default for AutoThresholds {
    fn default() -> Self {
        Self::BETTER
    }
}

impl FromStr for AutoThresholds {
    type Err = Error;

    /// Accepts "better", "faster" or "<unmapped>,<total>".
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "better" => return Ok(Self::BETTER),
            "faster" => return Ok(Self::FASTER),
            _ => {}
        }
        let (unmapped, total) = s
            .split_once(',')
            .ok_or_else(|| Error::Config(format!("invalid OCR auto thresholds: {s}")))?;
        let unmapped: f32 = unmapped
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid unmapped threshold: {unmapped}")))?;
        let total: usize = total
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid total threshold: {total}")))?;
        if unmapped < 0.0 {
            return Err(Error::Config("unmapped threshold must not be negative".into()));
        }
        Ok(Self::new(unmapped, total))
    }
}

impl fmt::Display for AutoThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.unmapped_unicode_chars_per_page, self.total_chars_per_page)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AutoThresholdsRepr {
    Named(String),
    Explicit {
        unmapped_unicode_chars_per_page: f32,
        total_chars_per_page: usize,
    },
}

impl TryFrom<AutoThresholdsRepr> for AutoThresholds {
    type Error = Error;

    fn try_from(repr: AutoThresholdsRepr) -> Result<Self> {
        match repr {
            AutoThresholdsRepr::Named(s) => s.parse(),
            AutoThresholdsRepr::Explicit {
                unmapped_unicode_chars_per_page,
                total_chars_per_page,
            } => Ok(Self::new(unmapped_unicode_chars_per_page, total_chars_per_page)),
        }
    }
}

impl From<AutoThresholds> for AutoThresholdsRepr {
    fn from(t: AutoThresholds) -> Self {
        AutoThresholdsRepr::Explicit {
            unmapped_unicode_chars_per_page: t.unmapped_unicode_chars_per_page,
            total_chars_per_page: t.total_chars_per_page,
        }
    }
}

/// OCR and page-rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    pub strategy: OcrStrategy,
    pub auto: AutoThresholds,
    pub render_strategy: RenderStrategy,
    pub dpi: u32,
    pub image_format: ImageFormat,
    /// Encoder quality in `0.0..=1.0` (JPEG only)
    pub image_quality: f32,
    pub color_space: ColorSpace,
    /// Longest edge of a rendered page, in pixels
    pub max_image_edge: u32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            strategy: OcrStrategy::Auto,
            auto: AutoThresholds::default(),
            render_strategy: RenderStrategy::All,
            dpi: 300,
            image_format: ImageFormat::Png,
            image_quality: 1.0,
            color_space: ColorSpace::Gray,
            max_image_edge: 10_000,
        }
    }
}

impl OcrOptions {
    /// Media type the OCR engine must accept, e.g. `image/ocr-png`.
    pub fn media_type(&self) -> String {
        format!("image/ocr-{}", self.image_format.as_str())
    }
}

/// Options for one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Order glyphs top-to-bottom, left-to-right instead of stream order
    pub sort_by_position: bool,
    pub enable_auto_space: bool,
    pub suppress_duplicate_overlapping_text: bool,
    pub average_char_tolerance: f32,
    pub spacing_tolerance: f32,
    /// Paragraph break when the line gap exceeds this many line heights
    pub drop_threshold: f32,

    pub extract_annotation_text: bool,
    pub extract_acroform_content: bool,
    pub extract_bookmarks_text: bool,
    pub extract_inline_images: bool,
    pub extract_inline_image_metadata_only: bool,
    pub extract_unique_inline_images_only: bool,
    pub extract_marked_content: bool,
    pub if_xfa_extract_only_xfa: bool,
    pub extract_actions: bool,
    pub extract_font_names: bool,
    pub detect_angles: bool,

    pub access_check_mode: AccessCheckMode,
    /// Record recoverable errors as warnings and keep going
    pub catch_intermediate_errors: bool,

    pub extract_incremental_update_info: bool,
    pub parse_incremental_updates: bool,
    pub max_incremental_updates: usize,

    pub max_recursion_depth: usize,
    pub max_bookmark_items: usize,

    /// Maximum number of characters written to the handler
    pub write_limit: Option<usize>,
    pub password: Option<String>,

    /// Hand every page, rendered, to the embedded extractor at page end
    pub render_pages_at_page_end: bool,

    pub ocr: OcrOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            sort_by_position: false,
            enable_auto_space: true,
            suppress_duplicate_overlapping_text: false,
            average_char_tolerance: 0.3,
            spacing_tolerance: 0.5,
            drop_threshold: 2.5,
            extract_annotation_text: true,
            extract_acroform_content: true,
            extract_bookmarks_text: true,
            extract_inline_images: false,
            extract_inline_image_metadata_only: false,
            extract_unique_inline_images_only: true,
            extract_marked_content: false,
            if_xfa_extract_only_xfa: false,
            extract_actions: false,
            extract_font_names: false,
            detect_angles: false,
            access_check_mode: AccessCheckMode::DontCheck,
            catch_intermediate_errors: true,
            extract_incremental_update_info: true,
            parse_incremental_updates: false,
            max_incremental_updates: 10,
            max_recursion_depth: 100,
            max_bookmark_items: 10_000,
            write_limit: None,
            password: None,
            render_pages_at_page_end: false,
            ocr: OcrOptions::default(),
        }
    }
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<()> {
        let tolerances = [
            ("average_char_tolerance", self.average_char_tolerance),
            ("spacing_tolerance", self.spacing_tolerance),
            ("drop_threshold", self.drop_threshold),
            ("ocr.auto.unmapped_unicode_chars_per_page", self.ocr.auto.unmapped_unicode_chars_per_page),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{name} must be a non-negative number")));
            }
        }
        if self.ocr.dpi == 0 {
            return Err(Error::Config("ocr.dpi must be positive".into()));
        }
        if self.ocr.max_image_edge == 0 {
            return Err(Error::Config("ocr.max_image_edge must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.ocr.image_quality) {
            return Err(Error::Config("ocr.image_quality must be within 0.0..=1.0".into()));
        }
        if self.max_recursion_depth == 0 {
            return Err(Error::Config("max_recursion_depth must be positive".into()));
        }
        Ok(())
    }

    pub fn with_sort_by_position(mut self, sort: bool) -> Self {
        self.sort_by_position = sort;
        self
    }

    pub fn with_auto_space(mut self, enable: bool) -> Self {
        self.enable_auto_space = enable;
        self
    }

    pub fn with_suppress_duplicates(mut self, suppress: bool) -> Self {
        self.suppress_duplicate_overlapping_text = suppress;
        self
    }

    pub fn with_annotation_text(mut self, extract: bool) -> Self {
        self.extract_annotation_text = extract;
        self
    }

    pub fn with_acroform_content(mut self, extract: bool) -> Self {
        self.extract_acroform_content = extract;
        self
    }

    pub fn with_bookmarks_text(mut self, extract: bool) -> Self {
        self.extract_bookmarks_text = extract;
        self
    }

    pub fn with_inline_images(mut self, extract: bool) -> Self {
        self.extract_inline_images = extract;
        self
    }

    /// Record image metadata without extracting the bytes.
    pub fn with_inline_image_metadata_only(mut self, only: bool) -> Self {
        self.extract_inline_image_metadata_only = only;
        self
    }

    pub fn with_unique_inline_images_only(mut self, unique: bool) -> Self {
        self.extract_unique_inline_images_only = unique;
        self
    }

    pub fn with_marked_content(mut self, extract: bool) -> Self {
        self.extract_marked_content = extract;
        self
    }

    pub fn with_xfa_only(mut self, only: bool) -> Self {
        self.if_xfa_extract_only_xfa = only;
        self
    }

    pub fn with_actions(mut self, extract: bool) -> Self {
        self.extract_actions = extract;
        self
    }

    pub fn with_font_names(mut self, extract: bool) -> Self {
        self.extract_font_names = extract;
        self
    }

    pub fn with_angle_detection(mut self, detect: bool) -> Self {
        self.detect_angles = detect;
        self
    }

    pub fn with_access_check(mut self, mode: AccessCheckMode) -> Self {
        self.access_check_mode = mode;
        self
    }

    pub fn with_catch_errors(mut self, catch: bool) -> Self {
        self.catch_intermediate_errors = catch;
        self
    }

    /// Stop at the first recoverable error.
    pub fn strict(mut self) -> Self {
        self.catch_intermediate_errors = false;
        self
    }

    pub fn with_incremental_update_info(mut self, extract: bool) -> Self {
        self.extract_incremental_update_info = extract;
        self
    }

    pub fn with_incremental_updates(mut self, parse: bool, max: usize) -> Self {
        self.parse_incremental_updates = parse;
        self.max_incremental_updates = max;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_max_bookmark_items(mut self, items: usize) -> Self {
        self.max_bookmark_items = items;
        self
    }

    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_render_pages_at_page_end(mut self, render: bool) -> Self {
        self.render_pages_at_page_end = render;
        self
    }

    pub fn with_ocr_strategy(mut self, strategy: OcrStrategy) -> Self {
        self.ocr.strategy = strategy;
        self
    }

    pub fn with_ocr_auto(mut self, thresholds: AutoThresholds) -> Self {
        self.ocr.auto = thresholds;
        self
    }

    pub fn with_ocr(mut self, ocr: OcrOptions) -> Self {
        self.ocr = ocr;
        self
    }
}
