//! File specifications and embedded file streams.

use super::ObjectId;
use serde::{Deserialize, Serialize};

/// Index into [`Document::file_specs`](super::Document::file_specs).
pub type FileSpecId = usize;

/// Platform slot of a file-specification variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Default,
    Mac,
    Dos,
    Unix,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::Default, Platform::Mac, Platform::Dos, Platform::Unix];

    /// Key used in `/EF` and on the spec dictionary.
    pub fn key(&self) -> &'static [u8] {
        match self {
            Platform::Default => b"F",
            Platform::Mac => b"Mac",
            Platform::Dos => b"DOS",
            Platform::Unix => b"Unix",
        }
    }
}

/// An embedded file stream. The bytes are read through the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedFile {
    /// Stream identity; de-duplication key
    pub id: ObjectId,
    /// `/Subtype`, a media type
    pub subtype: Option<String>,
    /// `/Params /Size`
    pub size: Option<u64>,
}

impl EmbeddedFile {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            subtype: None,
            size: None,
        }
    }
}

/// One platform variant of a complex file specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileVariant {
    pub platform: Platform,
    /// Platform file name (`/F`, `/Mac`, `/DOS`, `/Unix`)
    pub name: Option<String>,
    pub file: Option<EmbeddedFile>,
}

/// A dictionary file specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexFileSpec {
    /// `/UF`
    pub unicode_name: Option<String>,
    /// `/Desc`
    pub description: Option<String>,
    /// `/AFRelationship`
    pub relationship: Option<String>,
    pub variants: Vec<FileVariant>,
}

impl ComplexFileSpec {
    /// Spec with one default-platform embedded file.
    pub fn embedded(name: impl Into<String>, file: EmbeddedFile) -> Self {
        Self {
            variants: vec![FileVariant {
                platform: Platform::Default,
                name: Some(name.into()),
                file: Some(file),
            }],
            ..Self::default()
        }
    }

    pub fn variant(&self, platform: Platform) -> Option<&FileVariant> {
        self.variants.iter().find(|v| v.platform == platform)
    }
}

/// A file specification: a bare file name or a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSpec {
    Simple { file: String },
    Complex(ComplexFileSpec),
}
