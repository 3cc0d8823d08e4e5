//! # pdfsift
//!
//! Structured content extraction from PDF documents.
//!
//! A document is walked page by page into a tagged content stream (an
//! XHTML-shaped sequence of element and character events) and a
//! multi-valued metadata record. Along the way the walk pulls out
//! attachments, annotations, actions, bookmarks, form fields, earlier
//! revisions and, when a page has no usable text layer, OCR output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfsift::extract_file;
//!
//! fn main() -> pdfsift::Result<()> {
//!     let extraction = extract_file("document.pdf")?;
//!     println!("{}", extraction.text());
//!     for (key, values) in extraction.metadata.iter() {
//!         println!("{key}: {}", values.join(", "));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Content stream**: pages, paragraphs, links, images, lists and form data
//! - **Embedded resources**: attachments, scripts, XMP packets and revisions
//!   routed through a pluggable extractor
//! - **OCR fallback**: per-page decision from the unmapped-glyph counters
//! - **Tagged PDF**: structure-tree order when marked content is present
//! - **Parallel batches**: independent documents on the rayon pool
//! - **Serializers**: XHTML, plain text and JSON

pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;

pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use model::{keys, Document, Metadata};
pub use pipeline::options::{AccessCheckMode, ExtractOptions, OcrOptions, OcrStrategy};
pub use pipeline::{
    CancellationToken, DiscardEmbedded, EmbeddedCollector, EmbeddedResource, ExtractionSummary,
    Extractor, ExtractorBuilder,
};
pub use render::{Extraction, JsonFormat};

use std::path::{Path, PathBuf};

use log::debug;
use rayon::prelude::*;

/// Extract a PDF file with default options.
///
/// # Example
///
/// ```no_run
/// use pdfsift::extract_file;
///
/// let extraction = extract_file("document.pdf").unwrap();
/// println!("Pages: {}", extraction.stats.page_count);
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<Extraction> {
    extract_file_with(&Extractor::new(), path)
}

/// Extract a PDF file with a configured extractor.
pub fn extract_file_with<P: AsRef<Path>>(extractor: &Extractor, path: P) -> Result<Extraction> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let mut metadata = Metadata::new();
    if let Some(name) = path.file_name() {
        metadata.set(keys::RESOURCE_NAME, name.to_string_lossy());
    }
    extract_bytes_with(extractor, &data, metadata)
}

/// Extract PDF bytes with default options.
///
/// # Example
///
/// ```no_run
/// use pdfsift::extract_bytes;
///
/// let data = std::fs::read("document.pdf").unwrap();
/// let extraction = extract_bytes(&data).unwrap();
/// ```
pub fn extract_bytes(data: &[u8]) -> Result<Extraction> {
    extract_bytes_with(&Extractor::new(), data, Metadata::new())
}

/// Extract PDF bytes, starting from the given metadata record.
///
/// The header is checked first, so non-PDF input fails with
/// `UnknownFormat` before any loading.
pub fn extract_bytes_with(extractor: &Extractor, data: &[u8], metadata: Metadata) -> Result<Extraction> {
    let format = detect_format_from_bytes(data)?;
    debug!("detected {format}");
    extractor.extract_to_events(data, metadata)
}

/// Plain text of a PDF file.
///
/// ```no_run
/// let text = pdfsift::extract_text("document.pdf").unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(extract_file(path)?.text())
}

/// Extract many files in parallel. Results come back in input order; one
/// failing document does not affect the others.
pub fn extract_batch<P>(extractor: &Extractor, paths: &[P]) -> Vec<(PathBuf, Result<Extraction>)>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_path_buf(), extract_file_with(extractor, path))
        })
        .collect()
}

/// Extraction off the async runtime's worker threads.
#[cfg(feature = "async")]
pub mod tasks {
    use std::path::PathBuf;

    use crate::{Error, Extraction, Extractor, Result};

    /// Read and extract `path` on the blocking pool.
    pub async fn extract_file(extractor: Extractor, path: impl Into<PathBuf>) -> Result<Extraction> {
        let path = path.into();
        tokio::task::spawn_blocking(move || crate::extract_file_with(&extractor, path))
            .await
            .map_err(|e| Error::Other(format!("extraction task failed: {e}")))?
    }

    /// Extract owned bytes on the blocking pool.
    pub async fn extract_bytes(extractor: Extractor, data: Vec<u8>) -> Result<Extraction> {
        tokio::task::spawn_blocking(move || {
            crate::extract_bytes_with(&extractor, &data, crate::Metadata::new())
        })
        .await
        .map_err(|e| Error::Other(format!("extraction task failed: {e}")))?
    }
}
