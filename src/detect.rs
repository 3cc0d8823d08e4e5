//! PDF format detection.
//!
//! Detection looks only at the head of the input: the `%PDF-x.y` header and,
//! for the linearization hint, the first object dictionary.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// Header version (e.g., "1.7", "2.0")
    pub version: String,
    /// Whether the first object declares a linearization dictionary
    pub linearized: bool,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.linearized {
            write!(f, "PDF {} (linearized)", self.version)
        } else {
            write!(f, "PDF {}", self.version)
        }
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;

/// How many leading bytes may hold the linearization dictionary.
const LINEARIZATION_WINDOW: usize = 1024;

/// Some producers emit junk before the header; tolerate that much.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Detect PDF format from a file path.
///
/// ```no_run
/// use pdfsift::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("document.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(LINEARIZATION_WINDOW + HEADER_SEARCH_WINDOW);
    file.take((LINEARIZATION_WINDOW + HEADER_SEARCH_WINDOW) as u64)
        .read_to_end(&mut head)?;
    detect_format_from_bytes(&head)
}

/// Detect PDF format from the leading bytes of a document.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let search = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let start = find(search, PDF_MAGIC).ok_or(Error::UnknownFormat)?;
    let version_start = start + PDF_MAGIC.len();
    if data.len() < version_start + VERSION_LEN {
        return Err(Error::UnknownFormat);
    }

    let version =
        String::from_utf8_lossy(&data[version_start..version_start + VERSION_LEN]).to_string();
    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    let window_end = data.len().min(version_start + LINEARIZATION_WINDOW);
    let linearized = find(&data[version_start..window_end], b"/Linearized").is_some();

    Ok(PdfFormat {
        version,
        linearized,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if a file is a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes start like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.7");
        assert!(!format.linearized);
    }

    #[test]
    fn test_detect_linearized() {
        let data = b"%PDF-1.6\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<< /Linearized 1 /L 71234 /O 3 >>\nendobj\n";
        let format = detect_format_from_bytes(data).unwrap();
        assert!(format.linearized);
        assert_eq!(format.to_string(), "PDF 1.6 (linearized)");
    }

    #[test]
    fn test_detect_with_leading_junk() {
        let data = b"\x00\x00garbage%PDF-1.4\n";
        assert_eq!(detect_format_from_bytes(data).unwrap().version, "1.4");
    }

    #[test]
    fn test_detect_invalid_format() {
        let result = detect_format_from_bytes(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_detect_too_short() {
        let result = detect_format_from_bytes(b"%PDF");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_bad_version() {
        let result = detect_format_from_bytes(b"%PDF-x.y\n");
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.4\n"));
        assert!(!is_pdf_bytes(b"Not a PDF"));
    }
}
