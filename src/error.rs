//! Error types for pdfsift.
//!
//! Errors fall into three groups that the pipeline treats differently:
//! terminal errors stop the document immediately, recoverable errors are
//! recorded as warnings when intermediate errors are caught, and
//! configuration errors are fatal unless the OCR strategy degrades them.

use std::io;
use thiserror::Error;

/// Result type alias for pdfsift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The document is encrypted and no usable password was supplied.
    #[error("Document is encrypted")]
    Encrypted,

    /// The supplied password does not unlock the document.
    #[error("Invalid password")]
    InvalidPassword,

    /// The document's permission flags forbid content extraction.
    #[error("Content extraction denied: {0}")]
    AccessDenied(String),

    /// The output handler refused more characters.
    #[error("Write limit of {0} characters reached")]
    WriteLimitReached(usize),

    /// OCR was demanded but no engine handles the media type.
    #[error("No OCR engine available for {0}; use the NoOcr strategy or register an engine")]
    OcrUnavailable(String),

    /// A content stream could not be decoded or interpreted.
    #[error("Malformed content stream on page {page}: {message}")]
    MalformedStream { page: usize, message: String },

    /// Rasterizing a page failed.
    #[error("Rendering error: {0}")]
    Render(String),

    /// The OCR engine failed.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// An embedded resource could not be read or parsed.
    #[error("Embedded resource error: {0}")]
    Embedded(String),

    /// A recursive structure went deeper than allowed.
    #[error("Exceeded max recursion depth {0}")]
    RecursionLimit(usize),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The extraction was cancelled between pages.
    #[error("Extraction cancelled after page {0}")]
    Cancelled(usize),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that abort a document regardless of the catch setting.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Encrypted
                | Error::InvalidPassword
                | Error::AccessDenied(_)
                | Error::WriteLimitReached(_)
                | Error::Cancelled(_)
        )
    }

    /// Errors that may be downgraded to a recorded warning.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::PdfParse(_)
                | Error::MalformedStream { .. }
                | Error::Render(_)
                | Error::Ocr(_)
                | Error::Embedded(_)
                | Error::RecursionLimit(_)
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Render(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::MalformedStream {
            page: 3,
            message: "unexpected EOF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed content stream on page 3: unexpected EOF"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_classification() {
        assert!(Error::AccessDenied("x".into()).is_terminal());
        assert!(Error::WriteLimitReached(10).is_terminal());
        assert!(!Error::WriteLimitReached(10).is_recoverable());
        assert!(Error::RecursionLimit(100).is_recoverable());
        assert!(!Error::OcrUnavailable("image/ocr-png".into()).is_terminal());
        assert!(!Error::OcrUnavailable("image/ocr-png".into()).is_recoverable());
    }
}
