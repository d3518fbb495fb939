//! Error types for the pdftext2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MdError`] — **Fatal**: the document cannot be converted at all
//!   (bad input file, wrong password, malformed layout). Returned as
//!   `Err(Pdf2MdError)` from the top-level `convert*` functions.
//!
//! * [`ImageEncodingError`] — **Non-fatal**: a single image could not be
//!   turned into base64 output. Stored in
//!   [`crate::output::MarkdownResult::warnings`]; the image is omitted and the
//!   rest of the document still renders.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdftext2md library.
///
/// Per-image failures use [`ImageEncodingError`] and are recorded as
/// warnings rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render failed while walking the objects of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    // ── Layout errors ─────────────────────────────────────────────────────
    /// The page/block/span structure handed to the formatter is not usable,
    /// e.g. a span without a positive, finite font size.
    #[error("Malformed layout at {location}: {reason}")]
    MalformedInput { location: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2MdError {
    /// Build a [`Pdf2MdError::MalformedInput`] from a location and reason.
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Pdf2MdError::MalformedInput {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// A non-fatal error for a single image.
///
/// `index` is the image's position in the input image list and `page` is the
/// 1-indexed page it came from. The conversion continues without the image.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ImageEncodingError {
    /// The payload had no bytes (or a zero-sized bitmap).
    #[error("Image {index} on page {page}: payload is empty")]
    EmptyPayload { index: usize, page: usize },

    /// The format tag is not a valid image subtype, or no tag was given and
    /// none could be inferred from the bytes.
    #[error("Image {index} on page {page}: unknown image format")]
    UnknownFormat { index: usize, page: usize },

    /// Encoding the bitmap to PNG failed.
    #[error("Image {index} on page {page}: encoding failed: {detail}")]
    EncodeFailed {
        index: usize,
        page: usize,
        detail: String,
    },

    /// The PDF engine reported the image but could not produce its data.
    #[error("Image {index} on page {page}: data unavailable: {detail}")]
    Unavailable {
        index: usize,
        page: usize,
        detail: String,
    },
}

impl ImageEncodingError {
    /// Position of the failed image in the input image list.
    pub fn index(&self) -> usize {
        match self {
            ImageEncodingError::EmptyPayload { index, .. }
            | ImageEncodingError::UnknownFormat { index, .. }
            | ImageEncodingError::EncodeFailed { index, .. }
            | ImageEncodingError::Unavailable { index, .. } => *index,
        }
    }
}
