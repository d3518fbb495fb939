//! Result types returned by the formatter and the conversion entry points.

use crate::error::ImageEncodingError;
use serde::{Deserialize, Serialize};

/// What the Markdown formatter produces for one document.
///
/// Serialises to `{markdown, images, warnings}`; `images` is empty unless
/// images were requested and not embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkdownResult {
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
    /// Images that were dropped, one entry per failure.
    #[serde(default)]
    pub warnings: Vec<ImageEncodingError>,
    #[serde(skip)]
    pub summary: FormatSummary,
}

/// An image returned alongside the Markdown text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Position of the image in the engine's image list (0-based). Stable:
    /// failed images leave a gap rather than shifting later indices.
    pub index: usize,
    /// 1-indexed page the image came from.
    pub page: usize,
    /// Short format name, e.g. `png`.
    pub format: String,
    pub base64: String,
}

/// Counters gathered while formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatSummary {
    /// Blocks that produced a heading or paragraph line.
    pub blocks_emitted: usize,
    /// Of those, how many were headings.
    pub headings_emitted: usize,
    /// Blocks dropped because their text was blank.
    pub blocks_skipped: usize,
    /// Images inlined as `data:` URIs.
    pub images_embedded: usize,
}

/// Full output of a [`crate::convert()`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    #[serde(flatten)]
    pub result: MarkdownResult,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn markdown(&self) -> &str {
        &self.result.markdown
    }

    pub fn images(&self) -> &[ExtractedImage] {
        &self.result.images
    }

    pub fn warnings(&self) -> &[ImageEncodingError] {
        &self.result.warnings
    }
}

/// Timing and volume figures for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages selected and formatted.
    pub processed_pages: usize,
    pub blocks_emitted: usize,
    pub headings_emitted: usize,
    /// Images returned or embedded.
    pub images_extracted: usize,
    /// Images dropped with an [`ImageEncodingError`].
    pub images_skipped: usize,
    pub extract_duration_ms: u64,
    pub format_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Document-level information read from the PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}
