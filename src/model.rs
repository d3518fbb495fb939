//! Page → block → span layout consumed by the Markdown formatter.
//!
//! The layout is what the PDF engine hands over after it has done the hard
//! work: each span carries its text and font configuration, blocks group
//! spans into paragraph candidates, and pages group blocks. Order is always
//! extraction order; nothing here sorts.
//!
//! [`DocumentLayout`] is the serialisable form of the same data, so a layout
//! produced elsewhere (or captured for a test) can be formatted without
//! loading pdfium. Image bytes travel as base64 strings in JSON.

use crate::error::Pdf2MdError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A run of text sharing one font configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    /// Rendered font size in points.
    pub font_size: f32,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    /// Position on the page, in PDF user-space points (origin bottom-left).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Span {
    /// A plain span with no emphasis and no geometry.
    pub fn plain(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: false,
            is_italic: false,
            bbox: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.is_italic = true;
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Axis-aligned rectangle in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl BoundingBox {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }
}

/// An engine-grouped sequence of spans treated as one paragraph candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub spans: Vec<Span>,
}

impl Block {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    /// The largest span font size, or `None` for a block without spans.
    pub fn dominant_font_size(&self) -> Option<f32> {
        self.spans.iter().map(|s| s.font_size).reduce(f32::max)
    }

    /// Concatenated span text without any emphasis markers.
    pub fn raw_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// The blocks of one PDF page, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed page number in the source document. When absent the page's
    /// position in the sequence is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<usize>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            number: None,
            blocks,
        }
    }

    pub fn with_number(mut self, number: usize) -> Self {
        self.number = Some(number);
        self
    }

    /// Page number for labels, given the page's 0-based position.
    pub fn display_number(&self, position: usize) -> usize {
        self.number.unwrap_or(position + 1)
    }
}

/// One embedded image as reported by the PDF engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImage {
    /// 0-based position of the originating page in the `pages` sequence.
    pub page_index: usize,
    pub payload: ImagePayload,
}

impl RawImage {
    pub fn new(page_index: usize, payload: ImagePayload) -> Self {
        Self {
            page_index,
            payload,
        }
    }
}

/// The binary side of a [`RawImage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    /// Already-encoded bytes (PNG, JPEG, …). An empty `format` means the
    /// format is inferred from the magic bytes.
    Encoded {
        #[serde(default)]
        format: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// A decoded bitmap; written out as PNG.
    #[serde(skip)]
    Pixels(DynamicImage),
    /// The engine saw the image but could not produce its data.
    Unavailable { detail: String },
}

/// Pages plus images: everything the formatter needs for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentLayout {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

impl DocumentLayout {
    /// Parse a layout from JSON.
    ///
    /// Structural problems (a span without `font_size`, bad base64, wrong
    /// types) are reported as [`Pdf2MdError::MalformedInput`].
    pub fn from_json(json: &str) -> Result<Self, Pdf2MdError> {
        serde_json::from_str(json).map_err(|e| {
            Pdf2MdError::malformed(
                format!("line {}, column {}", e.line(), e.column()),
                e.to_string(),
            )
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, Pdf2MdError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Pdf2MdError::Internal(format!("Failed to serialise layout: {e}")))
    }
}

/// Serde adapter storing `Vec<u8>` as a standard base64 string.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}
