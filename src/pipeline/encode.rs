//! Image encoding: one [`ImagePayload`] → base64 string plus format tag.
//!
//! Encoded payloads are passed through byte-for-byte, so decoding the base64
//! gives back exactly what the engine reported. Decoded bitmaps are written
//! as PNG (lossless). Any failure is an [`ImageEncodingError`] for that image
//! alone.

use crate::error::ImageEncodingError;
use crate::model::ImagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// A successfully encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    /// Short format name, e.g. `png`, `jpeg`.
    pub format: String,
}

impl EncodedImage {
    /// MIME type derived from the format name.
    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format)
    }

    /// `data:` URI suitable for an inline Markdown image.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.base64)
    }
}

/// Encode one image payload.
///
/// `index` and `page` only label the error if encoding fails.
pub fn encode_image(
    payload: &ImagePayload,
    index: usize,
    page: usize,
) -> Result<EncodedImage, ImageEncodingError> {
    match payload {
        ImagePayload::Encoded { format, data } => {
            if data.is_empty() {
                return Err(ImageEncodingError::EmptyPayload { index, page });
            }
            let format = match normalise_format_tag(format) {
                Some(f) if is_format_name(&f) => f,
                Some(_) => return Err(ImageEncodingError::UnknownFormat { index, page }),
                None => infer_format(data).ok_or(ImageEncodingError::UnknownFormat { index, page })?,
            };
            let base64 = STANDARD.encode(data);
            debug!("Encoded image {} ({}) → {} bytes base64", index, format, base64.len());
            Ok(EncodedImage { base64, format })
        }
        ImagePayload::Pixels(img) => encode_pixels(img, index, page),
        ImagePayload::Unavailable { detail } => Err(ImageEncodingError::Unavailable {
            index,
            page,
            detail: detail.clone(),
        }),
    }
}

/// PNG-encode a decoded bitmap.
fn encode_pixels(
    img: &DynamicImage,
    index: usize,
    page: usize,
) -> Result<EncodedImage, ImageEncodingError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ImageEncodingError::EmptyPayload { index, page });
    }

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImageEncodingError::EncodeFailed {
            index,
            page,
            detail: e.to_string(),
        })?;

    let base64 = STANDARD.encode(&buf);
    debug!(
        "Encoded image {} ({}x{} px) → {} bytes base64",
        index,
        img.width(),
        img.height(),
        base64.len()
    );

    Ok(EncodedImage {
        base64,
        format: "png".to_string(),
    })
}

/// Lower-case a format tag, accepting MIME types and common aliases.
/// Returns `None` for an empty tag.
fn normalise_format_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_ascii_lowercase();
    let tag = tag.strip_prefix("image/").unwrap_or(&tag);
    match tag {
        "" => None,
        "jpg" | "jpe" => Some("jpeg".to_string()),
        "tif" => Some("tiff".to_string()),
        other => Some(other.to_string()),
    }
}

/// The tag ends up inside a `data:` URI, so only MIME subtype characters
/// are allowed.
fn is_format_name(tag: &str) -> bool {
    tag.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-'))
}

/// Guess the format from magic bytes.
fn infer_format(data: &[u8]) -> Option<String> {
    let name = match image::guess_format(data).ok()? {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Ico => "x-icon",
        _ => return None,
    };
    Some(name.to_string())
}
