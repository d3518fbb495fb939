//! Layout extraction: walk pdfium page objects and build a [`DocumentLayout`].
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread so Tokio worker threads never stall on a large document.
//!
//! ## Block grouping
//!
//! pdfium reports text objects, not paragraphs. Objects are grouped into
//! blocks by geometry in [`group_into_blocks`], which is pure and tested
//! without pdfium.

use crate::config::{ConversionConfig, PageSelection};
use crate::error::Pdf2MdError;
use crate::model::{Block, BoundingBox, DocumentLayout, ImagePayload, Page, RawImage, Span};
use crate::output::DocumentMetadata;
use crate::pipeline::postprocess::clean_span_text;
use crate::progress::ProgressCallback;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Font size used when pdfium reports neither a scaled nor an unscaled size.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Baseline tolerance for two spans on the same line, relative to font size.
const SAME_LINE_RATIO: f32 = 0.5;

/// Horizontal gap, relative to font size, above which a space is inserted.
const WORD_GAP_RATIO: f32 = 0.15;

const ENV_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// Everything read from one PDF.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub layout: DocumentLayout,
    pub metadata: DocumentMetadata,
    /// Pages in the source document, selected or not.
    pub total_pages: usize,
}

/// Bind pdfium: `$PDFIUM_LIB_PATH`, then the working directory, then the
/// system library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2MdError> {
    let from_env = std::env::var_os(ENV_LIB_PATH)
        .map(PathBuf::from)
        .ok_or_else(|| format!("{} not set", ENV_LIB_PATH))
        .and_then(|path| {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(lib).map_err(|e| format!("{:?}", e))
        });

    let bindings = match from_env {
        Ok(bindings) => bindings,
        Err(reason) => {
            debug!("pdfium: {}; trying working directory", reason);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    Pdf2MdError::PdfiumBindingFailed(format!(
                        "could not load the pdfium library (set {}): {:?}",
                        ENV_LIB_PATH, e
                    ))
                })?
        }
    };

    Ok(Pdfium::new(bindings))
}

/// Extract the text layout (and optionally images) of the selected pages.
pub async fn extract_layout(
    bytes: Vec<u8>,
    origin: PathBuf,
    config: &ConversionConfig,
) -> Result<ExtractedDocument, Pdf2MdError> {
    let config = config.clone();

    tokio::task::spawn_blocking(move || extract_layout_blocking(&bytes, &origin, &config))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Extract document metadata without walking any page.
pub async fn extract_metadata(
    bytes: Vec<u8>,
    origin: PathBuf,
    password: Option<String>,
) -> Result<DocumentMetadata, Pdf2MdError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = load_document(&pdfium, &bytes, &origin, password.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Blocking implementation of layout extraction.
fn extract_layout_blocking(
    bytes: &[u8],
    origin: &Path,
    config: &ConversionConfig,
) -> Result<ExtractedDocument, Pdf2MdError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, bytes, origin, config.password.as_deref())?;
    let metadata = read_metadata(&document);

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = config.pages.to_indices(total_pages);
    if indices.is_empty() && total_pages > 0 {
        return Err(Pdf2MdError::PageOutOfRange {
            page: first_requested_page(config),
            total: total_pages,
        });
    }

    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_conversion_start(indices.len());
    }

    let mut layout = DocumentLayout::default();
    for (position, &idx) in indices.iter().enumerate() {
        if let Some(cb) = progress {
            cb.on_page_start(idx + 1, indices.len());
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| Pdf2MdError::ExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let (spans, images) = walk_page(&page, idx + 1, position, config.include_images);
        let blocks = group_into_blocks(spans, config.block_gap_ratio);
        debug!(
            "Page {}: {} blocks, {} images",
            idx + 1,
            blocks.len(),
            images.len()
        );

        report_page(progress, idx + 1, indices.len(), blocks.len());
        layout.pages.push(Page::new(blocks).with_number(idx + 1));
        layout.images.extend(images);
    }

    Ok(ExtractedDocument {
        layout,
        metadata,
        total_pages,
    })
}

fn report_page(progress: Option<&ProgressCallback>, page_num: usize, total: usize, blocks: usize) {
    if let Some(cb) = progress {
        cb.on_page_complete(page_num, total, blocks);
    }
}

fn first_requested_page(config: &ConversionConfig) -> usize {
    match &config.pages {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(1),
    }
}

/// Load a document from memory, mapping pdfium errors onto typed variants.
fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    origin: &Path,
    password: Option<&str>,
) -> Result<PdfDocument<'a>, Pdf2MdError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2MdError::WrongPassword {
                    path: origin.to_path_buf(),
                }
            } else {
                Pdf2MdError::PasswordRequired {
                    path: origin.to_path_buf(),
                }
            }
        } else {
            Pdf2MdError::CorruptPdf {
                path: origin.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        is_encrypted: false, // pdfium doesn't readily expose this after opening
    }
}

/// Collect spans and images from one page in object order.
fn walk_page(
    page: &PdfPage,
    page_num: usize,
    page_position: usize,
    include_images: bool,
) -> (Vec<Span>, Vec<RawImage>) {
    let mut spans = Vec::new();
    let mut images = Vec::new();

    for object in page.objects().iter() {
        if let Some(text_object) = object.as_text_object() {
            let text = clean_span_text(&text_object.text());
            if text.trim().is_empty() {
                continue;
            }

            let font = text_object.font();
            let name = font.name();
            let weight = font.weight().ok().and_then(|w| weight_value(&w));

            let mut span = Span::plain(text, font_size_of(text_object));
            span.is_bold = is_bold_font(&name, weight, font.is_bold_reenforced());
            span.is_italic = is_italic_font(&name, font.is_italic());
            if let Ok(bounds) = object.bounds() {
                span.bbox = Some(BoundingBox::new(
                    bounds.left().value,
                    bounds.bottom().value,
                    bounds.right().value,
                    bounds.top().value,
                ));
            }
            spans.push(span);
        } else if let Some(image_object) = object.as_image_object() {
            if !include_images {
                continue;
            }
            images.push(RawImage::new(page_position, image_payload(image_object, page_num)));
        }
    }

    (spans, images)
}

/// Stored JPEG and JPEG 2000 streams are returned as is; everything else is
/// decoded to a bitmap.
fn image_payload(image_object: &PdfPageImageObject, page_num: usize) -> ImagePayload {
    let filters: Vec<String> = image_object
        .filters()
        .iter()
        .map(|filter| filter.name().to_string())
        .collect();

    if let Some(format) = stored_image_format(&filters) {
        match image_object.get_raw_image_data() {
            Ok(data) if !data.is_empty() => {
                return ImagePayload::Encoded {
                    format: format.to_string(),
                    data,
                };
            }
            Ok(_) => debug!("Page {}: empty {} stream, decoding instead", page_num, format),
            Err(e) => debug!("Page {}: raw {} stream unavailable: {:?}", page_num, format, e),
        }
    }

    match image_object.get_raw_image() {
        Ok(image) => ImagePayload::Pixels(image),
        Err(e) => {
            warn!("Page {}: image could not be decoded: {:?}", page_num, e);
            ImagePayload::Unavailable {
                detail: format!("{:?}", e),
            }
        }
    }
}

/// Format of an image stream whose stored bytes are a complete file.
///
/// Only a single DCT or JPX filter qualifies; a chain such as
/// `[FlateDecode, DCTDecode]` stores compressed JPEG bytes.
fn stored_image_format(filters: &[String]) -> Option<&'static str> {
    match filters {
        [only] if only == "DCTDecode" => Some("jpeg"),
        [only] if only == "JPXDecode" => Some("jp2"),
        _ => None,
    }
}

fn font_size_of(text_object: &PdfPageTextObject) -> f32 {
    [
        text_object.scaled_font_size().value,
        text_object.unscaled_font_size().value,
    ]
    .into_iter()
    .find(|size| size.is_finite() && *size > 0.0)
    .unwrap_or(DEFAULT_FONT_SIZE)
}

fn weight_value(weight: &PdfFontWeight) -> Option<u32> {
    match weight {
        PdfFontWeight::Weight100 => Some(100),
        PdfFontWeight::Weight200 => Some(200),
        PdfFontWeight::Weight300 => Some(300),
        PdfFontWeight::Weight400Normal => Some(400),
        PdfFontWeight::Weight500 => Some(500),
        PdfFontWeight::Weight600 => Some(600),
        PdfFontWeight::Weight700Bold => Some(700),
        PdfFontWeight::Weight800 => Some(800),
        PdfFontWeight::Weight900 => Some(900),
        PdfFontWeight::Custom(w) => Some(*w),
    }
}

/// A font counts as bold from weight 600, when pdfium forces bold, or when
/// its PostScript name says so.
pub fn is_bold_font(name: &str, weight: Option<u32>, forced: bool) -> bool {
    if forced || weight.is_some_and(|w| w >= 600) {
        return true;
    }
    let name = name.to_ascii_lowercase();
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|marker| name.contains(marker))
}

pub fn is_italic_font(name: &str, flagged: bool) -> bool {
    if flagged {
        return true;
    }
    let name = name.to_ascii_lowercase();
    name.contains("italic") || name.contains("oblique")
}

enum Placement {
    SameLine { spaced: bool },
    NextLine,
    NewBlock,
}

/// Group spans (in reading order) into blocks by their bounding boxes.
///
/// PDF coordinates grow upwards, so a following line has a smaller baseline.
/// Spans without a bounding box stay in the current block.
pub fn group_into_blocks(spans: Vec<Span>, block_gap_ratio: f32) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    let mut anchor: Option<(BoundingBox, f32)> = None;

    for span in spans {
        if let (Some(bbox), Some((prev, prev_size))) = (span.bbox, anchor) {
            match place(&prev, prev_size, &bbox, span.font_size, block_gap_ratio) {
                Placement::SameLine { spaced: true } | Placement::NextLine => {
                    pad_previous(&mut current, &span.text)
                }
                Placement::SameLine { spaced: false } => {}
                Placement::NewBlock => {
                    if !current.is_empty() {
                        blocks.push(Block::new(std::mem::take(&mut current)));
                    }
                }
            }
        }
        if let Some(bbox) = span.bbox {
            anchor = Some((bbox, span.font_size));
        }
        current.push(span);
    }

    if !current.is_empty() {
        blocks.push(Block::new(current));
    }
    blocks
}

fn place(
    prev: &BoundingBox,
    prev_size: f32,
    cur: &BoundingBox,
    cur_size: f32,
    block_gap_ratio: f32,
) -> Placement {
    let drop = prev.bottom - cur.bottom;

    if drop.abs() < SAME_LINE_RATIO * prev_size.max(cur_size) {
        let gap = cur.left - prev.right;
        return Placement::SameLine {
            spaced: gap > WORD_GAP_RATIO * cur_size,
        };
    }

    // Measured against the smaller size so a heading never swallows the
    // paragraph beneath it.
    if drop > 0.0 && drop <= block_gap_ratio * prev_size.min(cur_size) {
        Placement::NextLine
    } else {
        Placement::NewBlock
    }
}

/// Append a separating space to the last span unless either side already
/// carries whitespace.
fn pad_previous(current: &mut [Span], next_text: &str) {
    if let Some(last) = current.last_mut() {
        if !last.text.ends_with(char::is_whitespace) && !next_text.starts_with(char::is_whitespace)
        {
            last.text.push(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str, size: f32, left: f32, bottom: f32) -> Span {
        let width = text.len() as f32 * size * 0.5;
        Span::plain(text, size).with_bbox(BoundingBox::new(left, bottom, left + width, bottom + size))
    }

    fn texts(block: &Block) -> Vec<&str> {
        block.spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn only_standalone_image_streams_pass_through() {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        assert_eq!(stored_image_format(&names(&["DCTDecode"])), Some("jpeg"));
        assert_eq!(stored_image_format(&names(&["JPXDecode"])), Some("jp2"));
        assert_eq!(stored_image_format(&names(&["FlateDecode"])), None);
        assert_eq!(stored_image_format(&names(&["FlateDecode", "DCTDecode"])), None);
        assert_eq!(stored_image_format(&[]), None);
    }

    #[test]
    fn adjacent_spans_share_a_line_without_padding() {
        // "Hel" ends at 72 + 3*6 = 90; "lo" starts right there.
        let spans = vec![at("Hel", 12.0, 72.0, 700.0), at("lo", 12.0, 90.0, 700.0)];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 1);
        assert_eq!(texts(&blocks[0]), vec!["Hel", "lo"]);
    }

    #[test]
    fn wide_horizontal_gap_inserts_space() {
        let spans = vec![at("Hello", 12.0, 72.0, 700.0), at("world", 12.0, 110.0, 700.0)];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 1);
        assert_eq!(texts(&blocks[0]), vec!["Hello ", "world"]);
    }

    #[test]
    fn wrapped_line_joins_with_space() {
        let spans = vec![
            at("first line", 12.0, 72.0, 700.0),
            at("second line", 12.0, 72.0, 686.0),
        ];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text(), "first line second line");
    }

    #[test]
    fn large_vertical_gap_starts_new_block() {
        let spans = vec![
            at("Paragraph one.", 12.0, 72.0, 700.0),
            at("Paragraph two.", 12.0, 72.0, 660.0),
        ];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].raw_text(), "Paragraph one.");
        assert_eq!(blocks[1].raw_text(), "Paragraph two.");
    }

    #[test]
    fn moving_up_starts_new_block() {
        // Second column starts back at the top of the page.
        let spans = vec![
            at("left column", 12.0, 72.0, 100.0),
            at("right column", 12.0, 320.0, 700.0),
        ];
        assert_eq!(group_into_blocks(spans, 1.5).len(), 2);
    }

    #[test]
    fn heading_does_not_absorb_body() {
        let spans = vec![
            at("Title", 24.0, 72.0, 700.0),
            at("Body text", 11.0, 72.0, 670.0),
        ];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].dominant_font_size(), Some(24.0));
    }

    #[test]
    fn gap_ratio_is_configurable() {
        let spans = || {
            vec![
                at("one", 10.0, 72.0, 700.0),
                at("two", 10.0, 72.0, 680.0),
            ]
        };
        assert_eq!(group_into_blocks(spans(), 1.5).len(), 2);
        assert_eq!(group_into_blocks(spans(), 2.5).len(), 1);
    }

    #[test]
    fn spans_without_bbox_stay_in_block() {
        let spans = vec![
            at("start", 12.0, 72.0, 700.0),
            Span::plain(" floating", 12.0),
            at("end", 12.0, 72.0, 600.0),
        ];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(blocks.len(), 2);
        assert_eq!(texts(&blocks[0]), vec!["start", " floating"]);
        assert_eq!(texts(&blocks[1]), vec!["end"]);
    }

    #[test]
    fn existing_whitespace_is_not_doubled() {
        let spans = vec![at("Hello ", 12.0, 72.0, 700.0), at("world", 12.0, 120.0, 700.0)];
        let blocks = group_into_blocks(spans, 1.5);
        assert_eq!(texts(&blocks[0]), vec!["Hello ", "world"]);
    }

    #[test]
    fn grouping_preserves_span_count_and_order() {
        let spans: Vec<Span> = (0..10)
            .map(|i| at(&format!("s{i}"), 12.0, 72.0, 700.0 - i as f32 * 40.0))
            .collect();
        let blocks = group_into_blocks(spans, 1.5);
        let all: Vec<String> = blocks
            .iter()
            .flat_map(|b| b.spans.iter().map(|s| s.text.clone()))
            .collect();
        assert_eq!(all.len(), 10);
        assert_eq!(all[3], "s3");
    }

    #[test]
    fn empty_input_yields_no_blocks() {
        assert!(group_into_blocks(Vec::new(), 1.5).is_empty());
    }

    #[test]
    fn bold_detection() {
        assert!(is_bold_font("Helvetica-Bold", None, false));
        assert!(is_bold_font("ABCDEF+Inter-SemiBold", None, false));
        assert!(is_bold_font("Arial-Black", None, false));
        assert!(is_bold_font("Times", Some(700), false));
        assert!(is_bold_font("Times", Some(600), false));
        assert!(is_bold_font("Times", None, true));
        assert!(!is_bold_font("Times-Roman", Some(400), false));
        assert!(!is_bold_font("Times", Some(500), false));
    }

    #[test]
    fn italic_detection() {
        assert!(is_italic_font("Helvetica-Oblique", false));
        assert!(is_italic_font("Times-BoldItalic", false));
        assert!(is_italic_font("CMR10", true));
        assert!(!is_italic_font("Times-Roman", false));
    }

    #[test]
    fn custom_weight_passes_through() {
        assert_eq!(weight_value(&PdfFontWeight::Custom(650)), Some(650));
        assert_eq!(weight_value(&PdfFontWeight::Weight700Bold), Some(700));
    }
}
