//! Full-document conversion entry points.
//!
//! Every entry point runs the same pipeline once the PDF bytes are in hand:
//! extract the layout on a blocking thread, format it, optionally prepend
//! YAML front matter, then compute stats. [`convert_layout`] skips straight
//! to formatting for layouts produced elsewhere.

use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::format::MarkdownFormatter;
use crate::model::DocumentLayout;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, MarkdownResult};
use crate::pipeline::extract;
use crate::pipeline::input::{self, ResolvedInput};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Conversion configuration
///
/// # Errors
/// Returns `Err(Pdf2MdError)` for anything that stops the document as a
/// whole: unreadable input, a PDF pdfium cannot open, a page selection that
/// matches nothing. Images that fail to encode are reported in
/// [`ConversionOutput::warnings`] instead.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    convert_resolved(resolved, config, total_start).await
}

/// Convert PDF bytes in memory to Markdown.
///
/// The recommended API when PDF data comes from a database, network stream,
/// or in-memory buffer rather than a file on disk. Nothing touches the
/// filesystem.
///
/// # Example
/// ```rust,no_run
/// use pdftext2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// println!("{}", output.markdown());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let resolved = ResolvedInput::from_bytes(bytes.to_vec())?;
    convert_resolved(resolved, config, total_start).await
}

/// Format an already-extracted layout. Does not load pdfium.
///
/// Page selection does not apply here; every page of `layout` is formatted.
pub fn convert_layout(
    layout: &DocumentLayout,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let pages = layout.pages.len();

    // The layout is already extracted, so each page starts and completes at once.
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(pages);
        for (position, page) in layout.pages.iter().enumerate() {
            let page_num = page.display_number(position);
            cb.on_page_start(page_num, pages);
            cb.on_page_complete(page_num, pages, page.blocks.len());
        }
    }

    let metadata = DocumentMetadata {
        page_count: pages,
        ..DocumentMetadata::default()
    };

    let format_start = Instant::now();
    let result = format_layout(layout, config)?;
    let format_duration_ms = format_start.elapsed().as_millis() as u64;

    Ok(finish(
        result,
        metadata,
        config,
        Timings {
            total_pages: pages,
            processed_pages: pages,
            extract_ms: 0,
            format_ms: format_duration_ms,
            started: total_start,
        },
    ))
}

/// Convert a PDF and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2MdError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), output.markdown()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Extract PDF metadata without converting content.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2MdError> {
    let timeout = ConversionConfig::default().download_timeout_secs;
    let resolved = input::resolve_input(input_str.as_ref(), timeout).await?;
    extract::extract_metadata(resolved.bytes, resolved.origin, None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Timings {
    total_pages: usize,
    processed_pages: usize,
    extract_ms: u64,
    format_ms: u64,
    started: Instant,
}

async fn convert_resolved(
    resolved: ResolvedInput,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, Pdf2MdError> {
    // ── Step 2: Extract layout ───────────────────────────────────────────
    let extract_start = Instant::now();
    let extracted = extract::extract_layout(resolved.bytes, resolved.origin, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages, {} images in {}ms",
        extracted.layout.pages.len(),
        extracted.layout.images.len(),
        extract_duration_ms
    );

    // ── Step 3: Format ───────────────────────────────────────────────────
    let format_start = Instant::now();
    let result = format_layout(&extracted.layout, config)?;
    let format_duration_ms = format_start.elapsed().as_millis() as u64;

    // ── Step 4: Front matter and stats ───────────────────────────────────
    let output = finish(
        result,
        extracted.metadata,
        config,
        Timings {
            total_pages: extracted.total_pages,
            processed_pages: extracted.layout.pages.len(),
            extract_ms: extract_duration_ms,
            format_ms: format_duration_ms,
            started: total_start,
        },
    );

    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        output.stats.processed_pages, output.stats.total_pages, output.stats.total_duration_ms
    );
    Ok(output)
}

fn format_layout(
    layout: &DocumentLayout,
    config: &ConversionConfig,
) -> Result<MarkdownResult, Pdf2MdError> {
    let formatter = MarkdownFormatter::new(config.headings, config.page_separator.clone());
    formatter.convert(&layout.pages, Some(&layout.images), config.format_options())
}

fn finish(
    mut result: MarkdownResult,
    metadata: DocumentMetadata,
    config: &ConversionConfig,
    timings: Timings,
) -> ConversionOutput {
    let processed_pages = timings.processed_pages;

    if config.include_metadata {
        result.markdown.insert_str(0, &format_yaml_front_matter(&metadata));
    }

    let images_extracted = result.images.len() + result.summary.images_embedded;
    if !result.warnings.is_empty() {
        warn!("{} image(s) skipped", result.warnings.len());
    }

    if let Some(ref cb) = config.progress_callback {
        for warning in &result.warnings {
            cb.on_image_skipped(warning);
        }
        cb.on_conversion_complete(processed_pages, images_extracted);
    }

    let stats = ConversionStats {
        total_pages: timings.total_pages,
        processed_pages,
        blocks_emitted: result.summary.blocks_emitted,
        headings_emitted: result.summary.headings_emitted,
        images_extracted,
        images_skipped: result.warnings.len(),
        extract_duration_ms: timings.extract_ms,
        format_duration_ms: timings.format_ms,
        total_duration_ms: timings.started.elapsed().as_millis() as u64,
    };
    debug!("{:?}", stats);

    ConversionOutput {
        result,
        metadata,
        stats,
    }
}

pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2MdError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Format document metadata as YAML front matter.
fn format_yaml_front_matter(meta: &DocumentMetadata) -> String {
    let mut yaml = String::from("---\n");

    let fields = [
        ("title", &meta.title),
        ("author", &meta.author),
        ("subject", &meta.subject),
        ("creator", &meta.creator),
        ("producer", &meta.producer),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            yaml.push_str(&format!("{}: \"{}\"\n", key, yaml_escape(v)));
        }
    }
    yaml.push_str(&format!("pages: {}\n", meta.page_count));
    if !meta.pdf_version.is_empty() {
        yaml.push_str(&format!("pdf_version: \"{}\"\n", yaml_escape(&meta.pdf_version)));
    }

    yaml.push_str("---\n\n");
    yaml
}

fn yaml_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
