//! # pdftext2md
//!
//! Convert the text layer of PDF documents to Markdown, using font metadata
//! to recover structure.
//!
//! ## How structure is recovered
//!
//! PDFs carry no notion of "heading" or "paragraph", only positioned glyphs
//! in a given font. This crate reads the text objects pdfium reports for each
//! page, groups them into blocks by position, then decides each block's role
//! from its largest font size: at least 20pt becomes `#`, at least 15pt
//! `##`, at least 13pt `###`, anything smaller a paragraph. Bold and italic
//! fonts become `**` / `*` emphasis. No OCR, no model calls: the output is
//! deterministic for a given PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  walk pdfium page objects into spans and blocks
//!  │              (CPU-bound, spawn_blocking)
//!  ├─ 3. Format   blocks → headings / paragraphs, images → base64
//!  └─ 4. Output   Markdown + images + warnings + stats
//! ```
//!
//! The formatter ([`format::MarkdownFormatter`]) is pure and can be driven
//! directly from a [`DocumentLayout`] produced elsewhere; see
//! [`convert_layout`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftext2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().include_images(true).build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.markdown());
//!     eprintln!("{} headings, {} images", output.stats.headings_emitted, output.images().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftext2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdftext2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirement
//!
//! Extraction needs the pdfium shared library at runtime. It is looked up in
//! `$PDFIUM_LIB_PATH`, then the working directory, then the system library
//! path. [`convert_layout`] and the formatter do not need it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, FormatOptions, HeadingThresholds, PageSelection,
    PageSeparator,
};
pub use convert::{convert, convert_from_bytes, convert_layout, convert_sync, convert_to_file, inspect};
pub use error::{ImageEncodingError, Pdf2MdError};
pub use format::MarkdownFormatter;
pub use model::{Block, BoundingBox, DocumentLayout, ImagePayload, Page, RawImage, Span};
pub use output::{
    ConversionOutput, ConversionStats, DocumentMetadata, ExtractedImage, FormatSummary,
    MarkdownResult,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_many, convert_stream, DocumentResult, DocumentStream};
