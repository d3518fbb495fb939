//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across threads and diffed between runs.

use crate::error::Pdf2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdftext2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .include_images(true)
///     .embed_images(true)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Extract embedded images. Default: false.
    pub include_images: bool,

    /// Inline extracted images as `data:` URIs instead of returning them as a
    /// separate list. Ignored unless `include_images` is set. Default: false.
    pub embed_images: bool,

    /// Font-size tiers that promote a block to a heading.
    pub headings: HeadingThresholds,

    /// Marker emitted between consecutive pages. Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Include YAML front-matter with document metadata. Default: false.
    pub include_metadata: bool,

    /// Maximum downward jump between two text runs, as a multiple of the
    /// font size, that still counts as the same block. Default: 1.5.
    ///
    /// Body text with normal leading moves down by ~1.2× its size per line;
    /// paragraph breaks and headings usually jump further.
    pub block_gap_ratio: f32,

    /// Number of documents converted at once by [`crate::stream::convert_stream`].
    /// Default: 4.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Observer for per-page events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            include_images: false,
            embed_images: false,
            headings: HeadingThresholds::default(),
            page_separator: PageSeparator::default(),
            pages: PageSelection::default(),
            password: None,
            include_metadata: false,
            block_gap_ratio: 1.5,
            concurrency: 4,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("include_images", &self.include_images)
            .field("embed_images", &self.embed_images)
            .field("headings", &self.headings)
            .field("page_separator", &self.page_separator)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("include_metadata", &self.include_metadata)
            .field("block_gap_ratio", &self.block_gap_ratio)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The two flags the formatter honours.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            include_images: self.include_images,
            embed_images: self.embed_images,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn include_images(mut self, v: bool) -> Self {
        self.config.include_images = v;
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.config.embed_images = v;
        self
    }

    pub fn headings(mut self, thresholds: HeadingThresholds) -> Self {
        self.config.headings = thresholds;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn block_gap_ratio(mut self, ratio: f32) -> Self {
        self.config.block_gap_ratio = ratio;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        c.headings.validate()?;
        if !c.block_gap_ratio.is_finite() || c.block_gap_ratio <= 0.0 {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "Block gap ratio must be a positive number, got {}",
                c.block_gap_ratio
            )));
        }
        if c.concurrency == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Formatter options ────────────────────────────────────────────────────

/// Image handling flags for a single formatter call.
///
/// `embed_images` only has an effect when `include_images` is also set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    pub include_images: bool,
    pub embed_images: bool,
}

// ── Heading tiers ────────────────────────────────────────────────────────

/// Minimum dominant font sizes (in points) for heading levels 1–3.
///
/// A block whose largest span is at least `h1` becomes `#`, at least `h2`
/// becomes `##`, at least `h3` becomes `###`; anything smaller stays a
/// paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingThresholds {
    pub h1: f32,
    pub h2: f32,
    pub h3: f32,
}

impl Default for HeadingThresholds {
    fn default() -> Self {
        Self {
            h1: 20.0,
            h2: 15.0,
            h3: 13.0,
        }
    }
}

impl HeadingThresholds {
    pub fn new(h1: f32, h2: f32, h3: f32) -> Self {
        Self { h1, h2, h3 }
    }

    /// `(minimum size, heading level)` pairs, largest first.
    pub fn tiers(&self) -> [(f32, u8); 3] {
        [(self.h1, 1), (self.h2, 2), (self.h3, 3)]
    }

    /// Heading level for a dominant font size, or `None` for body text.
    pub fn level_for(&self, size: f32) -> Option<u8> {
        self.tiers()
            .iter()
            .find(|(min, _)| size >= *min)
            .map(|(_, level)| *level)
    }

    /// Tiers must be finite, positive and strictly descending.
    pub fn validate(&self) -> Result<(), Pdf2MdError> {
        let tiers = self.tiers();
        if tiers.iter().any(|(min, _)| !min.is_finite() || *min <= 0.0) {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "Heading thresholds must be positive numbers, got {}/{}/{}",
                self.h1, self.h2, self.h3
            )));
        }
        if !(self.h1 > self.h2 && self.h2 > self.h3) {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "Heading thresholds must be strictly descending (h1 > h2 > h3), got {}/{}/{}",
                self.h1, self.h2, self.h3
            )));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Marker placed between the content of consecutive pages.
///
/// Every variant renders to a non-empty string ending in a blank line, so an
/// N-page document always carries exactly N−1 markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Horizontal rule: "---" (default)
    #[default]
    HorizontalRule,
    /// Horizontal rule followed by an italic page label: "---" + "*Page N*"
    Labeled,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before page `page_num` (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::HorizontalRule => "---\n\n".to_string(),
            PageSeparator::Labeled => format!("---\n\n*Page {}*\n\n", page_num),
            PageSeparator::Comment => format!("<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("{}\n\n", s),
        }
    }
}
