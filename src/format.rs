//! Markdown formatter: page → block → span layout in, Markdown text out.
//!
//! This is a single pass over an already-extracted layout. For every page in
//! order it emits a separator (except before the first page), then one line
//! per non-blank block:
//!
//! ```text
//! block ─▶ dominant size ─▶ heading tier ─┐
//!   └──▶ spans ─▶ emphasis runs ─────────┴─▶ "## **Bold** plain\n\n"
//! ```
//!
//! Heading level comes from the largest span size in the block, looked up in
//! the descending [`HeadingThresholds`] tiers. Emphasis is applied per run of
//! consecutive spans sharing the same bold/italic flags, so two adjacent bold
//! spans become `**ab**` rather than `**a****b**`.
//!
//! When images are requested they are either returned as a separate list or
//! inlined as `data:` URIs after the last block of their page. An image that
//! cannot be encoded is dropped with a warning; everything else still renders.

use crate::config::{FormatOptions, HeadingThresholds, PageSeparator};
use crate::error::Pdf2MdError;
use crate::model::{Block, Page, RawImage, Span};
use crate::output::{ExtractedImage, MarkdownResult};
use crate::pipeline::encode::{encode_image, EncodedImage};
use tracing::{debug, warn};

/// Stateless Markdown formatter.
///
/// Holds only static configuration; the same instance can format any number
/// of documents, from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct MarkdownFormatter {
    headings: HeadingThresholds,
    separator: PageSeparator,
}

impl MarkdownFormatter {
    pub fn new(headings: HeadingThresholds, separator: PageSeparator) -> Self {
        Self {
            headings,
            separator,
        }
    }

    /// Format `pages` (and `images`, when requested) into Markdown.
    ///
    /// # Errors
    /// [`Pdf2MdError::MalformedInput`] when a span's font size is not a
    /// positive finite number, or an included image points at a page that
    /// does not exist. Nothing is rendered in that case. Per-image encoding
    /// failures are not errors; they end up in [`MarkdownResult::warnings`].
    pub fn convert(
        &self,
        pages: &[Page],
        images: Option<&[RawImage]>,
        options: FormatOptions,
    ) -> Result<MarkdownResult, Pdf2MdError> {
        let images: &[RawImage] = if options.include_images {
            images.unwrap_or(&[])
        } else {
            &[]
        };
        validate(pages, images)?;

        let mut result = MarkdownResult::default();

        // Encode first so every page knows which images to inline after it.
        // Alt text numbers images per page; failed images still take a number.
        let mut embedded: Vec<Vec<(usize, usize, EncodedImage)>> = vec![Vec::new(); pages.len()];
        let mut per_page = vec![0usize; pages.len()];
        for (index, image) in images.iter().enumerate() {
            let page_num = pages[image.page_index].display_number(image.page_index);
            per_page[image.page_index] += 1;
            let ordinal = per_page[image.page_index];
            match encode_image(&image.payload, index, page_num) {
                Ok(encoded) if options.embed_images => {
                    embedded[image.page_index].push((ordinal, page_num, encoded));
                }
                Ok(encoded) => result.images.push(ExtractedImage {
                    index,
                    page: page_num,
                    format: encoded.format,
                    base64: encoded.base64,
                }),
                Err(e) => {
                    warn!("Skipping image: {}", e);
                    result.warnings.push(e);
                }
            }
        }

        let mut markdown = String::new();
        for (position, page) in pages.iter().enumerate() {
            let page_num = page.display_number(position);
            if position > 0 {
                markdown.push_str(&self.separator.render(page_num));
            }

            for block in &page.blocks {
                match self.render_block(block) {
                    Some((line, level)) => {
                        markdown.push_str(&line);
                        result.summary.blocks_emitted += 1;
                        if level.is_some() {
                            result.summary.headings_emitted += 1;
                        }
                    }
                    None => result.summary.blocks_skipped += 1,
                }
            }

            for (ordinal, image_page, encoded) in &embedded[position] {
                markdown.push_str(&format!(
                    "![Image {} from page {}]({})\n\n",
                    ordinal,
                    image_page,
                    encoded.data_uri()
                ));
                result.summary.images_embedded += 1;
            }

            debug!("Formatted page {} ({} blocks)", page_num, page.blocks.len());
        }

        result.markdown = markdown;
        Ok(result)
    }

    /// Heading level for a block, or `None` for a paragraph.
    pub fn classify(&self, block: &Block) -> Option<u8> {
        block
            .dominant_font_size()
            .and_then(|size| self.headings.level_for(size))
    }

    /// Render one block as `"{#… }{text}\n\n"`, or `None` if it is blank.
    fn render_block(&self, block: &Block) -> Option<(String, Option<u8>)> {
        if block.raw_text().trim().is_empty() {
            return None;
        }

        let level = self.classify(block);
        let text = render_spans(&block.spans);
        let line = match level {
            Some(level) => format!("{} {}\n\n", "#".repeat(level as usize), text.trim()),
            None => format!("{}\n\n", text.trim()),
        };
        Some((line, level))
    }
}

/// Format with the default heading tiers and a horizontal-rule separator.
pub fn convert(
    pages: &[Page],
    images: Option<&[RawImage]>,
    options: FormatOptions,
) -> Result<MarkdownResult, Pdf2MdError> {
    MarkdownFormatter::default().convert(pages, images, options)
}

/// Concatenate spans, wrapping each same-emphasis run in its markers.
fn render_spans(spans: &[Span]) -> String {
    spans
        .chunk_by(|a, b| a.is_bold == b.is_bold && a.is_italic == b.is_italic)
        .map(|run| {
            let text: String = run.iter().map(|s| s.text.as_str()).collect();
            emphasize(&text, emphasis_marker(&run[0]))
        })
        .collect()
}

fn emphasis_marker(span: &Span) -> &'static str {
    match (span.is_bold, span.is_italic) {
        (true, true) => "***",
        (true, false) => "**",
        (false, true) => "*",
        (false, false) => "",
    }
}

/// Wrap the non-whitespace core of `text` in `marker`.
///
/// Edge whitespace stays outside the markers (`" a "` → `" **a** "`);
/// whitespace-only text is returned as is.
fn emphasize(text: &str, marker: &str) -> String {
    let core = text.trim();
    if marker.is_empty() || core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    format!("{}{marker}{core}{marker}{}", &text[..start], &text[end..])
}

fn validate(pages: &[Page], images: &[RawImage]) -> Result<(), Pdf2MdError> {
    for (p, page) in pages.iter().enumerate() {
        for (b, block) in page.blocks.iter().enumerate() {
            for (s, span) in block.spans.iter().enumerate() {
                if !span.font_size.is_finite() || span.font_size <= 0.0 {
                    return Err(Pdf2MdError::malformed(
                        format!("page {}, block {}, span {}", p + 1, b + 1, s + 1),
                        format!("font size must be a positive number, got {}", span.font_size),
                    ));
                }
            }
        }
    }

    for (i, image) in images.iter().enumerate() {
        if image.page_index >= pages.len() {
            return Err(Pdf2MdError::malformed(
                format!("image {}", i),
                format!(
                    "page_index {} is out of range (layout has {} pages)",
                    image.page_index,
                    pages.len()
                ),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageEncodingError;
    use crate::model::ImagePayload;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn page(blocks: Vec<Block>) -> Page {
        Page::new(blocks)
    }

    fn block(spans: Vec<Span>) -> Block {
        Block::new(spans)
    }

    fn no_images() -> FormatOptions {
        FormatOptions::default()
    }

    fn png_bytes() -> Vec<u8> {
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3]
    }

    #[test]
    fn bold_title_becomes_h1() {
        let pages = vec![page(vec![block(vec![Span::plain("Title", 24.0).bold()])])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "# **Title**\n\n");
        assert!(result.images.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn heading_tiers() {
        let pages = vec![page(vec![
            block(vec![Span::plain("One", 20.0)]),
            block(vec![Span::plain("Two", 16.0)]),
            block(vec![Span::plain("Three", 13.0)]),
            block(vec![Span::plain("Body", 11.0)]),
        ])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "# One\n\n## Two\n\n### Three\n\nBody\n\n");
        assert_eq!(result.summary.headings_emitted, 3);
        assert_eq!(result.summary.blocks_emitted, 4);
    }

    #[test]
    fn dominant_size_decides_level() {
        let pages = vec![page(vec![block(vec![
            Span::plain("small ", 10.0),
            Span::plain("big", 21.0),
        ])])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "# small big\n\n");
    }

    #[test]
    fn custom_thresholds() {
        let formatter = MarkdownFormatter::new(
            HeadingThresholds::new(30.0, 25.0, 18.0),
            PageSeparator::default(),
        );
        let pages = vec![page(vec![block(vec![Span::plain("Not big enough", 24.0)])])];
        let result = formatter.convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "### Not big enough\n\n");
    }

    #[test]
    fn emphasis_markers() {
        let pages = vec![page(vec![block(vec![
            Span::plain("plain ", 11.0),
            Span::plain("bold", 11.0).bold(),
            Span::plain(" and ", 11.0),
            Span::plain("italic", 11.0).italic(),
            Span::plain(" and ", 11.0),
            Span::plain("both", 11.0).bold().italic(),
        ])])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(
            result.markdown,
            "plain **bold** and *italic* and ***both***\n\n"
        );
    }

    #[test]
    fn adjacent_same_emphasis_spans_share_markers() {
        let pages = vec![page(vec![block(vec![
            Span::plain("Hello ", 11.0).bold(),
            Span::plain("World", 11.0).bold(),
        ])])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "**Hello World**\n\n");
    }

    #[test]
    fn edge_whitespace_stays_outside_markers() {
        assert_eq!(emphasize(" word ", "**"), " **word** ");
        assert_eq!(emphasize("   ", "*"), "   ");
        assert_eq!(emphasize("x", ""), "x");
    }

    #[test]
    fn plain_block_has_no_markers() {
        let pages = vec![page(vec![block(vec![
            Span::plain("Just ", 11.0),
            Span::plain("text", 11.0),
        ])])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert!(!result.markdown.contains('*'));
        assert_eq!(result.markdown, "Just text\n\n");
    }

    #[test]
    fn blank_blocks_are_skipped() {
        let pages = vec![page(vec![
            block(vec![Span::plain("   ", 30.0).bold()]),
            block(vec![]),
            block(vec![Span::plain("Kept", 11.0)]),
        ])];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "Kept\n\n");
        assert_eq!(result.summary.blocks_skipped, 2);
    }

    #[test]
    fn separators_between_pages_only() {
        let pages = vec![
            page(vec![block(vec![Span::plain("A", 11.0)])]),
            page(vec![]),
            page(vec![block(vec![Span::plain("C", 11.0)])]),
        ];
        let result = convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "A\n\n---\n\n---\n\nC\n\n");
    }

    #[test]
    fn labeled_separator_uses_page_numbers() {
        let formatter =
            MarkdownFormatter::new(HeadingThresholds::default(), PageSeparator::Labeled);
        let pages = vec![
            page(vec![block(vec![Span::plain("A", 11.0)])]).with_number(3),
            page(vec![block(vec![Span::plain("B", 11.0)])]).with_number(7),
        ];
        let result = formatter.convert(&pages, None, no_images()).unwrap();
        assert_eq!(result.markdown, "A\n\n---\n\n*Page 7*\n\nB\n\n");
    }

    #[test]
    fn empty_document_is_empty_string() {
        let result = convert(&[], None, no_images()).unwrap();
        assert_eq!(result.markdown, "");
    }

    #[test]
    fn invalid_font_size_is_malformed() {
        for bad in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            let pages = vec![page(vec![
                block(vec![Span::plain("ok", 11.0)]),
                block(vec![Span::plain("ok", 11.0), Span::plain("bad", bad)]),
            ])];
            match convert(&pages, None, no_images()) {
                Err(Pdf2MdError::MalformedInput { location, .. }) => {
                    assert_eq!(location, "page 1, block 2, span 2");
                }
                other => panic!("expected MalformedInput for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn image_on_missing_page_is_malformed() {
        let pages = vec![page(vec![])];
        let images = vec![RawImage::new(
            1,
            ImagePayload::Encoded {
                format: "png".into(),
                data: png_bytes(),
            },
        )];
        let err = convert(&pages, Some(&images[..]), FormatOptions {
            include_images: true,
            embed_images: false,
        })
        .unwrap_err();
        assert!(matches!(err, Pdf2MdError::MalformedInput { .. }));
    }

    #[test]
    fn images_listed_separately() {
        let pages = vec![page(vec![block(vec![Span::plain("Text", 11.0)])])];
        let images = vec![RawImage::new(
            0,
            ImagePayload::Encoded {
                format: "png".into(),
                data: png_bytes(),
            },
        )];
        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: true,
                embed_images: false,
            },
        )
        .unwrap();
        assert_eq!(result.markdown, "Text\n\n");
        assert_eq!(result.images.len(), 1);
        let image = &result.images[0];
        assert_eq!((image.index, image.page), (0, 1));
        assert_eq!(image.format, "png");
        assert_eq!(STANDARD.decode(&image.base64).unwrap(), png_bytes());
    }

    #[test]
    fn images_embedded_at_end_of_their_page() {
        let pages = vec![
            page(vec![
                block(vec![Span::plain("First", 11.0)]),
                block(vec![Span::plain("Second", 11.0)]),
            ]),
            page(vec![block(vec![Span::plain("Third", 11.0)])]),
        ];
        let images = vec![RawImage::new(
            0,
            ImagePayload::Encoded {
                format: "png".into(),
                data: png_bytes(),
            },
        )];
        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: true,
                embed_images: true,
            },
        )
        .unwrap();

        let expected_uri = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
        assert_eq!(
            result.markdown,
            format!(
                "First\n\nSecond\n\n![Image 1 from page 1]({expected_uri})\n\n---\n\nThird\n\n"
            )
        );
        assert!(result.images.is_empty());
        assert_eq!(result.summary.images_embedded, 1);
    }

    #[test]
    fn embedded_images_follow_page_then_list_order() {
        let pages = vec![
            page(vec![block(vec![Span::plain("A", 11.0)])]),
            page(vec![block(vec![Span::plain("B", 11.0)])]),
        ];
        let payloads: Vec<Vec<u8>> = (1..=3u8)
            .map(|n| {
                let mut bytes = png_bytes();
                bytes.push(n);
                bytes
            })
            .collect();
        // Listed out of page order: second page, first page, second page.
        let images: Vec<RawImage> = [1, 0, 1]
            .iter()
            .zip(&payloads)
            .map(|(&page_index, data)| {
                RawImage::new(
                    page_index,
                    ImagePayload::Encoded {
                        format: "png".into(),
                        data: data.clone(),
                    },
                )
            })
            .collect();
        let uri = |data: &Vec<u8>| format!("data:image/png;base64,{}", STANDARD.encode(data));

        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: true,
                embed_images: true,
            },
        )
        .unwrap();

        assert_eq!(
            result.markdown,
            format!(
                "A\n\n![Image 1 from page 1]({})\n\n---\n\n\
                 B\n\n![Image 1 from page 2]({})\n\n![Image 2 from page 2]({})\n\n",
                uri(&payloads[1]),
                uri(&payloads[0]),
                uri(&payloads[2]),
            )
        );
        assert!(!result.markdown.ends_with("---\n\n"));
        assert_eq!(result.summary.images_embedded, 3);
    }

    #[test]
    fn failed_image_keeps_its_number_on_the_page() {
        let pages = vec![page(vec![block(vec![Span::plain("Text", 11.0)])])];
        let ok = || ImagePayload::Encoded {
            format: "png".into(),
            data: png_bytes(),
        };
        let images = vec![
            RawImage::new(0, ok()),
            RawImage::new(0, ImagePayload::Unavailable { detail: "bad".into() }),
            RawImage::new(0, ok()),
        ];

        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: true,
                embed_images: true,
            },
        )
        .unwrap();

        assert!(result.markdown.contains("![Image 1 from page 1]("));
        assert!(!result.markdown.contains("![Image 2 from page 1]("));
        assert!(result.markdown.contains("![Image 3 from page 1]("));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn ignored_images_are_not_validated() {
        let pages = vec![page(vec![block(vec![Span::plain("Text", 11.0)])])];
        let images = vec![RawImage::new(
            5,
            ImagePayload::Encoded {
                format: "png".into(),
                data: png_bytes(),
            },
        )];

        let result = convert(&pages, Some(&images[..]), no_images()).unwrap();

        assert_eq!(result.markdown, "Text\n\n");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn embed_without_include_is_ignored() {
        let pages = vec![page(vec![block(vec![Span::plain("Text", 11.0)])])];
        let images = vec![RawImage::new(
            0,
            ImagePayload::Encoded {
                format: "png".into(),
                data: png_bytes(),
            },
        )];
        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: false,
                embed_images: true,
            },
        )
        .unwrap();
        assert_eq!(result.markdown, "Text\n\n");
        assert!(!result.markdown.contains("data:"));
        assert!(result.images.is_empty());
    }

    #[test]
    fn failed_image_is_omitted_with_warning() {
        let pages = vec![page(vec![block(vec![Span::plain("Text", 11.0)])])];
        let images = vec![
            RawImage::new(
                0,
                ImagePayload::Unavailable {
                    detail: "broken stream".into(),
                },
            ),
            RawImage::new(
                0,
                ImagePayload::Encoded {
                    format: "png".into(),
                    data: png_bytes(),
                },
            ),
        ];
        let result = convert(
            &pages,
            Some(&images[..]),
            FormatOptions {
                include_images: true,
                embed_images: false,
            },
        )
        .unwrap();
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.images[0].index, 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            result.warnings[0],
            ImageEncodingError::Unavailable { index: 0, page: 1, .. }
        ));
        assert_eq!(result.markdown, "Text\n\n");
    }

    #[test]
    fn classify_empty_block_is_paragraph() {
        let formatter = MarkdownFormatter::default();
        assert_eq!(formatter.classify(&Block::default()), None);
    }
}
