//! Formatter behaviour through the public API. No pdfium required.

use pdftext2md::format::convert;
use pdftext2md::{
    convert_layout, Block, ConversionConfig, DocumentLayout, FormatOptions, HeadingThresholds,
    ImagePayload, MarkdownFormatter, Page, PageSeparator, Pdf2MdError, RawImage, Span,
};

fn para(text: &str) -> Block {
    Block::new(vec![Span::plain(text, 11.0)])
}

fn heading_level(line: &str) -> usize {
    line.chars().take_while(|&c| c == '#').count()
}

fn png_payload(data: &[u8]) -> ImagePayload {
    ImagePayload::Encoded {
        format: "png".into(),
        data: data.to_vec(),
    }
}

#[test]
fn block_order_is_preserved_across_pages() {
    let pages: Vec<Page> = (0..4)
        .map(|p| Page::new((0..5).map(|b| para(&format!("p{p}b{b}"))).collect()))
        .collect();

    let md = convert(&pages, None, FormatOptions::default()).unwrap().markdown;

    let mut last = 0;
    for p in 0..4 {
        for b in 0..5 {
            let pos = md.find(&format!("p{p}b{b}\n")).expect("every block rendered");
            assert!(pos >= last, "p{p}b{b} out of order");
            last = pos;
        }
    }
}

#[test]
fn heading_level_is_monotone_in_font_size() {
    let formatter = MarkdownFormatter::default();
    let mut previous_rank = 0;

    // Larger sizes must never produce a "smaller" heading rank.
    for tenth in 50..400 {
        let size = tenth as f32 / 10.0;
        let block = Block::new(vec![Span::plain("x", size)]);
        let rank = match formatter.classify(&block) {
            Some(level) => 4 - level as usize,
            None => 0,
        };
        assert!(rank >= previous_rank, "rank dropped at {size}pt");
        previous_rank = rank;
    }
    assert_eq!(previous_rank, 3);
}

#[test]
fn separator_count_is_pages_minus_one() {
    for n in 0usize..6 {
        let pages: Vec<Page> = (0..n).map(|i| Page::new(vec![para(&format!("page {i}"))])).collect();
        let md = convert(&pages, None, FormatOptions::default()).unwrap().markdown;
        assert_eq!(md.matches("---\n\n").count(), n.saturating_sub(1), "{n} pages");
    }
}

#[test]
fn custom_separator_and_empty_pages() {
    let formatter = MarkdownFormatter::new(
        HeadingThresholds::default(),
        PageSeparator::Custom("<br/>".into()),
    );
    let pages = vec![Page::new(vec![para("a")]), Page::new(vec![]), Page::new(vec![para("c")])];

    let md = formatter
        .convert(&pages, None, FormatOptions::default())
        .unwrap()
        .markdown;

    assert_eq!(md, "a\n\n<br/>\n\n<br/>\n\nc\n\n");
}

#[test]
fn whitespace_blocks_never_render() {
    let pages = vec![Page::new(vec![
        Block::new(vec![Span::plain("   ", 30.0).bold()]),
        Block::new(vec![]),
        para("kept"),
        Block::new(vec![Span::plain("\u{a0}", 11.0).italic()]),
    ])];

    let result = convert(&pages, None, FormatOptions::default()).unwrap();

    assert_eq!(result.markdown, "kept\n\n");
    assert_eq!(result.summary.blocks_emitted, 1);
    assert_eq!(result.summary.blocks_skipped, 3);
}

#[test]
fn every_line_is_a_heading_or_paragraph() {
    let pages = vec![Page::new(vec![
        Block::new(vec![Span::plain("Big", 26.0)]),
        Block::new(vec![Span::plain("Mid", 15.5)]),
        Block::new(vec![Span::plain("Small", 13.0)]),
        para("Body"),
    ])];

    let md = convert(&pages, None, FormatOptions::default()).unwrap().markdown;
    let levels: Vec<usize> = md
        .split("\n\n")
        .filter(|l| !l.is_empty())
        .map(heading_level)
        .collect();

    assert_eq!(levels, vec![1, 2, 3, 0]);
}

#[test]
fn listed_images_round_trip_their_bytes() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let payloads: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![9; 40], vec![0xFF, 0x00]];
    let images: Vec<RawImage> = payloads
        .iter()
        .enumerate()
        .map(|(i, data)| RawImage::new(i % 2, png_payload(data)))
        .collect();
    let pages = vec![Page::new(vec![para("one")]), Page::new(vec![para("two")])];
    let options = FormatOptions {
        include_images: true,
        embed_images: false,
    };

    let result = convert(&pages, Some(&images[..]), options).unwrap();

    assert_eq!(result.images.len(), 3);
    for (image, original) in result.images.iter().zip(&payloads) {
        assert_eq!(&STANDARD.decode(&image.base64).unwrap(), original);
        assert_eq!(image.format, "png");
    }
    assert_eq!(result.images[1].page, 2);
    assert!(!result.markdown.contains("data:"));
}

#[test]
fn images_are_ignored_unless_included() {
    let images = vec![RawImage::new(0, png_payload(&[1, 2, 3]))];
    let pages = vec![Page::new(vec![para("text")])];

    for embed in [false, true] {
        let options = FormatOptions {
            include_images: false,
            embed_images: embed,
        };
        let result = convert(&pages, Some(&images[..]), options).unwrap();
        assert_eq!(result.markdown, "text\n\n");
        assert!(result.images.is_empty());
        assert!(result.warnings.is_empty());
    }
}

#[test]
fn failed_images_keep_the_count_consistent() {
    let images = vec![
        RawImage::new(0, png_payload(&[1])),
        RawImage::new(0, png_payload(&[])),
        RawImage::new(
            0,
            ImagePayload::Unavailable {
                detail: "decoder error".into(),
            },
        ),
        RawImage::new(0, png_payload(&[2])),
    ];
    let pages = vec![Page::new(vec![para("text")])];
    let options = FormatOptions {
        include_images: true,
        embed_images: false,
    };

    let result = convert(&pages, Some(&images[..]), options).unwrap();

    assert_eq!(result.images.len() + result.warnings.len(), images.len());
    let indices: Vec<usize> = result.images.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![0, 3]);
    let failed: Vec<usize> = result.warnings.iter().map(|w| w.index()).collect();
    assert_eq!(failed, vec![1, 2]);
}

#[test]
fn layout_json_drives_convert_layout() {
    let json = r#"{
        "pages": [
            {"blocks": [
                {"spans": [{"text": "Intro", "font_size": 18.0, "is_bold": true}]},
                {"spans": [
                    {"text": "Plain and ", "font_size": 10.0},
                    {"text": "slanted", "font_size": 10.0, "is_italic": true}
                ]}
            ]},
            {"number": 7, "blocks": [{"spans": [{"text": "Later", "font_size": 10.0}]}]}
        ]
    }"#;

    let layout = DocumentLayout::from_json(json).unwrap();
    let config = ConversionConfig::builder()
        .page_separator(PageSeparator::Comment)
        .build()
        .unwrap();
    let output = convert_layout(&layout, &config).unwrap();

    assert_eq!(
        output.markdown(),
        "## **Intro**\n\nPlain and *slanted*\n\n<!-- page 7 -->\n\nLater\n\n"
    );
}

#[test]
fn layout_json_without_font_size_is_malformed() {
    let json = r#"{"pages": [{"blocks": [{"spans": [{"text": "oops"}]}]}]}"#;
    let err = DocumentLayout::from_json(json).unwrap_err();
    assert!(matches!(err, Pdf2MdError::MalformedInput { .. }), "got {err:?}");
}

#[test]
fn non_positive_font_size_is_malformed() {
    for bad in [0.0, -4.0, f32::NAN, f32::INFINITY] {
        let pages = vec![Page::new(vec![Block::new(vec![Span::plain("x", bad)])])];
        let err = convert(&pages, None, FormatOptions::default()).unwrap_err();
        assert!(matches!(err, Pdf2MdError::MalformedInput { .. }), "{bad}");
    }
}
