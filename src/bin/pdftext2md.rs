//! CLI binary for pdftext2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdftext2md::{
    convert, convert_layout, convert_stream, inspect, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, DocumentLayout, HeadingThresholds, ImageEncodingError,
    PageSelection, PageSeparator, ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for a single document: a live page bar plus
/// one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    skipped_images: AtomicUsize,
}

impl CliProgressCallback {
    /// Bar length is set by `on_conversion_start` once the page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped_images: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, blocks: usize) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{blocks:>4} blocks")),
            dim(&format!("{}ms", elapsed_ms)),
        ));
        self.bar.inc(1);
    }

    fn on_image_skipped(&self, error: &ImageEncodingError) {
        self.skipped_images.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_conversion_complete(&self, total_pages: usize, images: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped_images.load(Ordering::SeqCst);

        if skipped == 0 {
            eprintln!(
                "{} {} pages converted, {} images",
                green("✔"),
                bold(&total_pages.to_string()),
                images
            );
        } else {
            eprintln!(
                "{} {} pages converted, {} images  ({} skipped)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                images,
                red(&skipped.to_string()),
            );
        }
    }
}

/// Document-level bar for batch runs.
fn batch_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("Converting");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  pdftext2md document.pdf

  # Convert to file
  pdftext2md document.pdf -o output.md

  # Specific pages, labelled page breaks
  pdftext2md --pages 1-5 --separator labeled paper.pdf -o paper.md

  # Inline images as data: URIs
  pdftext2md --include-images --embed-images report.pdf -o report.md

  # Images as base64 in JSON
  pdftext2md --include-images --json report.pdf > report.json

  # Convert from URL
  pdftext2md https://arxiv.org/pdf/1706.03762 -o attention.md

  # Batch conversion, four documents at a time
  pdftext2md -c 4 --output-dir out/ *.pdf

  # Format a pre-extracted layout (no pdfium needed)
  pdftext2md --layout layout.json

  # Inspect PDF metadata
  pdftext2md --inspect-only document.pdf

HEADINGS:
  A block whose largest font size is at least --h1 (default 20pt) becomes
  '#', at least --h2 (15pt) '##', at least --h3 (13pt) '###'. Smaller
  blocks are paragraphs. Thresholds must be strictly descending.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filter (e.g. pdftext2md=debug)
  PDFTEXT2MD_*            Every flag, e.g. PDFTEXT2MD_SEPARATOR=comment

SETUP:
  pdfium is loaded from PDFIUM_LIB_PATH, the working directory, or the
  system library path, in that order. Prebuilt binaries are published at
  https://github.com/bblanchon/pdfium-binaries.
"#;

/// Convert the text layer of PDF files and URLs to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "pdftext2md",
    version,
    about = "Convert the text layer of PDF files and URLs to Markdown",
    long_about = "Convert PDF documents (local files or URLs) to Markdown. Headings are inferred \
from font sizes, bold and italic fonts become emphasis, and embedded images can be returned \
as base64 or inlined as data: URIs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Treat inputs as layout JSON files instead of PDFs.
    #[arg(long, env = "PDFTEXT2MD_LAYOUT")]
    layout: bool,

    /// Write Markdown to this file instead of stdout (single input).
    #[arg(short, long, env = "PDFTEXT2MD_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write one file per input into this directory.
    #[arg(long, env = "PDFTEXT2MD_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Extract embedded images.
    #[arg(long, env = "PDFTEXT2MD_INCLUDE_IMAGES")]
    include_images: bool,

    /// Inline images as data: URIs after their page (needs --include-images).
    #[arg(long, env = "PDFTEXT2MD_EMBED_IMAGES")]
    embed_images: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFTEXT2MD_PAGES", default_value = "all")]
    pages: String,

    /// Page separator: hr, labeled, comment, or a custom string.
    #[arg(long, env = "PDFTEXT2MD_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Minimum font size for '#' headings.
    #[arg(long, env = "PDFTEXT2MD_H1", default_value_t = 20.0)]
    h1: f32,

    /// Minimum font size for '##' headings.
    #[arg(long, env = "PDFTEXT2MD_H2", default_value_t = 15.0)]
    h2: f32,

    /// Minimum font size for '###' headings.
    #[arg(long, env = "PDFTEXT2MD_H3", default_value_t = 13.0)]
    h3: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFTEXT2MD_PASSWORD")]
    password: Option<String>,

    /// Vertical gap (in font sizes) that still joins two lines into one block.
    #[arg(long, env = "PDFTEXT2MD_BLOCK_GAP", default_value_t = 1.5)]
    block_gap: f32,

    /// Prepend YAML front-matter with document metadata.
    #[arg(long, env = "PDFTEXT2MD_METADATA")]
    metadata: bool,

    /// Output structured JSON (markdown, images, warnings, stats).
    #[arg(long, env = "PDFTEXT2MD_JSON")]
    json: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Number of documents converted at once.
    #[arg(short, long, env = "PDFTEXT2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFTEXT2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "PDFTEXT2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTEXT2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTEXT2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.layout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return run_inspect(&cli).await;
    }

    if cli.inputs.len() > 1 && cli.output.is_some() {
        anyhow::bail!("-o/--output takes a single input; use --output-dir for batches");
    }
    if cli.inputs.len() > 1 && cli.output_dir.is_none() && !cli.json {
        anyhow::bail!("Converting several inputs needs --output-dir (or --json)");
    }
    if cli.include_images && !cli.embed_images && !cli.json && !cli.quiet {
        tracing::warn!("Listed images only appear in --json output; add --embed-images to inline them");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let single = cli.inputs.len() == 1;
    let progress_cb: Option<ProgressCallback> = if show_progress && single {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if cli.layout {
        run_layouts(&cli, &config).await
    } else if single {
        run_single(&cli, &config, show_progress).await
    } else {
        run_batch(&cli, &config, show_progress).await
    }
}

async fn run_inspect(cli: &Cli) -> Result<()> {
    for input in &cli.inputs {
        let meta = inspect(input)
            .await
            .with_context(|| format!("Failed to inspect {input}"))?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
            continue;
        }

        println!("File:         {}", input);
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        println!("Encrypted:    {}", meta.is_encrypted);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
    }
    Ok(())
}

async fn run_single(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let input = &cli.inputs[0];
    let output = convert(input, config)
        .await
        .with_context(|| format!("Conversion failed: {input}"))?;

    let destination = cli
        .output
        .clone()
        .or_else(|| cli.output_dir.as_ref().map(|dir| output_path_for(dir, input, cli.json)));

    match destination {
        Some(path) => {
            write_output(&path, &output, cli.json).await?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} pages  {} blocks  {}ms  →  {}",
                    green("✔"),
                    output.stats.processed_pages,
                    output.stats.blocks_emitted,
                    output.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            print_output(&output, cli.json)?;
            if !cli.quiet && !show_progress && !cli.json {
                eprintln!(
                    "Converted {} pages ({} headings, {} images) in {}ms",
                    output.stats.processed_pages,
                    output.stats.headings_emitted,
                    output.stats.images_extracted,
                    output.stats.total_duration_ms
                );
            }
        }
    }
    Ok(())
}

async fn run_batch(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let bar = show_progress.then(|| batch_bar(cli.inputs.len()));
    let mut stream = convert_stream(cli.inputs.clone(), config);
    let mut failures = 0usize;
    let mut json_results = Vec::new();

    while let Some(doc) = stream.next().await {
        let line = match doc.result {
            Ok(output) => {
                let summary = format!(
                    "  {} {}  {}",
                    green("✓"),
                    doc.input,
                    dim(&format!("{} pages", output.stats.processed_pages))
                );
                match cli.output_dir {
                    Some(ref dir) => {
                        let path = output_path_for(dir, &doc.input, cli.json);
                        write_output(&path, &output, cli.json).await?;
                    }
                    None => json_results.push((doc.index, doc.input.clone(), output)),
                }
                summary
            }
            Err(e) => {
                failures += 1;
                format!("  {} {}  {}", red("✗"), doc.input, red(&e.to_string()))
            }
        };

        match bar {
            Some(ref bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None if !cli.quiet => eprintln!("{line}"),
            None => {}
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if !json_results.is_empty() {
        json_results.sort_by_key(|(index, _, _)| *index);
        let values: Vec<serde_json::Value> = json_results
            .into_iter()
            .map(|(_, input, output)| {
                serde_json::json!({ "input": input, "output": output })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&values).context("Failed to serialise output")?
        );
    }

    if !cli.quiet {
        let ok = cli.inputs.len() - failures;
        eprintln!(
            "{} {}/{} documents converted",
            if failures == 0 { green("✔") } else { cyan("⚠") },
            bold(&ok.to_string()),
            cli.inputs.len()
        );
    }
    if failures > 0 {
        anyhow::bail!("{failures} document(s) failed");
    }
    Ok(())
}

async fn run_layouts(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    for input in &cli.inputs {
        let json = tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read layout {input}"))?;
        let layout = DocumentLayout::from_json(&json)
            .with_context(|| format!("Invalid layout {input}"))?;
        let output = convert_layout(&layout, config)
            .with_context(|| format!("Formatting failed: {input}"))?;

        let destination = cli
            .output
            .clone()
            .or_else(|| cli.output_dir.as_ref().map(|dir| output_path_for(dir, input, cli.json)));
        match destination {
            Some(path) => write_output(&path, &output, cli.json).await?,
            None => print_output(&output, cli.json)?,
        }
    }
    Ok(())
}

/// `<dir>/<input stem>.md` (or `.json`).
fn output_path_for(dir: &Path, input: &str, json: bool) -> PathBuf {
    let stem = input
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|name| Path::new(name).file_stem().unwrap_or_default().to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    dir.join(format!("{stem}.{}", if json { "json" } else { "md" }))
}

async fn write_output(path: &Path, output: &ConversionOutput, json: bool) -> Result<()> {
    let contents = if json {
        serde_json::to_string_pretty(output).context("Failed to serialise output")?
    } else {
        output.markdown().to_string()
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_output(output: &ConversionOutput, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        handle
            .write_all(output.markdown().as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown().ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages)?;
    let separator = parse_separator(&cli.separator);

    let mut builder = ConversionConfig::builder()
        .include_images(cli.include_images)
        .embed_images(cli.embed_images)
        .headings(HeadingThresholds::new(cli.h1, cli.h2, cli.h3))
        .page_separator(separator)
        .pages(pages)
        .include_metadata(cli.metadata)
        .block_gap_ratio(cli.block_gap)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "hr" | "---" => PageSeparator::HorizontalRule,
        "labeled" | "labelled" => PageSeparator::Labeled,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
