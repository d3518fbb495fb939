//! Streaming batch API: emit documents as they complete.
//!
//! ## Why stream?
//!
//! Converting a folder of PDFs can take a while. A stream-based API lets
//! callers show results immediately, wire up progress bars, or write each
//! document to disk as soon as it is ready instead of buffering the batch.
//!
//! Up to `config.concurrency` documents are in flight at once, so results
//! arrive in completion order. Each item carries its input position; use
//! [`convert_many`] when input order matters.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::error::Pdf2MdError;
use crate::output::ConversionOutput;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{debug, info};

/// Outcome for one input of a batch.
#[derive(Debug)]
pub struct DocumentResult {
    /// Position of the input in the batch (0-based).
    pub index: usize,
    /// The path or URL as given.
    pub input: String,
    /// A failed document never aborts the rest of the batch.
    pub result: Result<ConversionOutput, Pdf2MdError>,
}

/// A boxed stream of per-document results.
pub type DocumentStream = Pin<Box<dyn Stream<Item = DocumentResult> + Send>>;

/// Convert several PDFs, streaming each result as it is ready.
///
/// # Example
/// ```rust,no_run
/// use pdftext2md::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = ConversionConfig::default();
/// let mut stream = convert_stream(vec!["a.pdf".into(), "b.pdf".into()], &config);
/// while let Some(doc) = stream.next().await {
///     match doc.result {
///         Ok(out) => println!("{}: {} chars", doc.input, out.markdown().len()),
///         Err(e) => eprintln!("{}: {e}", doc.input),
///     }
/// }
/// # }
/// ```
pub fn convert_stream(inputs: Vec<String>, config: &ConversionConfig) -> DocumentStream {
    let concurrency = config.concurrency.max(1);
    let config = config.clone();
    info!(
        "Starting batch conversion: {} inputs, concurrency {}",
        inputs.len(),
        concurrency
    );

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input)| {
        let cfg = config.clone();
        async move {
            let result = convert(&input, &cfg).await;
            debug!("Finished {} (ok={})", input, result.is_ok());
            DocumentResult {
                index,
                input,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Convert several PDFs and return the results in input order.
pub async fn convert_many(inputs: Vec<String>, config: &ConversionConfig) -> Vec<DocumentResult> {
    let mut results: Vec<DocumentResult> = convert_stream(inputs, config).collect().await;
    results.sort_by_key(|r| r.index);
    results
}
