//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own. Formatting itself lives in [`crate::format`]
//! because it is usable without any of these stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (format) ──▶ encode
//! (bytes)   (pdfium)                 (base64)
//!             │
//!             └─ postprocess (span text cleanup)
//! ```
//!
//! 1. [`input`]   — read the local file or download the URL, check `%PDF`
//! 2. [`extract`] — walk page objects into spans, group spans into blocks;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`postprocess`] — fold stray line breaks and invisible characters out
//!    of each span's text before grouping
//! 4. [`encode`]  — turn image payloads into base64 for the formatter

pub mod encode;
pub mod extract;
pub mod input;
pub mod postprocess;
