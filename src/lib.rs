//! # edgequake-md2pdf
//!
//! Convert uploaded Markdown documents to downloadable PDFs behind a small
//! session-based form.
//!
//! ## Why a session controller?
//!
//! The conversion itself is glue: Markdown to HTML, HTML to PDF. What needs
//! care is deciding, per session, which control the user sees next (upload
//! prompt, "Convert" button, or download button) so that a finished PDF is
//! never silently recomputed, and never outlives the document it came from.
//! [`SessionController`] owns that decision.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploaded bytes
//!  │
//!  ├─ 1. Decode    strict UTF-8, BOM + line-ending cleanup
//!  ├─ 2. Markdown  pulldown-cmark: tables, footnotes, anchors, [TOC], syntect
//!  ├─ 3. Template  complete HTML document with @page size and margins
//!  ├─ 4. Render    printpdf in-process, or WeasyPrint / wkhtmltopdf / Chromium
//!  └─ 5. Artifact  converted.pdf, application/pdf, plus stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{ConversionConfig, SessionController, UploadedDocument};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let mut session = SessionController::from_config(&config)?;
//!
//!     session.on_upload(UploadedDocument::new("notes.md", "# Notes\n\nHello"))?;
//!     session.on_convert_requested()?;
//!
//!     if let Some(pdf) = session.current_artifact() {
//!         std::fs::write(&pdf.filename, &pdf.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `builtin-engine` | on | In-process PDF layout with `printpdf` |
//! | `form`  | on (via `cli`) | The axum web form in [`form`] |
//! | `cli`   | on      | Enables the `md2pdf-form` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable the defaults when using only the library with an external engine:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing an Engine
//!
//! | Engine | Install | Notes |
//! |--------|---------|-------|
//! | `builtin` | nothing | Basic CSS support |
//! | `weasyprint` | `pip install weasyprint` | Most faithful `@page` handling |
//! | `wkhtmltopdf` | system package | Qt WebKit layout |
//! | `chromium` | any Chrome/Chromium/Edge | Modern CSS, heavier startup |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
#[cfg(feature = "form")]
pub mod form;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ConversionArtifact, ConversionStats, ARTIFACT_FILENAME, ARTIFACT_MEDIA_TYPE};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, EngineChoice, MarkdownOptions, PageSize,
    StyleProfile,
};
pub use convert::{convert_bytes, convert_file, convert_to_file, Pipeline};
pub use error::{Md2PdfError, RenderError};
pub use pdf_engine_locate::EngineKind;
pub use pipeline::markdown::{CmarkTransform, HtmlFragment, MarkdownTransform};
#[cfg(feature = "builtin-engine")]
pub use pipeline::render::PrintPdfRenderer;
pub use pipeline::render::{CommandRenderer, Renderer};
pub use pipeline::template::{HtmlDocument, HtmlTemplate, TemplateSlots};
pub use progress::{ConversionObserver, NoopObserver, Observer, WorkingFlag};
pub use session::{
    Notice, NoticeLevel, SessionController, SessionView, UploadOutcome, UploadedDocument,
    ViewState,
};
