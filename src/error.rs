//! Error types for the edgequake-md2pdf library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`Md2PdfError`]: everything the session controller and the one-shot
//!   `convert*` helpers can return: undecodable uploads, unsupported file
//!   types, operations invoked in the wrong state, and render failures.
//!   [`Md2PdfError::user_message`] turns any of them into the short notice a
//!   form shows to the user.
//!
//! * [`RenderError`]: why a rendering engine did not produce a PDF. Wrapped
//!   by [`Md2PdfError::Render`] so callers can still match on the engine-level
//!   cause (missing executable, non-zero exit, timeout…).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded bytes are not valid UTF-8 text.
    #[error(
        "'{name}' is not valid UTF-8 text (first invalid byte at offset {valid_up_to}).\n\
Save the file as UTF-8 and upload it again."
    )]
    Decode { name: String, valid_up_to: usize },

    /// A file that is not Markdown reached the controller.
    #[error("'{name}' is not a Markdown file (expected a .md or .markdown extension)")]
    UnsupportedInput { name: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// An operation was requested in a state where it has no meaning.
    #[error("Cannot {operation} while the session is in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The rendering engine could not produce a PDF.
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the Markdown source file.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Md2PdfError {
    /// Short, single-line text suitable for showing in the form.
    ///
    /// Engine stderr and multi-line hints are left to the logs.
    pub fn user_message(&self) -> String {
        match self {
            Md2PdfError::Decode { name, .. } => {
                format!("Could not read '{name}': the file is not valid UTF-8 text.")
            }
            Md2PdfError::UnsupportedInput { name } => {
                format!("'{name}' is not a Markdown file. Upload a .md file.")
            }
            Md2PdfError::InvalidTransition { operation, .. } => match *operation {
                "convert" => "Upload a Markdown file before converting.".to_string(),
                "convert again" => "There is no PDF to discard yet.".to_string(),
                other => format!("Cannot {other} right now."),
            },
            Md2PdfError::Render(e) => format!("PDF rendering failed: {}", e.summary()),
            other => other.to_string(),
        }
    }

    /// `true` when the user can simply press "Convert" again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Md2PdfError::Render(RenderError::Timeout { .. })
                | Md2PdfError::Render(RenderError::EngineFailed { .. })
                | Md2PdfError::Render(RenderError::Io { .. })
        )
    }
}

/// Why a rendering engine did not produce a PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable external engine executable.
    #[error("PDF engine unavailable: {0}")]
    EngineNotFound(#[from] pdf_engine_locate::LocateError),

    /// The engine process ran but exited unsuccessfully.
    #[error("{engine} exited with {status}:\n{stderr}")]
    EngineFailed {
        engine: String,
        status: String,
        stderr: String,
    },

    /// The engine did not finish within its timeout and was killed.
    #[error("{engine} did not finish within {secs}s and was stopped.\nIncrease --engine-timeout.")]
    Timeout { engine: String, secs: u64 },

    /// Working-file I/O around the engine call failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The in-process engine rejected the document.
    #[error("Built-in engine failed to lay out the document: {0}")]
    Layout(String),

    /// The engine returned bytes that do not start with the PDF signature.
    #[error("{engine} produced {len} bytes that are not a PDF (starts with {head:?})")]
    NotAPdf {
        engine: String,
        len: usize,
        head: String,
    },
}

impl RenderError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RenderError::Io {
            context: context.into(),
            source,
        }
    }

    /// One line describing the failure, without engine stderr.
    pub fn summary(&self) -> String {
        match self {
            RenderError::EngineNotFound(_) => "no PDF engine is installed".to_string(),
            RenderError::EngineFailed { engine, status, .. } => {
                format!("{engine} exited with {status}")
            }
            RenderError::Timeout { engine, secs } => format!("{engine} timed out after {secs}s"),
            RenderError::Io { context, .. } => context.clone(),
            RenderError::Layout(detail) => detail.lines().next().unwrap_or_default().to_string(),
            RenderError::NotAPdf { engine, .. } => format!("{engine} did not return a PDF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_display_names_file_and_offset() {
        let e = Md2PdfError::Decode {
            name: "notes.md".into(),
            valid_up_to: 17,
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.md"), "got: {msg}");
        assert!(msg.contains("17"), "got: {msg}");
    }

    #[test]
    fn user_message_is_single_line() {
        let e = Md2PdfError::Render(RenderError::EngineFailed {
            engine: "weasyprint".into(),
            status: "exit status: 1".into(),
            stderr: "line one\nline two".into(),
        });
        let msg = e.user_message();
        assert!(!msg.contains('\n'), "got: {msg}");
        assert!(msg.contains("weasyprint"), "got: {msg}");
    }

    #[test]
    fn convert_without_document_message() {
        let e = Md2PdfError::InvalidTransition {
            operation: "convert",
            state: "NoDocument",
        };
        assert!(e.user_message().contains("Upload"));
        assert!(e.to_string().contains("NoDocument"));
    }

    #[test]
    fn timeout_is_retryable_decode_is_not() {
        let timeout = Md2PdfError::Render(RenderError::Timeout {
            engine: "chromium".into(),
            secs: 5,
        });
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("5s"));

        let decode = Md2PdfError::Decode {
            name: "a.md".into(),
            valid_up_to: 0,
        };
        assert!(!decode.is_retryable());
    }

    #[test]
    fn layout_summary_keeps_first_line() {
        let e = RenderError::Layout("bad table\nat row 3".into());
        assert_eq!(e.summary(), "bad table");
    }
}
