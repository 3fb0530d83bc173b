//! The session conversion controller.
//!
//! One [`SessionController`] holds everything a single user session knows:
//! the uploaded Markdown document, the PDF produced from it (if any), the last
//! notice to show, and whether a conversion is running. It decides which form
//! affordance a host should offer next:
//!
//! | State | Offer |
//! |-------|-------|
//! | [`ViewState::NoDocument`] | upload prompt |
//! | [`ViewState::DocumentReady`] | "Convert to PDF" button |
//! | [`ViewState::ArtifactReady`] | download button + "Convert again" |
//!
//! ## Transitions
//!
//! ```text
//!               upload(A)                convert ok
//! NoDocument ─────────────▶ DocumentReady ──────────▶ ArtifactReady
//!     ▲                       │   ▲   ▲                 │      │
//!     │        clear          │   │   └── convert again ┘      │
//!     └───────────────────────┘   └──── upload(B ≠ A) ─────────┘
//! ```
//!
//! Re-presenting the current document (same name, same bytes) is a no-op, so
//! a host that re-submits the same upload on every page load never discards a
//! finished PDF. An edited file under the same name replaces the document. A failed conversion leaves the session in `DocumentReady`.
//!
//! The artifact lives inside the `ArtifactReady` variant, so "has an
//! artifact" and "is in `ArtifactReady`" cannot disagree.

use crate::artifact::ConversionArtifact;
use crate::config::ConversionConfig;
use crate::convert::Pipeline;
use crate::error::Md2PdfError;
use crate::progress::{Observer, WorkingFlag};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// File extensions accepted as Markdown (compared case-insensitively).
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Appended to the error notice when pressing "Convert" again may succeed.
const RETRY_HINT: &str = " Press \"Convert to PDF\" to try again.";

/// A Markdown file received from the upload control.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    name: String,
    bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// The uploaded filename; also the document's identity within a session.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `true` when the filename carries a Markdown extension.
    pub fn is_markdown(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                MARKDOWN_EXTENSIONS
                    .iter()
                    .any(|m| ext.eq_ignore_ascii_case(m))
            })
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Which affordance the session currently offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewState {
    NoDocument,
    DocumentReady,
    ArtifactReady,
}

impl ViewState {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewState::NoDocument => "NoDocument",
            ViewState::DocumentReady => "DocumentReady",
            ViewState::ArtifactReady => "ArtifactReady",
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A message for the user about the last operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What [`SessionController::on_upload`] did with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A different document was adopted; any previous PDF was discarded.
    Adopted,
    /// Same name and content as the current document; nothing changed.
    Unchanged,
}

/// Serialisable snapshot of a session for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub state: ViewState,
    pub has_artifact: bool,
    pub document_name: Option<String>,
    pub document_bytes: Option<usize>,
    pub artifact_filename: Option<String>,
    pub artifact_bytes: Option<usize>,
    pub converting: bool,
    pub notice: Option<Notice>,
}

#[derive(Default)]
enum State {
    #[default]
    NoDocument,
    DocumentReady(UploadedDocument),
    ArtifactReady {
        document: UploadedDocument,
        artifact: ConversionArtifact,
    },
}

impl State {
    fn view(&self) -> ViewState {
        match self {
            State::NoDocument => ViewState::NoDocument,
            State::DocumentReady(_) => ViewState::DocumentReady,
            State::ArtifactReady { .. } => ViewState::ArtifactReady,
        }
    }

    fn document(&self) -> Option<&UploadedDocument> {
        match self {
            State::NoDocument => None,
            State::DocumentReady(document) | State::ArtifactReady { document, .. } => {
                Some(document)
            }
        }
    }
}

/// Per-session view-state machine in front of the conversion [`Pipeline`].
pub struct SessionController {
    pipeline: Pipeline,
    state: State,
    notice: Option<Notice>,
    working: WorkingFlag,
    observers: Vec<Observer>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state.view())
            .field("document", &self.state.document())
            .field("notice", &self.notice)
            .field("converting", &self.working.is_set())
            .finish()
    }
}

impl SessionController {
    /// A fresh session in [`ViewState::NoDocument`].
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            state: State::NoDocument,
            notice: None,
            working: WorkingFlag::new(),
            observers: Vec::new(),
        }
    }

    /// A fresh session whose pipeline is built from `config`.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        Ok(Self::new(Pipeline::from_config(config)?))
    }

    pub fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// A document arrived from the upload control.
    ///
    /// A document that differs from the current one (by name or by content)
    /// resets the session to `DocumentReady`, discarding any PDF. Re-presenting
    /// the identical document is a no-op. Non-Markdown names are rejected with
    /// [`Md2PdfError::UnsupportedInput`] and change nothing.
    pub fn on_upload(&mut self, document: UploadedDocument) -> Result<UploadOutcome, Md2PdfError> {
        if !document.is_markdown() {
            let err = Md2PdfError::UnsupportedInput {
                name: document.name().to_string(),
            };
            return Err(self.fail(err));
        }

        if let Some(current) = self.state.document() {
            if current.name() == document.name() && current.bytes() == document.bytes() {
                debug!("Upload of '{}' matches the current document; ignoring", document.name());
                return Ok(UploadOutcome::Unchanged);
            }
        }

        if matches!(self.state, State::ArtifactReady { .. }) {
            debug!("Discarding PDF of previous document");
        }
        info!("Document '{}' uploaded ({} bytes)", document.name(), document.len());
        self.notice = Some(Notice::info(format!(
            "'{}' uploaded successfully.",
            document.name()
        )));
        self.state = State::DocumentReady(document);
        Ok(UploadOutcome::Adopted)
    }

    /// The user pressed "Convert to PDF".
    ///
    /// Runs the pipeline synchronously on the current document. On success
    /// the session moves to `ArtifactReady`; on failure it stays in
    /// `DocumentReady` and the error is returned and recorded as a notice.
    /// Outside `DocumentReady` the request is rejected with
    /// [`Md2PdfError::InvalidTransition`].
    pub fn on_convert_requested(&mut self) -> Result<(), Md2PdfError> {
        let document = match &self.state {
            State::DocumentReady(document) => document,
            _ => return Err(self.reject("convert")),
        };
        let name = document.name().to_string();

        let working = self.working.clone();
        let _guard = working.raise();
        for o in &self.observers {
            o.on_convert_start(&name, document.len());
        }

        match self.pipeline.convert(&name, document.bytes()) {
            Ok(artifact) => {
                for o in &self.observers {
                    o.on_convert_complete(&name, &artifact.stats);
                }
                self.state = match std::mem::take(&mut self.state) {
                    State::DocumentReady(document) => State::ArtifactReady { document, artifact },
                    other => other,
                };
                self.notice = Some(Notice::success("PDF created successfully!"));
                Ok(())
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Conversion of '{}' failed: {}", name, e);
                for o in &self.observers {
                    o.on_convert_error(&name, &message);
                }
                self.notice = Some(Notice::error(message));
                Err(e)
            }
        }
    }

    /// The user pressed "Convert again": discard the PDF, keep the document.
    pub fn on_convert_again_requested(&mut self) -> Result<(), Md2PdfError> {
        if !matches!(self.state, State::ArtifactReady { .. }) {
            return Err(self.reject("convert again"));
        }
        self.state = match std::mem::take(&mut self.state) {
            State::ArtifactReady { document, .. } => {
                debug!("Discarded PDF for '{}'", document.name());
                State::DocumentReady(document)
            }
            other => other,
        };
        self.notice = None;
        Ok(())
    }

    /// The upload control was emptied. Valid in every state.
    pub fn on_upload_cleared(&mut self) {
        if let Some(document) = self.state.document() {
            info!("Document '{}' removed", document.name());
        }
        self.state = State::NoDocument;
        self.notice = None;
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// The PDF, present only in `ArtifactReady`.
    pub fn current_artifact(&self) -> Option<&ConversionArtifact> {
        match &self.state {
            State::ArtifactReady { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    pub fn has_artifact(&self) -> bool {
        self.current_artifact().is_some()
    }

    pub fn state(&self) -> ViewState {
        self.state.view()
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.state.document()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// `true` while [`Self::on_convert_requested`] is running.
    pub fn is_converting(&self) -> bool {
        self.working.is_set()
    }

    /// A handle to the working flag that stays readable while the session
    /// itself is busy converting.
    pub fn working_flag(&self) -> WorkingFlag {
        self.working.clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn view(&self) -> SessionView {
        let document = self.state.document();
        let artifact = self.current_artifact();
        SessionView {
            state: self.state(),
            has_artifact: artifact.is_some(),
            document_name: document.map(|d| d.name().to_string()),
            document_bytes: document.map(UploadedDocument::len),
            artifact_filename: artifact.map(|a| a.filename.clone()),
            artifact_bytes: artifact.map(ConversionArtifact::len),
            converting: self.is_converting(),
            notice: self.notice.clone(),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn reject(&mut self, operation: &'static str) -> Md2PdfError {
        let err = Md2PdfError::InvalidTransition {
            operation,
            state: self.state.view().as_str(),
        };
        warn!("{}", err);
        self.fail(err)
    }

    fn fail(&mut self, err: Md2PdfError) -> Md2PdfError {
        let mut message = err.user_message();
        if err.is_retryable() {
            message.push_str(RETRY_HINT);
        }
        self.notice = Some(Notice::error(message));
        err
    }
}
