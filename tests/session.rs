//! Session controller scenarios, driven through the public API with a stub
//! renderer so they run without any PDF engine installed.

use edgequake_md2pdf::{
    ConversionConfig, HtmlDocument, Md2PdfError, Pipeline, RenderError, Renderer,
    SessionController, UploadOutcome, UploadedDocument, ViewState,
};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Deterministic "PDF": the signature followed by the HTML it was given.
#[derive(Default)]
struct EchoRenderer {
    rendered: Mutex<Vec<String>>,
}

impl Renderer for EchoRenderer {
    fn name(&self) -> &str {
        "echo"
    }

    fn render(&self, document: &HtmlDocument) -> Result<Vec<u8>, RenderError> {
        self.rendered
            .lock()
            .unwrap()
            .push(document.as_str().to_string());
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend_from_slice(document.as_str().as_bytes());
        Ok(pdf)
    }
}

fn session() -> (SessionController, Arc<EchoRenderer>) {
    let renderer = Arc::new(EchoRenderer::default());
    let pipeline = Pipeline::with_renderer(&ConversionConfig::default(), renderer.clone());
    (SessionController::new(pipeline), renderer)
}

fn doc(name: &str, text: &str) -> UploadedDocument {
    UploadedDocument::new(name, text.as_bytes())
}

fn pdf_text(session: &SessionController) -> String {
    let artifact = session.current_artifact().expect("artifact");
    String::from_utf8_lossy(&artifact.bytes).into_owned()
}

// ── Upload ───────────────────────────────────────────────────────────────────

#[test]
fn same_upload_twice_is_a_no_op() {
    let (mut s, _) = session();
    assert_eq!(s.on_upload(doc("a.md", "# A")).unwrap(), UploadOutcome::Adopted);
    s.on_convert_requested().unwrap();
    let before = s.current_artifact().cloned();

    assert_eq!(s.on_upload(doc("a.md", "# A")).unwrap(), UploadOutcome::Unchanged);
    assert_eq!(s.state(), ViewState::ArtifactReady);
    assert_eq!(s.current_artifact().cloned(), before);
}

#[test]
fn same_name_with_new_content_replaces_document() {
    let (mut s, _) = session();
    s.on_upload(doc("notes.md", "# OldDraft")).unwrap();
    s.on_convert_requested().unwrap();
    assert!(pdf_text(&s).contains("OldDraft"));

    let outcome = s.on_upload(doc("notes.md", "# EditedVersion")).unwrap();
    assert_eq!(outcome, UploadOutcome::Adopted);
    assert_eq!(s.state(), ViewState::DocumentReady);
    assert!(s.current_artifact().is_none());
    assert_eq!(s.document().unwrap().bytes(), b"# EditedVersion");

    s.on_convert_requested().unwrap();
    let text = pdf_text(&s);
    assert!(text.contains("EditedVersion"));
    assert!(!text.contains("OldDraft"));
}

#[test]
fn different_upload_discards_artifact() {
    let (mut s, _) = session();
    s.on_upload(doc("a.md", "# A")).unwrap();
    s.on_convert_requested().unwrap();
    assert!(s.has_artifact());

    assert_eq!(s.on_upload(doc("b.md", "# B")).unwrap(), UploadOutcome::Adopted);
    assert_eq!(s.state(), ViewState::DocumentReady);
    assert!(!s.has_artifact());
    assert!(s.current_artifact().is_none());
    assert_eq!(s.document().unwrap().name(), "b.md");
}

#[test]
fn non_markdown_upload_is_rejected_before_conversion() {
    let (mut s, renderer) = session();
    let err = s.on_upload(doc("report.docx", "binary")).unwrap_err();
    assert!(matches!(err, Md2PdfError::UnsupportedInput { .. }));
    assert_eq!(s.state(), ViewState::NoDocument);
    assert!(renderer.rendered.lock().unwrap().is_empty());
}

// ── Convert ──────────────────────────────────────────────────────────────────

#[test]
fn convert_with_no_document_is_rejected() {
    let (mut s, renderer) = session();
    let err = s.on_convert_requested().unwrap_err();
    assert!(matches!(err, Md2PdfError::InvalidTransition { .. }));
    assert_eq!(s.state(), ViewState::NoDocument);
    assert!(!s.has_artifact());
    assert!(renderer.rendered.lock().unwrap().is_empty());
}

#[test]
fn upload_then_convert_yields_pdf() {
    let (mut s, _) = session();
    s.on_upload(doc("hello.md", "# Title\n\nHello **world**")).unwrap();
    s.on_convert_requested().unwrap();

    assert_eq!(s.state(), ViewState::ArtifactReady);
    let artifact = s.current_artifact().unwrap();
    assert!(artifact.bytes.starts_with(b"%PDF-"));
    assert_eq!(artifact.filename, "converted.pdf");
    assert_eq!(artifact.media_type, "application/pdf");
    assert!(pdf_text(&s).contains("<strong>world</strong>"));
}

#[test]
fn invalid_utf8_fails_with_decode_error() {
    let (mut s, renderer) = session();
    s.on_upload(UploadedDocument::new("bad.md", vec![b'#', b' ', 0xC3, 0x28]))
        .unwrap();

    let err = s.on_convert_requested().unwrap_err();
    assert!(matches!(err, Md2PdfError::Decode { valid_up_to: 2, .. }));
    assert_eq!(s.state(), ViewState::DocumentReady);
    assert!(s.current_artifact().is_none());
    assert!(renderer.rendered.lock().unwrap().is_empty());
    assert!(s.notice().unwrap().message.contains("UTF-8"));
}

#[test]
fn upload_convert_upload_leaves_old_pdf_inaccessible() {
    let (mut s, _) = session();
    s.on_upload(doc("a.md", "# Alpha")).unwrap();
    s.on_convert_requested().unwrap();
    assert!(pdf_text(&s).contains("Alpha"));

    s.on_upload(doc("b.md", "# Beta")).unwrap();
    assert_eq!(s.state(), ViewState::DocumentReady);
    assert!(s.current_artifact().is_none());

    s.on_convert_requested().unwrap();
    let text = pdf_text(&s);
    assert!(text.contains("Beta"));
    assert!(!text.contains("Alpha"));
}

// ── Convert again ────────────────────────────────────────────────────────────

#[test]
fn convert_again_then_convert_reproduces_same_content() {
    let (mut s, renderer) = session();
    s.on_upload(doc("a.md", "# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n"))
        .unwrap();
    s.on_convert_requested().unwrap();
    let first = s.current_artifact().unwrap().bytes.clone();

    s.on_convert_again_requested().unwrap();
    assert_eq!(s.state(), ViewState::DocumentReady);
    assert!(s.current_artifact().is_none());

    s.on_convert_requested().unwrap();
    assert_eq!(s.current_artifact().unwrap().bytes, first);
    assert_eq!(renderer.rendered.lock().unwrap().len(), 2);
}

#[test]
fn convert_again_without_artifact_is_rejected() {
    let (mut s, _) = session();
    s.on_upload(doc("a.md", "# A")).unwrap();
    let err = s.on_convert_again_requested().unwrap_err();
    assert!(matches!(
        err,
        Md2PdfError::InvalidTransition {
            operation: "convert again",
            state: "DocumentReady"
        }
    ));
    assert_eq!(s.state(), ViewState::DocumentReady);
}

// ── Clear ────────────────────────────────────────────────────────────────────

#[test]
fn clear_is_valid_in_every_state() {
    let (mut s, _) = session();
    s.on_upload_cleared();
    assert_eq!(s.state(), ViewState::NoDocument);

    s.on_upload(doc("a.md", "# A")).unwrap();
    s.on_upload_cleared();
    assert_eq!(s.state(), ViewState::NoDocument);

    s.on_upload(doc("a.md", "# A")).unwrap();
    s.on_convert_requested().unwrap();
    s.on_upload_cleared();
    assert_eq!(s.state(), ViewState::NoDocument);
    assert!(s.document().is_none());
    assert!(s.current_artifact().is_none());
}

#[test]
fn has_artifact_matches_current_artifact_throughout() {
    let (mut s, _) = session();
    let check = |s: &SessionController| {
        assert_eq!(s.has_artifact(), s.current_artifact().is_some());
        assert_eq!(s.has_artifact(), s.state() == ViewState::ArtifactReady);
    };

    check(&s);
    s.on_upload(doc("a.md", "# A")).unwrap();
    check(&s);
    s.on_convert_requested().unwrap();
    check(&s);
    let _ = s.on_convert_requested();
    check(&s);
    s.on_convert_again_requested().unwrap();
    check(&s);
    s.on_upload(doc("b.md", "# B")).unwrap();
    check(&s);
    s.on_upload_cleared();
    check(&s);
}
