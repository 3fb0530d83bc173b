//! Conversion orchestration: bytes in, [`ConversionArtifact`] out.
//!
//! [`Pipeline`] strings the four stages of [`crate::pipeline`] together and is
//! what a [`crate::SessionController`] calls when the user presses "Convert".
//! It is stateless between calls: nothing is cached and nothing is retried, so
//! converting the same bytes twice does the full work twice.
//!
//! The free functions at the bottom are one-shot helpers for callers that have
//! a file or a buffer and no session.

use crate::artifact::{ConversionArtifact, ConversionStats};
use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::pipeline::decode::decode_markdown;
use crate::pipeline::markdown::{CmarkTransform, MarkdownTransform};
use crate::pipeline::render::{renderer_from_config, Renderer};
use crate::pipeline::template::{HtmlDocument, HtmlTemplate, TemplateSlots};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The Markdown → HTML → PDF pipeline with its collaborators.
#[derive(Clone)]
pub struct Pipeline {
    transform: Arc<dyn MarkdownTransform>,
    template: HtmlTemplate,
    renderer: Arc<dyn Renderer>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("transform", &self.transform.name())
            .field("template", &self.template)
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        transform: Arc<dyn MarkdownTransform>,
        template: HtmlTemplate,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            transform,
            template,
            renderer,
        }
    }

    /// Build the pipeline described by `config`, resolving the rendering engine.
    ///
    /// # Errors
    /// [`Md2PdfError::Render`] when an external engine was requested but is
    /// not installed, [`Md2PdfError::InvalidConfig`] when the choice cannot be
    /// satisfied by this build.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        let renderer = renderer_from_config(config)?;
        Ok(Self::with_renderer(config, renderer))
    }

    /// Same as [`Pipeline::from_config`] but with a caller-supplied renderer.
    pub fn with_renderer(config: &ConversionConfig, renderer: Arc<dyn Renderer>) -> Self {
        let transform = CmarkTransform::new(config.markdown, config.highlight_theme.as_deref());
        Self::new(Arc::new(transform), HtmlTemplate::from_config(config), renderer)
    }

    /// Name of the engine that renders PDFs.
    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }

    /// Run steps (a) to (c): decode, transform and wrap, without rendering.
    pub fn to_html(&self, name: &str, bytes: &[u8]) -> Result<HtmlDocument, Md2PdfError> {
        let markdown = decode_markdown(name, bytes)?;
        Ok(self.wrap(name, &markdown))
    }

    /// Run the whole pipeline on one uploaded document.
    ///
    /// `name` is the uploaded filename. It appears in error messages and, when
    /// the document has no level-1 heading, becomes the PDF title.
    pub fn convert(&self, name: &str, bytes: &[u8]) -> Result<ConversionArtifact, Md2PdfError> {
        let total_start = Instant::now();
        info!("Converting '{}' ({} bytes) with {}", name, bytes.len(), self.renderer.name());

        // ── Step (a): Decode ─────────────────────────────────────────────────
        let markdown = decode_markdown(name, bytes)?;

        // ── Steps (b) + (c): Transform and wrap ─────────────────────────────
        let document = self.wrap(name, &markdown);
        debug!("HTML document is {} bytes", document.len());

        // ── Step (d): Render ─────────────────────────────────────────────────
        let render_start = Instant::now();
        let pdf = self.renderer.render(&document)?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        // ── Step (e): Package ────────────────────────────────────────────────
        let stats = ConversionStats {
            markdown_bytes: markdown.len(),
            html_bytes: document.len(),
            pdf_bytes: pdf.len(),
            engine: self.renderer.name().to_string(),
            render_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Converted '{}': {} byte PDF in {}ms (render {}ms)",
            name, stats.pdf_bytes, stats.total_duration_ms, stats.render_duration_ms
        );

        Ok(ConversionArtifact::new(pdf, name, stats))
    }

    fn wrap(&self, name: &str, markdown: &str) -> HtmlDocument {
        let fragment = self.transform.to_html(markdown);
        let title = fragment
            .title
            .clone()
            .unwrap_or_else(|| fallback_title(name));
        let stylesheet = self.transform.stylesheet();
        self.template.render(&TemplateSlots {
            title: &title,
            stylesheet: &stylesheet,
            content: &fragment.html,
        })
    }
}

/// Filename without directory or extension.
fn fallback_title(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Document")
        .to_string()
}

// ── One-shot helpers ─────────────────────────────────────────────────────────

/// Convert an in-memory Markdown document.
pub fn convert_bytes(
    name: &str,
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionArtifact, Md2PdfError> {
    Pipeline::from_config(config)?.convert(name, bytes)
}

/// Read a Markdown file and convert it.
pub fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionArtifact, Md2PdfError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Md2PdfError::InputReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    convert_bytes(&name, &bytes, config)
}

/// Convert a Markdown file and write the PDF next to wherever `output_path` says.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Md2PdfError> {
    let artifact = convert_file(input_path, config)?;
    let path = output_path.as_ref();
    let write_err = |e| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let tmp_path = path.with_extension("pdf.tmp");
    std::fs::write(&tmp_path, &artifact.bytes).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;

    Ok(artifact.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use std::sync::Mutex;

    /// Records every document it is asked to render.
    #[derive(Default)]
    struct CapturingRenderer {
        seen: Mutex<Vec<String>>,
    }

    impl Renderer for CapturingRenderer {
        fn name(&self) -> &str {
            "capture"
        }

        fn render(&self, document: &HtmlDocument) -> Result<Vec<u8>, RenderError> {
            self.seen.lock().unwrap().push(document.as_str().to_string());
            Ok(format!("%PDF-1.7\n{}", document.len()).into_bytes())
        }
    }

    fn pipeline() -> (Pipeline, Arc<CapturingRenderer>) {
        let renderer = Arc::new(CapturingRenderer::default());
        let p = Pipeline::with_renderer(&ConversionConfig::default(), renderer.clone());
        (p, renderer)
    }

    #[test]
    fn convert_fills_artifact_and_stats() {
        let (p, renderer) = pipeline();
        let a = p.convert("notes.md", b"# Title\n\nHello **world**").unwrap();
        assert!(a.bytes.starts_with(b"%PDF-"));
        assert_eq!(a.filename, "converted.pdf");
        assert_eq!(a.source_name, "notes.md");
        assert_eq!(a.stats.engine, "capture");
        assert_eq!(a.stats.markdown_bytes, 24);
        assert_eq!(a.stats.pdf_bytes, a.len());

        let seen = renderer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("<title>Title</title>"));
        assert!(seen[0].contains("<strong>world</strong>"));
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let (p, _) = pipeline();
        let html = p.to_html("dir/meeting-notes.md", b"no heading here").unwrap();
        assert!(html.as_str().contains("<title>meeting-notes</title>"));
    }

    #[test]
    fn decode_failure_skips_render() {
        let (p, renderer) = pipeline();
        let err = p.convert("bad.md", b"\xff\xfe").unwrap_err();
        assert!(matches!(err, Md2PdfError::Decode { .. }));
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn convert_file_reports_missing_input() {
        let err = convert_file("/no/such/file.md", &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, Md2PdfError::InputReadFailed { .. }));
    }

    #[cfg(feature = "builtin-engine")]
    #[test]
    fn convert_to_file_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "# Hello\n\nBody text.\n").unwrap();
        let output = dir.path().join("out/doc.pdf");

        let config = ConversionConfig::builder()
            .engine(crate::config::EngineChoice::Builtin)
            .build()
            .unwrap();
        let stats = convert_to_file(&input, &output, &config).unwrap();
        let written = std::fs::read(&output).unwrap();
        assert!(written.starts_with(b"%PDF-"));
        assert_eq!(stats.pdf_bytes, written.len());
        assert!(!output.with_extension("pdf.tmp").exists());
    }
}
