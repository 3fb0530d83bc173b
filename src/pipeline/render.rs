//! Step (d): render a complete HTML document to PDF bytes.
//!
//! Two kinds of [`Renderer`] are provided:
//!
//! * [`PrintPdfRenderer`] lays the document out in-process with `printpdf`
//!   (feature `builtin-engine`, on by default). No external tools needed.
//! * [`CommandRenderer`] hands the document to an installed engine
//!   (WeasyPrint, wkhtmltopdf or headless Chromium) as a subprocess.
//!
//! ## Working files
//!
//! External engines read and write files, so each [`CommandRenderer::render`]
//! call creates a private temporary directory holding `input.html` and
//! `output.pdf`. The directory is a [`tempfile::TempDir`]: it is removed when
//! the call returns, on success, on engine failure and on timeout alike.
//!
//! ## Why a timeout?
//!
//! Rendering is synchronous from the session's point of view. A wedged
//! headless browser would otherwise hold the session in "converting" forever,
//! so the subprocess is killed after [`ConversionConfig::engine_timeout_secs`].
//! On Unix the engine runs in its own process group and the whole group is
//! killed, since browsers fork helpers that outlive the parent otherwise.

use crate::artifact::PDF_SIGNATURE;
use crate::config::{ConversionConfig, EngineChoice, PageSize};
use crate::error::{Md2PdfError, RenderError};
use crate::pipeline::template::HtmlDocument;
use pdf_engine_locate::EngineKind;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Turns a complete HTML document into PDF bytes.
///
/// Implementations must be `Send + Sync`: the web form runs conversions on a
/// blocking worker thread while the renderer is shared through an `Arc`.
pub trait Renderer: Send + Sync {
    /// Short engine name, recorded in [`crate::ConversionStats::engine`].
    fn name(&self) -> &str;

    /// Render `document`. The returned bytes always start with `%PDF-`.
    fn render(&self, document: &HtmlDocument) -> Result<Vec<u8>, RenderError>;
}

/// Build the renderer selected by `config.engine`.
pub fn renderer_from_config(config: &ConversionConfig) -> Result<Arc<dyn Renderer>, Md2PdfError> {
    match config.engine {
        EngineChoice::Builtin => builtin_renderer(config),
        EngineChoice::External(kind) => {
            let program = match &config.engine_path {
                Some(path) => path.clone(),
                None => pdf_engine_locate::locate(kind).map_err(RenderError::from)?,
            };
            Ok(Arc::new(CommandRenderer::from_config(kind, program, config)))
        }
        EngineChoice::Auto => {
            if cfg!(feature = "builtin-engine") && config.engine_path.is_none() {
                return builtin_renderer(config);
            }
            if let Some(path) = &config.engine_path {
                let kind = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(EngineKind::from_name)
                    .ok_or_else(|| {
                        Md2PdfError::InvalidConfig(format!(
                            "Cannot tell which engine '{}' is; pass --engine explicitly",
                            path.display()
                        ))
                    })?;
                return Ok(Arc::new(CommandRenderer::from_config(kind, path.clone(), config)));
            }
            auto_detect(config)
        }
    }
}

fn auto_detect(config: &ConversionConfig) -> Result<Arc<dyn Renderer>, Md2PdfError> {
    if let Some(found) = pdf_engine_locate::detect_any() {
        info!("Auto-detected PDF engine {} at {}", found.kind, found.path.display());
        return Ok(Arc::new(CommandRenderer::from_config(found.kind, found.path, config)));
    }
    // Report the most preferred engine as the missing one.
    let first = EngineKind::PREFERENCE[0];
    match pdf_engine_locate::locate(first) {
        Ok(path) => Ok(Arc::new(CommandRenderer::from_config(first, path, config))),
        Err(e) => Err(RenderError::from(e).into()),
    }
}

#[cfg(feature = "builtin-engine")]
fn builtin_renderer(config: &ConversionConfig) -> Result<Arc<dyn Renderer>, Md2PdfError> {
    Ok(Arc::new(
        PrintPdfRenderer::new().with_page(config.page_size, config.margin_cm),
    ))
}

#[cfg(not(feature = "builtin-engine"))]
fn builtin_renderer(_config: &ConversionConfig) -> Result<Arc<dyn Renderer>, Md2PdfError> {
    Err(Md2PdfError::InvalidConfig(
        "The built-in engine is not compiled in; enable the `builtin-engine` feature".into(),
    ))
}

/// Reject output that is not a PDF byte stream.
pub(crate) fn ensure_pdf(engine: &str, bytes: Vec<u8>) -> Result<Vec<u8>, RenderError> {
    if bytes.starts_with(PDF_SIGNATURE) {
        return Ok(bytes);
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(16)]).into_owned();
    Err(RenderError::NotAPdf {
        engine: engine.to_string(),
        len: bytes.len(),
        head,
    })
}

// ── Built-in engine ──────────────────────────────────────────────────────────

/// In-process HTML layout with `printpdf`.
///
/// Supports the subset of CSS `printpdf` understands; fancy rules in the
/// stylesheet are ignored with a warning rather than failing the render.
/// The layout engine does not read `@page`, so the paper size goes in
/// through `GeneratePdfOptions` and the margin as a `body` rule.
#[cfg(feature = "builtin-engine")]
#[derive(Debug, Clone)]
pub struct PrintPdfRenderer {
    page_size: PageSize,
    margin_cm: f32,
}

#[cfg(feature = "builtin-engine")]
impl Default for PrintPdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "builtin-engine")]
impl PrintPdfRenderer {
    /// Letter paper, 1.5 cm margins.
    pub fn new() -> Self {
        Self {
            page_size: PageSize::Letter,
            margin_cm: 1.5,
        }
    }

    pub fn with_page(mut self, page_size: PageSize, margin_cm: f32) -> Self {
        self.page_size = page_size;
        self.margin_cm = margin_cm;
        self
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    fn with_body_margin(&self, html: &str) -> String {
        let rule = format!(
            "<style>body {{ margin: {}mm; }}</style>\n",
            self.margin_cm * 10.0
        );
        match html.find("</head>") {
            Some(at) => {
                let mut out = String::with_capacity(html.len() + rule.len());
                out.push_str(&html[..at]);
                out.push_str(&rule);
                out.push_str(&html[at..]);
                out
            }
            None => format!("{rule}{html}"),
        }
    }
}

#[cfg(feature = "builtin-engine")]
impl Renderer for PrintPdfRenderer {
    fn name(&self) -> &str {
        "builtin"
    }

    fn render(&self, document: &HtmlDocument) -> Result<Vec<u8>, RenderError> {
        use printpdf::{GeneratePdfOptions, PdfDocument, PdfSaveOptions};
        use std::collections::BTreeMap;

        let (width_mm, height_mm) = self.page_size.dimensions_mm();
        let options = GeneratePdfOptions {
            page_width: Some(width_mm),
            page_height: Some(height_mm),
            ..GeneratePdfOptions::default()
        };
        let html = self.with_body_margin(document.as_str());

        let mut warnings = Vec::new();
        let doc = PdfDocument::from_html(
            &html,
            &BTreeMap::new(),
            &BTreeMap::new(),
            &options,
            &mut warnings,
        )
        .map_err(|e| RenderError::Layout(format!("{e}")))?;
        if !warnings.is_empty() {
            debug!("printpdf reported {} layout warnings", warnings.len());
        }

        let mut save_warnings = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut save_warnings);
        ensure_pdf(self.name(), bytes)
    }
}

// ── External engines ─────────────────────────────────────────────────────────

const INPUT_FILE: &str = "input.html";
const OUTPUT_FILE: &str = "output.pdf";
const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_TAIL_LINES: usize = 20;

/// Runs an installed HTML-to-PDF engine as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    kind: EngineKind,
    program: PathBuf,
    page_size: PageSize,
    margin_cm: f32,
    timeout: Duration,
    engine_name: String,
}

impl CommandRenderer {
    /// A renderer for `kind` using the executable at `program`, with Letter
    /// paper, 1.5 cm margins and a 120 s timeout.
    pub fn new(kind: EngineKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
            page_size: PageSize::default(),
            margin_cm: 1.5,
            timeout: Duration::from_secs(120),
            engine_name: kind.to_string(),
        }
    }

    /// Locate `kind` on this host (honours `MD2PDF_ENGINE_PATH`).
    pub fn locate(kind: EngineKind) -> Result<Self, RenderError> {
        Ok(Self::new(kind, pdf_engine_locate::locate(kind)?))
    }

    fn from_config(kind: EngineKind, program: PathBuf, config: &ConversionConfig) -> Self {
        Self::new(kind, program)
            .with_page(config.page_size, config.margin_cm)
            .with_timeout(Duration::from_secs(config.engine_timeout_secs))
    }

    pub fn with_page(mut self, page_size: PageSize, margin_cm: f32) -> Self {
        self.page_size = page_size;
        self.margin_cm = margin_cm;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one run.
    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        match self.kind {
            EngineKind::WeasyPrint => vec![input.into(), output.into()],
            EngineKind::Wkhtmltopdf => {
                let margin = format!("{}mm", self.margin_cm * 10.0);
                let mut args: Vec<OsString> = vec![
                    "--quiet".into(),
                    "--encoding".into(),
                    "utf-8".into(),
                    "--page-size".into(),
                    self.page_size.wkhtmltopdf_name().into(),
                ];
                for side in ["--margin-top", "--margin-bottom", "--margin-left", "--margin-right"] {
                    args.push(side.into());
                    args.push(margin.clone().into());
                }
                args.push(input.into());
                args.push(output.into());
                args
            }
            EngineKind::Chromium => {
                let mut print_to = OsString::from("--print-to-pdf=");
                print_to.push(output);
                let mut url = OsString::from("file://");
                url.push(input);
                vec![
                    "--headless".into(),
                    "--disable-gpu".into(),
                    "--no-sandbox".into(),
                    "--no-pdf-header-footer".into(),
                    print_to,
                    url,
                ]
            }
        }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, RenderError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(
                        "{} exceeded {}s, killing pid {}",
                        self.engine_name,
                        self.timeout.as_secs(),
                        child.id()
                    );
                    kill_engine(child);
                    let _ = child.wait();
                    return Err(RenderError::Timeout {
                        engine: self.engine_name.clone(),
                        secs: self.timeout.as_secs(),
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(RenderError::io(format!("waiting for {}", self.engine_name), e)),
            }
        }
    }
}

impl Renderer for CommandRenderer {
    fn name(&self) -> &str {
        &self.engine_name
    }

    fn render(&self, document: &HtmlDocument) -> Result<Vec<u8>, RenderError> {
        let workdir = tempfile::Builder::new()
            .prefix("md2pdf-")
            .tempdir()
            .map_err(|e| RenderError::io("creating engine work directory", e))?;
        let input = workdir.path().join(INPUT_FILE);
        let output = workdir.path().join(OUTPUT_FILE);

        std::fs::write(&input, document.as_str())
            .map_err(|e| RenderError::io(format!("writing {}", input.display()), e))?;

        debug!(
            "Running {} ({}) in {}",
            self.engine_name,
            self.program.display(),
            workdir.path().display()
        );
        let mut command = Command::new(&self.program);
        command
            .args(self.args(&input, &output))
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| RenderError::io(format!("starting {}", self.program.display()), e))?;

        // Drain stderr concurrently so a chatty engine cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        // On timeout the reader is detached: a surviving grandchild may still
        // hold the pipe open, and joining would wait for it.
        let status = self.wait_with_timeout(&mut child)?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .map(|buf| stderr_tail(&buf))
            .unwrap_or_default();

        if !status.success() {
            return Err(RenderError::EngineFailed {
                engine: self.engine_name.clone(),
                status: status.to_string(),
                stderr,
            });
        }

        let bytes = std::fs::read(&output).map_err(|e| {
            RenderError::io(format!("{} produced no output file", self.engine_name), e)
        })?;
        let bytes = ensure_pdf(&self.engine_name, bytes)?;

        if let Err(e) = workdir.close() {
            warn!("Could not remove engine work directory: {e}");
        }
        Ok(bytes)
    }
}

/// Kill the engine and everything it spawned.
#[cfg(unix)]
fn kill_engine(child: &mut Child) {
    match i32::try_from(child.id()) {
        // SAFETY: kill(2) with a negative pid only sends a signal to the
        // process group the engine leads (set up by `process_group(0)`).
        Ok(pgid) if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 => {}
        _ => {
            let _ = child.kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_engine(child: &mut Child) {
    let _ = child.kill();
}

fn stderr_tail(buf: &[u8]) -> String {
    let text = String::from_utf8_lossy(buf);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
