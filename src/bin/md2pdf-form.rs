//! Web form binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and `FormConfig`, then serves the upload form for a
//! single local session.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use edgequake_md2pdf::form::{self, FormConfig};
use edgequake_md2pdf::{
    ConversionConfig, ConversionObserver, ConversionStats, EngineChoice, PageSize,
    SessionController, StyleProfile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
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

// ── Console spinner driven by conversion events ─────────────────────────────

/// Shows a spinner on the server console while a conversion runs.
struct ConsoleSpinner {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSpinner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl ConversionObserver for ConsoleSpinner {
    fn on_convert_start(&self, name: &str, markdown_len: usize) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!("{name} {}", dim(&format!("({markdown_len} bytes)"))));
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_convert_complete(&self, name: &str, stats: &ConversionStats) {
        self.finish();
        eprintln!(
            "{} {} → converted.pdf  {}",
            green("✔"),
            bold(name),
            dim(&format!(
                "{} bytes, {} engine, {:.1}s",
                stats.pdf_bytes,
                stats.engine,
                stats.total_duration_ms as f64 / 1000.0
            ))
        );
    }

    fn on_convert_error(&self, name: &str, error: &str) {
        self.finish();
        eprintln!("{} {}  {}", red("✘"), bold(name), red(error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the form on http://127.0.0.1:8501
  md2pdf-form

  # A4 paper with 2 cm margins, rendered by WeasyPrint
  md2pdf-form --page-size a4 --margin-cm 2 --engine weasyprint

  # Headless Chromium at a custom location, listening on all interfaces
  md2pdf-form --engine chromium --engine-path /opt/chrome/chrome --bind 0.0.0.0:8080

ENGINES:
  builtin      In-process layout (default when compiled with `builtin-engine`)
  weasyprint   Best @page support; `pip install weasyprint`
  wkhtmltopdf  Qt WebKit based
  chromium     Any Chromium/Chrome/Edge binary, run headless
  auto         Built-in engine if compiled in, else the first external engine found

ENVIRONMENT VARIABLES:
  MD2PDF_ENGINE_PATH   Path to the external engine executable
  RUST_LOG             Override the log filter (e.g. edgequake_md2pdf=debug)
"#;

/// Serve a Markdown → PDF upload form.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf-form",
    version,
    about = "Serve a local web form that converts uploaded Markdown files to PDF",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "MD2PDF_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// PDF engine: auto, builtin, weasyprint, wkhtmltopdf, chromium.
    #[arg(long, env = "MD2PDF_ENGINE")]
    engine: Option<String>,

    /// Path to the external engine executable (skips PATH lookup).
    #[arg(long, env = "MD2PDF_ENGINE_PATH")]
    engine_path: Option<PathBuf>,

    /// Seconds before a running external engine is killed.
    #[arg(long, env = "MD2PDF_ENGINE_TIMEOUT", default_value_t = 120)]
    engine_timeout: u64,

    /// Paper size: letter, a4, legal.
    #[arg(long, env = "MD2PDF_PAGE_SIZE", value_enum, default_value = "letter")]
    page_size: PageSizeArg,

    /// Page margin in centimetres (0–5).
    #[arg(long, env = "MD2PDF_MARGIN_CM", default_value_t = 1.5)]
    margin_cm: f32,

    /// Document styling: standard, minimal.
    #[arg(long, env = "MD2PDF_STYLE", value_enum, default_value = "standard")]
    style: StyleArg,

    /// syntect theme for code blocks (e.g. InspiredGitHub, base16-ocean.light).
    #[arg(long, env = "MD2PDF_HIGHLIGHT_THEME")]
    highlight_theme: Option<String>,

    /// Disable syntax highlighting of code blocks.
    #[arg(long, env = "MD2PDF_NO_HIGHLIGHT")]
    no_highlight: bool,

    /// Show raw HTML in the Markdown as text instead of passing it through.
    #[arg(long, env = "MD2PDF_ESCAPE_HTML")]
    escape_html: bool,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "MD2PDF_MAX_UPLOAD_MB", default_value_t = 16,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    Letter,
    A4,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Standard,
    Minimal,
}

impl From<StyleArg> for StyleProfile {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Standard => StyleProfile::Standard,
            StyleArg::Minimal => StyleProfile::Minimal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build session ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let mut session = SessionController::from_config(&config)
        .context("Failed to set up the PDF engine")?;
    if !cli.quiet {
        session.add_observer(ConsoleSpinner::new());
    }

    let form_config = FormConfig {
        bind: cli.bind,
        max_upload_bytes: usize::try_from(cli.max_upload_mb * 1024 * 1024)
            .context("--max-upload-mb is too large for this platform")?,
    };

    if !cli.quiet {
        eprintln!(
            "{} {}  {}",
            green("◆"),
            bold(&format!("Open http://{} in your browser", cli.bind)),
            dim(&format!("(engine: {})", session.pipeline().renderer_name()))
        );
    }

    // ── Serve ────────────────────────────────────────────────────────────
    form::serve(session, form_config)
        .await
        .with_context(|| format!("Failed to serve the form on {}", cli.bind))?;
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_size(cli.page_size.into())
        .margin_cm(cli.margin_cm)
        .style(cli.style.into())
        .escape_raw_html(cli.escape_html)
        .engine_timeout_secs(cli.engine_timeout);

    if let Some(name) = &cli.engine {
        let engine = EngineChoice::from_name(name).ok_or_else(|| {
            anyhow!(
                "Unknown engine '{name}'. Expected one of: auto, builtin, weasyprint, \
                 wkhtmltopdf, chromium"
            )
        })?;
        builder = builder.engine(engine);
    }
    if let Some(path) = &cli.engine_path {
        // A bare --engine-path means "use that executable", not the built-in engine.
        if cli.engine.is_none() {
            builder = builder.engine(EngineChoice::Auto);
        }
        builder = builder.engine_path(path.clone());
    }
    if let Some(theme) = &cli.highlight_theme {
        builder = builder.highlight_theme(theme.clone());
    }
    if cli.no_highlight {
        builder = builder.no_highlight();
    }

    builder.build().context("Invalid configuration")
}
