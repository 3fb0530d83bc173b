//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so that a
//! session, the one-shot helpers and the web form all build the exact same
//! pipeline from the same values.

use crate::error::Md2PdfError;
use once_cell::sync::Lazy;
use pdf_engine_locate::EngineKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::{ConversionConfig, PageSize, StyleProfile};
///
/// let config = ConversionConfig::builder()
///     .page_size(PageSize::A4)
///     .margin_cm(2.0)
///     .style(StyleProfile::Minimal)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Paper size written into the template's `@page` rule. Default: Letter.
    pub page_size: PageSize,

    /// Page margin on all four sides, in centimetres. Range: 0–5. Default: 1.5.
    pub margin_cm: f32,

    /// How much styling the HTML wrapper carries. Default: [`StyleProfile::Standard`].
    pub style: StyleProfile,

    /// Markdown extensions and post-processing toggles.
    pub markdown: MarkdownOptions,

    /// syntect theme used to colour fenced code blocks. `None` disables
    /// highlighting. Default: `"InspiredGitHub"`.
    pub highlight_theme: Option<String>,

    /// Extra CSS appended after the built-in stylesheet.
    pub extra_css: Option<String>,

    /// Which engine turns the HTML document into PDF bytes.
    pub engine: EngineChoice,

    /// Explicit path to the external engine executable. Skips PATH lookup.
    pub engine_path: Option<PathBuf>,

    /// Wall-clock limit for one external engine run, in seconds. Default: 120.
    ///
    /// The session controller itself never times out; this only bounds the
    /// subprocess so a wedged browser cannot hold the session forever.
    pub engine_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin_cm: 1.5,
            style: StyleProfile::default(),
            markdown: MarkdownOptions::default(),
            highlight_theme: Some(DEFAULT_HIGHLIGHT_THEME.to_string()),
            extra_css: None,
            engine: EngineChoice::default(),
            engine_path: None,
            engine_timeout_secs: 120,
        }
    }
}

/// Theme shipped with syntect's default theme set.
pub const DEFAULT_HIGHLIGHT_THEME: &str = "InspiredGitHub";

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_cm(mut self, cm: f32) -> Self {
        self.config.margin_cm = cm;
        self
    }

    pub fn style(mut self, style: StyleProfile) -> Self {
        self.config.style = style;
        self
    }

    pub fn markdown(mut self, options: MarkdownOptions) -> Self {
        self.config.markdown = options;
        self
    }

    pub fn escape_raw_html(mut self, v: bool) -> Self {
        self.config.markdown.escape_raw_html = v;
        self
    }

    pub fn highlight_theme(mut self, theme: impl Into<String>) -> Self {
        self.config.highlight_theme = Some(theme.into());
        self
    }

    pub fn no_highlight(mut self) -> Self {
        self.config.highlight_theme = None;
        self
    }

    pub fn extra_css(mut self, css: impl Into<String>) -> Self {
        self.config.extra_css = Some(css.into());
        self
    }

    pub fn engine(mut self, engine: EngineChoice) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine_path = Some(path.into());
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if !(0.0..=5.0).contains(&c.margin_cm) || c.margin_cm.is_nan() {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Margin must be 0–5 cm, got {}",
                c.margin_cm
            )));
        }
        if let Some(css) = &c.extra_css {
            if STYLE_BREAKOUT.is_match(css) {
                return Err(Md2PdfError::InvalidConfig(
                    "Extra CSS must not contain a closing </style> tag".into(),
                ));
            }
        }
        if let Some(theme) = &c.highlight_theme {
            if !crate::pipeline::markdown::has_highlight_theme(theme) {
                return Err(Md2PdfError::InvalidConfig(format!(
                    "Unknown highlight theme '{theme}'. Available: {}",
                    crate::pipeline::markdown::highlight_theme_names().join(", ")
                )));
            }
        }
        if c.engine == EngineChoice::Builtin && !cfg!(feature = "builtin-engine") {
            return Err(Md2PdfError::InvalidConfig(
                "The built-in engine is not compiled in; enable the `builtin-engine` feature \
                 or pick an external engine"
                    .into(),
            ));
        }
        Ok(self.config)
    }
}

pub(crate) static STYLE_BREAKOUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</\s*style").unwrap());

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size of the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// US Letter, 215.9 × 279.4 mm. (default)
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
    /// US Legal, 215.9 × 355.6 mm.
    Legal,
}

impl PageSize {
    /// Keyword for the CSS `@page { size: … }` descriptor.
    pub fn css_keyword(self) -> &'static str {
        match self {
            PageSize::Letter => "letter",
            PageSize::A4 => "A4",
            PageSize::Legal => "legal",
        }
    }

    /// Name accepted by `wkhtmltopdf --page-size`.
    pub fn wkhtmltopdf_name(self) -> &'static str {
        match self {
            PageSize::Letter => "Letter",
            PageSize::A4 => "A4",
            PageSize::Legal => "Legal",
        }
    }

    /// Width and height in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::Letter => (215.9, 279.4),
            PageSize::A4 => (210.0, 297.0),
            PageSize::Legal => (215.9, 355.6),
        }
    }

    /// Parse a user-facing size name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "letter" => Some(PageSize::Letter),
            "a4" => Some(PageSize::A4),
            "legal" => Some(PageSize::Legal),
            _ => None,
        }
    }
}

/// How much CSS the HTML wrapper carries.
///
/// | Profile | Contents |
/// |---------|----------|
/// | `Minimal` | page box, body font, table borders |
/// | `Standard` | Minimal + heading rules, code blocks, inline code, block quotes, links |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleProfile {
    Minimal,
    #[default]
    Standard,
}

/// Which engine renders the HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineChoice {
    /// Built-in engine when compiled in, otherwise the first external engine
    /// found on PATH.
    Auto,
    /// In-process layout via `printpdf` (feature `builtin-engine`).
    Builtin,
    /// A specific external engine run as a subprocess.
    External(EngineKind),
}

impl Default for EngineChoice {
    fn default() -> Self {
        if cfg!(feature = "builtin-engine") {
            EngineChoice::Builtin
        } else {
            EngineChoice::Auto
        }
    }
}

impl EngineChoice {
    /// Parse `auto`, `builtin`, or an external engine name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(EngineChoice::Auto),
            "builtin" | "built-in" => Some(EngineChoice::Builtin),
            other => EngineKind::from_name(other).map(EngineChoice::External),
        }
    }
}

/// Markdown extensions applied by the pulldown-cmark transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// GFM pipe tables. Default: on.
    pub tables: bool,
    /// `[^note]` footnotes. Default: on.
    pub footnotes: bool,
    /// `~~strikethrough~~`. Default: on.
    pub strikethrough: bool,
    /// `- [x]` task lists. Default: on.
    pub task_lists: bool,
    /// Give every heading a unique slug `id` so it can be linked. Default: on.
    pub heading_ids: bool,
    /// Replace a paragraph consisting solely of `[TOC]` with a table of
    /// contents. Requires `heading_ids`. Default: on.
    pub toc_marker: bool,
    /// Render raw HTML found in the source as text instead of passing it
    /// through. Default: off.
    pub escape_raw_html: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_ids: true,
            toc_marker: true,
            escape_raw_html: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_letter_page_with_highlighting() {
        let c = ConversionConfig::default();
        assert_eq!(c.page_size, PageSize::Letter);
        assert_eq!(c.margin_cm, 1.5);
        assert_eq!(c.highlight_theme.as_deref(), Some(DEFAULT_HIGHLIGHT_THEME));
        assert!(c.markdown.tables);
        assert!(!c.markdown.escape_raw_html);
    }

    #[test]
    fn builder_rejects_out_of_range_margin() {
        let err = ConversionConfig::builder().margin_cm(7.5).build().unwrap_err();
        assert!(err.to_string().contains("Margin"), "got: {err}");
    }

    #[test]
    fn builder_rejects_style_breakout() {
        let err = ConversionConfig::builder()
            .extra_css("body{} </STYLE><script>alert(1)</script>")
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_unknown_theme() {
        let err = ConversionConfig::builder()
            .highlight_theme("no-such-theme")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no-such-theme"), "got: {err}");
    }

    #[test]
    fn builder_clamps_timeout() {
        let c = ConversionConfig::builder()
            .engine_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.engine_timeout_secs, 1);
    }

    #[test]
    fn engine_choice_names() {
        assert_eq!(EngineChoice::from_name("auto"), Some(EngineChoice::Auto));
        assert_eq!(EngineChoice::from_name("Builtin"), Some(EngineChoice::Builtin));
        assert_eq!(
            EngineChoice::from_name("weasyprint"),
            Some(EngineChoice::External(EngineKind::WeasyPrint))
        );
        assert_eq!(EngineChoice::from_name("latex"), None);
    }

    #[test]
    fn page_size_names_and_keywords() {
        assert_eq!(PageSize::from_name("A4"), Some(PageSize::A4));
        assert_eq!(PageSize::from_name("LEGAL"), Some(PageSize::Legal));
        assert_eq!(PageSize::Letter.css_keyword(), "letter");
        assert_eq!(PageSize::A4.wkhtmltopdf_name(), "A4");
        assert_eq!(PageSize::A4.dimensions_mm(), (210.0, 297.0));
    }
}
