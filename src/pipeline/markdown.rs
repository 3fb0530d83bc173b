//! Step (b): Markdown → HTML fragment.
//!
//! [`MarkdownTransform`] is the seam; [`CmarkTransform`] is the pulldown-cmark
//! implementation used by default. Markdown has no syntax errors, so a
//! transform never fails: whatever the input, some HTML comes out.
//!
//! On top of plain CommonMark the pulldown-cmark transform runs three passes
//! over the event stream before handing it to the HTML writer:
//!
//! 1. **Heading anchors**: every heading gets a unique slug `id` (explicit
//!    `{#id}` attributes win), which is what table-of-contents links target.
//! 2. **`[TOC]` marker**: a paragraph containing only `[TOC]` becomes a nested
//!    list of links to those anchors.
//! 3. **Code blocks**: fenced and indented blocks are wrapped in
//!    `<div class="highlight">` and, when a theme is configured, coloured by
//!    syntect with `hl-`-prefixed CSS classes. The matching stylesheet is
//!    returned by [`MarkdownTransform::stylesheet`].

use crate::config::{MarkdownOptions, DEFAULT_HIGHLIGHT_THEME};
use crate::pipeline::template::escape_html;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashMap;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

/// Converts Markdown text into an HTML fragment.
///
/// Implementations must be `Send + Sync`: the web form moves the session,
/// and with it the pipeline, onto a blocking thread for each conversion.
pub trait MarkdownTransform: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Transform `markdown` into an HTML fragment (no `<html>`/`<body>`).
    fn to_html(&self, markdown: &str) -> HtmlFragment;

    /// CSS the fragment's markup relies on (e.g. highlighting classes).
    fn stylesheet(&self) -> String {
        String::new()
    }
}

/// Output of a [`MarkdownTransform`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlFragment {
    /// The HTML body content.
    pub html: String,
    /// Text of the first level-1 heading, used as the document title.
    pub title: Option<String>,
    /// Every heading in document order.
    pub headings: Vec<HeadingEntry>,
}

/// One heading of the converted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// 1–6.
    pub level: u8,
    /// Plain text content.
    pub text: String,
    /// Anchor id, when heading ids are enabled or set explicitly.
    pub id: Option<String>,
}

// ── Shared syntect state ─────────────────────────────────────────────────────

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// `true` if `name` is one of syntect's bundled themes.
pub fn has_highlight_theme(name: &str) -> bool {
    THEMES.themes.contains_key(name)
}

/// Names of the bundled themes, sorted.
pub fn highlight_theme_names() -> Vec<String> {
    THEMES.themes.keys().cloned().collect()
}

// ── pulldown-cmark implementation ────────────────────────────────────────────

/// Markdown transform backed by pulldown-cmark, with syntect highlighting.
#[derive(Debug, Clone)]
pub struct CmarkTransform {
    options: MarkdownOptions,
    highlight: Option<Highlight>,
}

#[derive(Debug, Clone)]
struct Highlight {
    theme: String,
    css: String,
}

impl CmarkTransform {
    /// Create a transform; `highlight_theme = None` disables colouring.
    ///
    /// An unknown theme name falls back to the default theme with a warning;
    /// [`crate::config::ConversionConfigBuilder::build`] rejects unknown names
    /// before they get here.
    pub fn new(options: MarkdownOptions, highlight_theme: Option<&str>) -> Self {
        let highlight = highlight_theme.map(|name| {
            let theme_name = if has_highlight_theme(name) {
                name
            } else {
                warn!("Unknown highlight theme '{}', using {}", name, DEFAULT_HIGHLIGHT_THEME);
                DEFAULT_HIGHLIGHT_THEME
            };
            let css = THEMES
                .themes
                .get(theme_name)
                .map(|theme| {
                    css_for_theme_with_class_style(theme, CLASS_STYLE).unwrap_or_else(|e| {
                        warn!("Could not build CSS for theme '{}': {}", theme_name, e);
                        String::new()
                    })
                })
                .unwrap_or_default();
            Highlight {
                theme: theme_name.to_string(),
                css,
            }
        });
        Self { options, highlight }
    }

    fn parser_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.options.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.options.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.options.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.options.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        opts
    }
}

impl Default for CmarkTransform {
    fn default() -> Self {
        Self::new(MarkdownOptions::default(), Some(DEFAULT_HIGHLIGHT_THEME))
    }
}

impl MarkdownTransform for CmarkTransform {
    fn name(&self) -> &str {
        "pulldown-cmark"
    }

    fn to_html(&self, markdown: &str) -> HtmlFragment {
        let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, self.parser_options()).collect();

        let headings = collect_headings(&mut events, self.options.heading_ids);

        if self.options.toc_marker && self.options.heading_ids {
            events = expand_toc_marker(events, &headings);
        }
        if self.options.escape_raw_html {
            events = events.into_iter().map(escape_raw_html).collect();
        }
        let events = render_code_blocks(events, self.highlight.is_some());

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());

        let title = headings
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.clone())
            .filter(|t| !t.is_empty());

        debug!(
            "Markdown → HTML: {} bytes in, {} bytes out, {} headings",
            markdown.len(),
            out.len(),
            headings.len()
        );

        HtmlFragment {
            html: out,
            title,
            headings,
        }
    }

    fn stylesheet(&self) -> String {
        match &self.highlight {
            Some(h) => format!("/* syntax theme: {} */\n{}", h.theme, h.css),
            None => String::new(),
        }
    }
}

// ── Pass 1: Heading anchors ──────────────────────────────────────────────────

/// Walk the event stream, recording every heading and (optionally) giving it
/// a unique slug id in place.
fn collect_headings(events: &mut [Event<'_>], assign_ids: bool) -> Vec<HeadingEntry> {
    let mut headings = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    let mut i = 0;
    while i < events.len() {
        let (level, explicit_id) = match &events[i] {
            Event::Start(Tag::Heading { level, id, .. }) => {
                (*level as u8, id.as_ref().map(|s| s.to_string()))
            }
            _ => {
                i += 1;
                continue;
            }
        };

        let mut text = String::new();
        let mut j = i + 1;
        while j < events.len() {
            match &events[j] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            j += 1;
        }
        let text = text.trim().to_string();

        let id = match explicit_id {
            Some(id) => {
                *seen.entry(id.clone()).or_insert(0) += 1;
                Some(id)
            }
            None if assign_ids => {
                let id = unique_slug(&slugify(&text), &mut seen);
                if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
                    *slot = Some(CowStr::from(id.clone()));
                }
                Some(id)
            }
            None => None,
        };

        headings.push(HeadingEntry { level, text, id });
        i = j + 1;
    }

    headings
}

static RE_SLUG_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Lowercase, keep letters and digits, turn whitespace and hyphens into `-`.
fn slugify(text: &str) -> String {
    let raw: String = text
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c.is_whitespace() || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect();
    let slug = RE_SLUG_DASHES.replace_all(&raw, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_slug(base: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(base.to_string()).or_insert(0);
    let slug = if *count == 0 {
        base.to_string()
    } else {
        format!("{base}-{count}")
    };
    *count += 1;
    if slug != base {
        seen.entry(slug.clone()).or_insert(1);
    }
    slug
}

// ── Pass 2: [TOC] marker ─────────────────────────────────────────────────────

const TOC_MARKER: &str = "[TOC]";

/// Replace every paragraph whose only content is `[TOC]` with a table of
/// contents. The marker may arrive as several adjacent text events.
fn expand_toc_marker<'a>(events: Vec<Event<'a>>, headings: &[HeadingEntry]) -> Vec<Event<'a>> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;
    while i < events.len() {
        if matches!(events[i], Event::Start(Tag::Paragraph)) {
            let mut text = String::new();
            let mut j = i + 1;
            let mut only_text = true;
            while j < events.len() {
                match &events[j] {
                    Event::End(TagEnd::Paragraph) => break,
                    Event::Text(t) => text.push_str(t),
                    _ => only_text = false,
                }
                j += 1;
            }
            if only_text && j < events.len() && text.trim() == TOC_MARKER {
                out.push(Event::Html(CowStr::from(render_toc(headings))));
                i = j + 1;
                continue;
            }
        }
        out.push(events[i].clone());
        i += 1;
    }
    out
}

fn render_toc(headings: &[HeadingEntry]) -> String {
    let mut out = String::from("<nav class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for h in headings.iter().filter(|h| h.id.is_some()) {
        while open.last().is_some_and(|&l| l > h.level) {
            out.push_str("</li>\n</ul>\n");
            open.pop();
        }
        match open.last() {
            Some(&l) if l == h.level => out.push_str("</li>\n"),
            _ => {
                out.push_str("<ul>\n");
                open.push(h.level);
            }
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(h.id.as_deref().unwrap_or_default()),
            escape_html(&h.text)
        ));
    }
    for _ in open {
        out.push_str("</li>\n</ul>\n");
    }
    out.push_str("</nav>\n");
    out
}

// ── Raw HTML escaping ────────────────────────────────────────────────────────

fn escape_raw_html(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(s) | Event::InlineHtml(s) => Event::Text(s),
        other => other,
    }
}

// ── Pass 3: Code blocks ──────────────────────────────────────────────────────

fn render_code_blocks(events: Vec<Event<'_>>, highlight: bool) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut block: Option<(Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                block = Some((lang, String::new()));
            }
            Event::Text(text) if block.is_some() => {
                if let Some((_, code)) = block.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = block.take() {
                    out.push(Event::Html(CowStr::from(code_block_html(
                        &code,
                        lang.as_deref(),
                        highlight,
                    ))));
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// First token of a fence info string: "rust,ignore" → "rust".
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn code_block_html(code: &str, lang: Option<&str>, highlight: bool) -> String {
    let class = lang
        .map(|l| format!(" class=\"language-{}\"", escape_html(l)))
        .unwrap_or_default();
    let body = if highlight {
        highlight_code(code, lang)
    } else {
        escape_html(code)
    };
    format!("<div class=\"highlight\"><pre><code{class}>{body}</code></pre></div>\n")
}

/// Colour `code` with CSS classes. Language from the fence, else guessed from
/// the first line (shebangs, `<?php`, …), else plain text.
fn highlight_code(code: &str, lang: Option<&str>) -> String {
    let syntax = lang
        .and_then(|l| SYNTAXES.find_syntax_by_token(l))
        .or_else(|| SYNTAXES.find_syntax_by_first_line(code))
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            warn!("Highlighting failed ({}), emitting plain code", e);
            return escape_html(code);
        }
    }
    generator.finalize()
}
