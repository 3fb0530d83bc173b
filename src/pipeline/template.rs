//! Step (c): wrap an HTML fragment in a complete, printable document.
//!
//! The wrapper is a fixed skeleton with three named slots: the document
//! **title**, the **stylesheet** and the **content**. Slots are filled by
//! [`HtmlTemplate::render`] rather than by string interpolation into one big
//! literal, so each slot gets the treatment it needs:
//!
//! | Slot | Treatment |
//! |------|-----------|
//! | title | HTML-escaped |
//! | stylesheet | built-in rules + page box + caller CSS; any `</style` sequence removed |
//! | content | inserted verbatim (it is already HTML) |

use crate::config::{ConversionConfig, PageSize, StyleProfile, STYLE_BREAKOUT};
use std::fmt;

/// Named slot values for one render.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSlots<'a> {
    /// Plain text; escaped on insertion.
    pub title: &'a str,
    /// Additional CSS from the Markdown transform (highlighting classes).
    pub stylesheet: &'a str,
    /// The HTML fragment to place in `<body>`.
    pub content: &'a str,
}

/// A complete HTML document, ready for a rendering engine.
#[derive(Clone, PartialEq, Eq)]
pub struct HtmlDocument(String);

impl HtmlDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HtmlDocument(<{} bytes>)", self.0.len())
    }
}

/// The fixed document skeleton, parameterised by page setup and style.
#[derive(Debug, Clone)]
pub struct HtmlTemplate {
    page_size: PageSize,
    margin_cm: f32,
    style: StyleProfile,
    extra_css: Option<String>,
}

impl HtmlTemplate {
    pub fn new(page_size: PageSize, margin_cm: f32, style: StyleProfile) -> Self {
        Self {
            page_size,
            margin_cm,
            style,
            extra_css: None,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            page_size: config.page_size,
            margin_cm: config.margin_cm,
            style: config.style,
            extra_css: config.extra_css.clone(),
        }
    }

    pub fn with_extra_css(mut self, css: impl Into<String>) -> Self {
        self.extra_css = Some(css.into());
        self
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn margin_cm(&self) -> f32 {
        self.margin_cm
    }

    /// Fill the slots and produce the full document.
    pub fn render(&self, slots: &TemplateSlots<'_>) -> HtmlDocument {
        let css = self.stylesheet(slots.stylesheet);
        let mut out = String::with_capacity(slots.content.len() + css.len() + 256);

        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
        out.push_str("<title>");
        out.push_str(&escape_html(slots.title));
        out.push_str("</title>\n<style>\n");
        out.push_str(&css);
        out.push_str("</style>\n</head>\n<body>\n");
        out.push_str(slots.content);
        if !slots.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</body>\n</html>\n");

        HtmlDocument(out)
    }

    /// The complete contents of the stylesheet slot.
    pub fn stylesheet(&self, transform_css: &str) -> String {
        let mut css = format!(
            "@page {{ size: {}; margin: {}cm; }}\n",
            self.page_size.css_keyword(),
            self.margin_cm
        );
        css.push_str(BASE_CSS);
        if self.style == StyleProfile::Standard {
            css.push_str(STANDARD_CSS);
        }
        for extra in [Some(transform_css), self.extra_css.as_deref()].into_iter().flatten() {
            if !extra.is_empty() {
                css.push_str(&STYLE_BREAKOUT.replace_all(extra, ""));
                css.push('\n');
            }
        }
        css
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const BASE_CSS: &str = r#"body {
  font-family: 'DejaVu Sans', 'Helvetica', 'Arial', sans-serif;
  font-size: 11pt;
  line-height: 1.6;
  color: #333;
  margin: 0;
}
pre, code { font-family: 'DejaVu Sans Mono', 'Consolas', 'Courier New', monospace; }
pre { white-space: pre-wrap; word-wrap: break-word; }
table { border-collapse: collapse; width: 100%; margin: 1em 0; }
th, td { border: 1px solid #ddd; padding: 6px 10px; text-align: left; }
img { max-width: 100%; }
"#;

const STANDARD_CSS: &str = r#"h1, h2, h3, h4, h5, h6 { margin-top: 1.5em; margin-bottom: 0.5em; font-weight: bold; }
h1 { font-size: 2em; border-bottom: 2px solid #333; padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid #666; padding-bottom: 0.2em; }
h3 { font-size: 1.25em; }
.highlight {
  background-color: #f6f8fa;
  border: 1px solid #d0d7de;
  border-radius: 6px;
  padding: 12px 16px;
  margin: 1em 0;
  font-size: 10pt;
}
.highlight pre { margin: 0; padding: 0; background: transparent; border: none; }
code {
  background-color: #f6f8fa;
  padding: 2px 5px;
  border-radius: 3px;
  font-size: 0.92em;
  color: #24292f;
  border: 1px solid #d0d7de;
}
.highlight code { background: transparent; padding: 0; border: none; color: inherit; }
th { background-color: #f5f5f5; font-weight: bold; }
blockquote { border-left: 4px solid #ddd; padding-left: 16px; margin-left: 0; color: #666; font-style: italic; }
a { color: #0366d6; text-decoration: none; }
nav.toc { border: 1px solid #eee; padding: 0.5em 1em; margin: 1em 0; }
nav.toc ul { list-style: none; padding-left: 1.2em; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> HtmlTemplate {
        HtmlTemplate::new(PageSize::A4, 2.0, StyleProfile::Standard)
    }

    #[test]
    fn slots_land_in_order() {
        let doc = template().render(&TemplateSlots {
            title: "Report",
            stylesheet: ".hl-x { color: red; }",
            content: "<p>Hi</p>",
        });
        let s = doc.as_str();
        assert!(s.starts_with("<!DOCTYPE html>"));
        let title = s.find("<title>Report</title>").unwrap();
        let style = s.find(".hl-x").unwrap();
        let body = s.find("<p>Hi</p>").unwrap();
        assert!(title < style && style < body);
        assert!(s.trim_end().ends_with("</html>"));
    }

    #[test]
    fn title_is_escaped() {
        let doc = template().render(&TemplateSlots {
            title: "</title><script>x</script>",
            stylesheet: "",
            content: "",
        });
        assert!(!doc.as_str().contains("<script>"));
        assert!(doc.as_str().contains("&lt;/title&gt;"));
    }

    #[test]
    fn page_rule_uses_size_and_margin() {
        let css = template().stylesheet("");
        assert!(css.starts_with("@page { size: A4; margin: 2cm; }"), "got: {css}");
    }

    #[test]
    fn minimal_profile_omits_heading_rules() {
        let minimal = HtmlTemplate::new(PageSize::Letter, 1.5, StyleProfile::Minimal).stylesheet("");
        assert!(minimal.contains("border-collapse"));
        assert!(!minimal.contains("border-bottom: 2px"));
        assert!(template().stylesheet("").contains("border-bottom: 2px"));
    }

    #[test]
    fn stylesheet_slot_cannot_close_style_element() {
        let doc = template()
            .with_extra_css("p{}</style><script>bad()</script>")
            .render(&TemplateSlots {
                title: "t",
                stylesheet: "</ STYLE>",
                content: "",
            });
        assert_eq!(doc.as_str().matches("</style>").count(), 1);
    }

    #[test]
    fn escape_html_covers_specials() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
