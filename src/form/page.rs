//! HTML for the single form page.
//!
//! The page is rebuilt from a [`SessionView`] on every request; which controls
//! appear is decided entirely by `view.state`.

use crate::artifact::ARTIFACT_FILENAME;
use crate::pipeline::template::escape_html;
use crate::session::{NoticeLevel, SessionView, ViewState};

const PAGE_TITLE: &str = "📄 Markdown → PDF Converter";

/// The form page for the current session state.
pub fn render(view: &SessionView) -> String {
    let mut body = String::new();

    if let Some(notice) = &view.notice {
        let class = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        };
        body.push_str(&format!(
            "<div class=\"notice {class}\">{}</div>\n",
            escape_html(&notice.message)
        ));
    }

    match view.state {
        ViewState::NoDocument => {
            body.push_str(&upload_form("Upload your .md file"));
        }
        ViewState::DocumentReady => {
            body.push_str(&document_line(view));
            body.push_str(
                "<form method=\"post\" action=\"/convert\" class=\"busy-on-submit\">\n\
                 <button type=\"submit\">Convert to PDF</button>\n</form>\n",
            );
            body.push_str(CLEAR_FORM);
            body.push_str(&upload_form("Upload a different file"));
        }
        ViewState::ArtifactReady => {
            body.push_str(&document_line(view));
            body.push_str(&format!(
                "<p><a class=\"button\" href=\"/download\" download=\"{ARTIFACT_FILENAME}\">\
                 ⬇ Download Converted PDF</a>{}</p>\n",
                view.artifact_bytes
                    .map(|n| format!(" <small>{}</small>", human_size(n)))
                    .unwrap_or_default()
            ));
            body.push_str(
                "<form method=\"post\" action=\"/convert-again\">\n\
                 <button type=\"submit\">🔄 Convert Again</button>\n</form>\n",
            );
            body.push_str(CLEAR_FORM);
            body.push_str(&upload_form("Upload a different file"));
        }
    }

    page(&body, false)
}

/// Shown while a conversion holds the session.
pub fn render_busy() -> String {
    page(
        "<div class=\"spinner\"></div>\n<p>Converting to PDF...</p>\n",
        true,
    )
}

fn page(body: &str, refresh: bool) -> String {
    let refresh = if refresh {
        "<meta http-equiv=\"refresh\" content=\"1\">\n"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n{refresh}\
         <title>{PAGE_TITLE}</title>\n<style>\n{PAGE_CSS}</style>\n</head>\n<body>\n\
         <h1>{PAGE_TITLE}</h1>\n{body}\
         <div id=\"busy\" class=\"hidden\"><div class=\"spinner\"></div><p>Converting to PDF...</p></div>\n\
         <script>{BUSY_SCRIPT}</script>\n</body>\n</html>\n"
    )
}

fn upload_form(label: &str) -> String {
    format!(
        "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n\
         <label>{}<br><input type=\"file\" name=\"file\" accept=\".md,.markdown\" required></label>\n\
         <button type=\"submit\">Upload</button>\n</form>\n",
        escape_html(label)
    )
}

fn document_line(view: &SessionView) -> String {
    match (&view.document_name, view.document_bytes) {
        (Some(name), Some(len)) => format!(
            "<p class=\"document\"><strong>{}</strong> <small>{}</small></p>\n",
            escape_html(name),
            human_size(len)
        ),
        _ => String::new(),
    }
}

fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    }
}

const CLEAR_FORM: &str = "<form method=\"post\" action=\"/clear\">\n\
                          <button type=\"submit\" class=\"secondary\">Remove file</button>\n</form>\n";

const BUSY_SCRIPT: &str = "document.querySelectorAll('form.busy-on-submit').forEach(function (f) {\
f.addEventListener('submit', function () {\
document.getElementById('busy').classList.remove('hidden');\
f.querySelector('button').disabled = true; });});";

const PAGE_CSS: &str = r#"body { font-family: sans-serif; max-width: 40em; margin: 2em auto; color: #262730; }
form { margin: 1em 0; }
button, a.button { background: #ff4b4b; color: #fff; border: none; border-radius: 6px; padding: 0.5em 1em; font-size: 1em; text-decoration: none; cursor: pointer; }
button.secondary { background: #f0f2f6; color: #262730; }
.notice { padding: 0.75em 1em; border-radius: 6px; margin: 1em 0; }
.notice.info { background: #e8f0fe; }
.notice.success { background: #e6f4ea; }
.notice.error { background: #fde8e8; }
.hidden { display: none; }
.spinner { width: 1.5em; height: 1.5em; border: 3px solid #ddd; border-top-color: #ff4b4b; border-radius: 50%; animation: spin 0.8s linear infinite; }
@keyframes spin { to { transform: rotate(360deg); } }
"#;
