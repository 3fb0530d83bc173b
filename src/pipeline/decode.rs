//! Step (a): turn uploaded bytes into Markdown text.
//!
//! Decoding is strict UTF-8: a Markdown file in any other encoding fails here
//! with [`Md2PdfError::Decode`] rather than rendering as mojibake. Two cheap
//! normalisation rules then run so the Markdown processor sees the same text
//! regardless of which editor saved the file:
//!
//! 1. Strip a leading byte-order mark (Windows editors add one)
//! 2. Normalise line endings (CRLF and lone CR → LF)

use crate::error::Md2PdfError;
use std::borrow::Cow;

const UTF8_BOM: char = '\u{FEFF}';

/// Decode `bytes` as UTF-8 and normalise the result.
///
/// `name` is only used in the error message.
pub fn decode_markdown<'a>(name: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>, Md2PdfError> {
    let text = std::str::from_utf8(bytes).map_err(|e| Md2PdfError::Decode {
        name: name.to_string(),
        valid_up_to: e.valid_up_to(),
    })?;

    let text = strip_bom(text);
    Ok(normalise_line_endings(text))
}

// ── Rule 1: Strip byte-order mark ────────────────────────────────────────────

fn strip_bom(input: &str) -> &str {
    input.strip_prefix(UTF8_BOM).unwrap_or(input)
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(input)
    }
}
