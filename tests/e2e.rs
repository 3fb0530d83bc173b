//! End-to-end round trips through real PDF engines.
//!
//! The built-in engine tests run whenever the `builtin-engine` feature is on
//! (the default). External engine tests look for the engine on `PATH` (or
//! `MD2PDF_ENGINE_PATH`) and skip with a message when it is not installed.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use edgequake_md2pdf::{
    CommandRenderer, ConversionConfig, EngineChoice, EngineKind, Pipeline, SessionController,
    UploadedDocument, ViewState,
};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const SAMPLE: &str = r#"# Quarterly Report

Some **bold** text, some *italic* text and `inline code`.

## Figures

| Region | Revenue |
|--------|--------:|
| North  |   1,200 |
| South  |     980 |

```rust
fn main() {
    println!("hello");
}
```

> A block quote.
"#;

/// Skip this test if the engine is not installed.
macro_rules! skip_unless_installed {
    ($kind:expr) => {{
        match CommandRenderer::locate($kind) {
            Ok(renderer) => renderer,
            Err(e) => {
                println!("SKIP: {e}");
                return;
            }
        }
    }};
}

fn assert_pdf(bytes: &[u8], context: &str) {
    assert!(
        bytes.starts_with(b"%PDF-"),
        "[{context}] output does not start with %PDF-: {:?}",
        String::from_utf8_lossy(&bytes[..bytes.len().min(16)])
    );
    assert!(bytes.len() > 200, "[{context}] PDF is suspiciously small");
}

fn round_trip(pipeline: Pipeline, context: &str) {
    let mut session = SessionController::new(pipeline);
    session
        .on_upload(UploadedDocument::new("report.md", SAMPLE))
        .unwrap();
    session.on_convert_requested().unwrap();
    assert_eq!(session.state(), ViewState::ArtifactReady);

    let artifact = session.current_artifact().unwrap();
    assert_pdf(&artifact.bytes, context);
    assert_eq!(artifact.filename, "converted.pdf");
    println!(
        "[{context}] {} bytes in {}ms",
        artifact.len(),
        artifact.stats.total_duration_ms
    );
}

// ── Built-in engine ──────────────────────────────────────────────────────────

#[cfg(feature = "builtin-engine")]
#[test]
fn builtin_round_trip() {
    let config = ConversionConfig::builder()
        .engine(EngineChoice::Builtin)
        .build()
        .unwrap();
    round_trip(Pipeline::from_config(&config).unwrap(), "builtin");
}

#[cfg(feature = "builtin-engine")]
#[test]
fn builtin_handles_empty_document() {
    let artifact = edgequake_md2pdf::convert_bytes("empty.md", b"", &ConversionConfig::default())
        .unwrap();
    assert!(artifact.bytes.starts_with(b"%PDF-"));
}

// ── External engines ─────────────────────────────────────────────────────────

fn external_round_trip(kind: EngineKind) {
    let renderer = skip_unless_installed!(kind);
    let config = ConversionConfig::builder()
        .engine(EngineChoice::External(kind))
        .build()
        .unwrap();
    let renderer = renderer
        .with_page(config.page_size, config.margin_cm)
        .with_timeout(std::time::Duration::from_secs(config.engine_timeout_secs));
    round_trip(
        Pipeline::with_renderer(&config, Arc::new(renderer)),
        &kind.to_string(),
    );
}

#[test]
fn weasyprint_round_trip() {
    external_round_trip(EngineKind::WeasyPrint);
}

#[test]
fn wkhtmltopdf_round_trip() {
    external_round_trip(EngineKind::Wkhtmltopdf);
}

#[test]
fn chromium_round_trip() {
    external_round_trip(EngineKind::Chromium);
}
