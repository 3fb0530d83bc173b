//! # pdf-engine-locate
//!
//! Find an installed HTML-to-PDF engine on the host so that
//! `edgequake-md2pdf` can hand a complete HTML document to it as a
//! subprocess.
//!
//! ## How it works
//!
//! On a call to [`locate`]:
//!
//! 1. If `MD2PDF_ENGINE_PATH` is set and points to an existing file, that file
//!    is used as-is, whatever its name.
//! 2. Otherwise every directory of `PATH` is searched, in order, for the
//!    engine's candidate executable names (see [`EngineKind::executable_names`]).
//! 3. The first hit is cached for the rest of the process.
//!
//! [`detect_any`] walks the engines in preference order
//! ([`EngineKind::PREFERENCE`]) and returns the first one found.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdf_engine_locate::{detect_any, locate, EngineKind};
//!
//! // A specific engine
//! let weasy = locate(EngineKind::WeasyPrint).expect("weasyprint not installed");
//!
//! // Whatever is available
//! if let Some(found) = detect_any() {
//!     println!("using {} at {}", found.kind, found.path.display());
//! }
//! ```
//!
//! ## Candidate executables
//!
//! | Engine      | Names searched                                             |
//! |-------------|------------------------------------------------------------|
//! | WeasyPrint  | `weasyprint`                                               |
//! | wkhtmltopdf | `wkhtmltopdf`                                              |
//! | Chromium    | `chromium`, `chromium-browser`, `google-chrome`, `google-chrome-stable`, `chrome`, `msedge` |
//!
//! On Windows each name is tried with the `.exe` suffix.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an engine executable explicitly.
pub const ENGINE_PATH_ENV: &str = "MD2PDF_ENGINE_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by the locator.
#[derive(Error, Debug)]
pub enum LocateError {
    /// None of the engine's executables exist on `PATH`.
    #[error(
        "{engine} was not found on PATH (looked for: {searched})\n\
Install it, or point MD2PDF_ENGINE_PATH at the executable."
    )]
    NotFound { engine: EngineKind, searched: String },

    /// `MD2PDF_ENGINE_PATH` is set but does not name a file.
    #[error("MD2PDF_ENGINE_PATH is set to '{path}', which does not exist")]
    BadOverride { path: PathBuf },
}

// ── Engine kinds ─────────────────────────────────────────────────────────────

/// The external HTML-to-PDF engines the converter knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// WeasyPrint: CSS paged-media aware, honours `@page`.
    WeasyPrint,
    /// wkhtmltopdf: Qt WebKit based.
    Wkhtmltopdf,
    /// Headless Chromium / Chrome / Edge via `--print-to-pdf`.
    Chromium,
}

impl EngineKind {
    /// Order used by [`detect_any`]. WeasyPrint first since it implements
    /// `@page` size and margins faithfully.
    pub const PREFERENCE: [EngineKind; 3] = [
        EngineKind::WeasyPrint,
        EngineKind::Wkhtmltopdf,
        EngineKind::Chromium,
    ];

    /// Executable base names to search for, most specific first.
    pub fn executable_names(self) -> &'static [&'static str] {
        match self {
            EngineKind::WeasyPrint => &["weasyprint"],
            EngineKind::Wkhtmltopdf => &["wkhtmltopdf"],
            EngineKind::Chromium => &[
                "chromium",
                "chromium-browser",
                "google-chrome",
                "google-chrome-stable",
                "chrome",
                "msedge",
            ],
        }
    }

    /// Parse a user-facing engine name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "weasyprint" | "weasy" => Some(EngineKind::WeasyPrint),
            "wkhtmltopdf" | "wkhtml" => Some(EngineKind::Wkhtmltopdf),
            "chromium" | "chrome" | "edge" => Some(EngineKind::Chromium),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::WeasyPrint => "weasyprint",
            EngineKind::Wkhtmltopdf => "wkhtmltopdf",
            EngineKind::Chromium => "chromium",
        })
    }
}

/// An engine that was found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedEngine {
    pub kind: EngineKind,
    pub path: PathBuf,
}

// ── Thread-safe per-engine path cache ────────────────────────────────────────

static RESOLVED: [OnceLock<PathBuf>; 3] = [const { OnceLock::new() }; 3];

fn cache_slot(kind: EngineKind) -> &'static OnceLock<PathBuf> {
    match kind {
        EngineKind::WeasyPrint => &RESOLVED[0],
        EngineKind::Wkhtmltopdf => &RESOLVED[1],
        EngineKind::Chromium => &RESOLVED[2],
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the executable for `kind`, honouring `MD2PDF_ENGINE_PATH`.
///
/// The first successful lookup per engine is cached for the process lifetime.
pub fn locate(kind: EngineKind) -> Result<PathBuf, LocateError> {
    if let Some(path) = cache_slot(kind).get() {
        return Ok(path.clone());
    }

    let path = locate_uncached(kind)?;
    let _ = cache_slot(kind).set(path.clone());
    Ok(path)
}

/// Same as [`locate`] but never reads or fills the cache.
pub fn locate_uncached(kind: EngineKind) -> Result<PathBuf, LocateError> {
    if let Some(raw) = std::env::var_os(ENGINE_PATH_ENV) {
        if !raw.is_empty() {
            let path = PathBuf::from(raw);
            if path.is_file() {
                return Ok(path);
            }
            return Err(LocateError::BadOverride { path });
        }
    }

    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    search_dirs(kind, &dirs).ok_or_else(|| LocateError::NotFound {
        engine: kind,
        searched: kind.executable_names().join(", "),
    })
}

/// Return the first engine found on `PATH`, in [`EngineKind::PREFERENCE`] order.
///
/// `MD2PDF_ENGINE_PATH` is ignored here: without a kind there is no way to
/// know how to drive an arbitrary executable.
pub fn detect_any() -> Option<LocatedEngine> {
    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    EngineKind::PREFERENCE.iter().find_map(|&kind| {
        if let Some(path) = cache_slot(kind).get() {
            return Some(LocatedEngine {
                kind,
                path: path.clone(),
            });
        }
        search_dirs(kind, &dirs).map(|path| {
            let _ = cache_slot(kind).set(path.clone());
            LocatedEngine { kind, path }
        })
    })
}

/// Search `dirs` in order for any executable name of `kind`.
pub fn search_dirs(kind: EngineKind, dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        for name in kind.executable_names() {
            let candidate = dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ────────────────────────────────────────────────────────────────────
