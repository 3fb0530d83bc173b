//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. an external engine instead of the built-in one)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ markdown ──▶ template ──▶ render
//! (UTF-8)   (cmark+syntect) (HTML doc)  (PDF bytes)
//! ```
//!
//! 1. [`decode`]: strict UTF-8 decoding plus BOM and line-ending cleanup
//! 2. [`markdown`]: Markdown to an HTML fragment, with tables, footnotes,
//!    heading anchors, `[TOC]` and highlighted code blocks
//! 3. [`template`]: wrap the fragment in a complete document with the page
//!    setup and stylesheet
//! 4. [`render`]: lay the document out as PDF, in-process or through an
//!    external engine; the only stage that can touch the filesystem

pub mod decode;
pub mod markdown;
pub mod render;
pub mod template;
