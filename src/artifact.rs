//! The product of one conversion: PDF bytes plus what a host needs to offer
//! them as a download.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filename suggested to the browser for every generated PDF.
pub const ARTIFACT_FILENAME: &str = "converted.pdf";

/// Media type of every generated artifact.
pub const ARTIFACT_MEDIA_TYPE: &str = "application/pdf";

/// Signature every PDF byte stream starts with.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A generated PDF held in memory for the lifetime of one session.
///
/// Created by exactly one run of [`crate::convert::Pipeline::convert`];
/// never written to disk by the library unless the caller asks for it
/// ([`crate::convert::convert_to_file`]).
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionArtifact {
    /// The PDF byte stream. Always starts with [`PDF_SIGNATURE`].
    pub bytes: Vec<u8>,
    /// Suggested download filename. Always [`ARTIFACT_FILENAME`].
    pub filename: String,
    /// Always [`ARTIFACT_MEDIA_TYPE`].
    pub media_type: &'static str,
    /// Name of the uploaded document this PDF was produced from.
    pub source_name: String,
    /// Sizes and timing of the run that produced it.
    pub stats: ConversionStats,
}

impl ConversionArtifact {
    pub(crate) fn new(bytes: Vec<u8>, source_name: impl Into<String>, stats: ConversionStats) -> Self {
        Self {
            bytes,
            filename: ARTIFACT_FILENAME.to_string(),
            media_type: ARTIFACT_MEDIA_TYPE,
            source_name: source_name.into(),
            stats,
        }
    }

    /// Size of the PDF in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// PDF bytes make derived Debug output unreadable.
impl fmt::Debug for ConversionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionArtifact")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("source_name", &self.source_name)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Sizes and timing of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Decoded Markdown length in bytes.
    pub markdown_bytes: usize,
    /// Complete HTML document length in bytes.
    pub html_bytes: usize,
    /// Resulting PDF length in bytes.
    pub pdf_bytes: usize,
    /// Name of the engine that rendered the PDF.
    pub engine: String,
    /// Wall-clock time spent in the render step.
    pub render_duration_ms: u64,
    /// Wall-clock time of the whole pipeline.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_artifact_uses_fixed_name_and_type() {
        let a = ConversionArtifact::new(b"%PDF-1.7\n".to_vec(), "notes.md", ConversionStats::default());
        assert_eq!(a.filename, "converted.pdf");
        assert_eq!(a.media_type, "application/pdf");
        assert_eq!(a.source_name, "notes.md");
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn debug_hides_payload() {
        let a = ConversionArtifact::new(vec![b'%'; 4096], "big.md", ConversionStats::default());
        let dbg = format!("{a:?}");
        assert!(dbg.contains("<4096 bytes>"), "got: {dbg}");
        assert!(dbg.len() < 400);
    }
}
