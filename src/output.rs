//! Result types returned by the conversion entry points.

use serde::Serialize;
use std::path::PathBuf;

/// Complete result of a successful run.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The merged PDF document.
    pub pdf: Vec<u8>,

    /// One entry per input, in input order.
    pub files: Vec<FileResult>,

    pub stats: ConversionStats,
}

/// Per-input conversion record.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// 0-based position in the input list.
    pub index: usize,
    pub path: PathBuf,
    /// Size of the PDF fragment produced for this input.
    pub fragment_bytes: usize,
    pub duration_ms: u64,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Number of input files converted.
    pub total_files: usize,
    /// Pages in the merged document.
    pub page_count: usize,
    /// Size of the merged document in bytes.
    pub output_bytes: usize,
    /// Renderer that produced the fragments (`svg2pdf` or the external
    /// program name).
    pub renderer: String,
    pub total_duration_ms: u64,
    /// Wall time from the first job starting to the last one finishing.
    pub render_duration_ms: u64,
    pub merge_duration_ms: u64,
}
