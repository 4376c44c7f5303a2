//! Error types for the svgpdf-merge library.
//!
//! Failures are split by the stage that produces them:
//!
//! * [`TimeExprError`] — a `--since` / `--till` expression could not be
//!   resolved to an instant.
//! * [`SelectionError`] — the input list could not be resolved (bad flag
//!   combination, nothing to convert, unreadable timestamps).
//! * [`RenderError`] — one SVG could not be turned into a PDF fragment. Always
//!   wrapped in [`Svg2PdfError::Render`] together with the offending path
//!   before it reaches the caller.
//! * [`Svg2PdfError`] — **Fatal** for the whole run. Every top-level entry
//!   point returns it; the merged document is never written when one occurs.
//!
//! Nothing in the library retries. A transient fault (subprocess crash, full
//! disk) is surfaced so the operator can re-run.

use std::path::PathBuf;
use thiserror::Error;

/// A time expression matched neither accepted grammar, or its numbers are out
/// of range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeExprError {
    #[error("Invalid time expression '{expression}': {reason}\nExpected [N:]N{{d|h|m|s}} or yyyy-MM-ddThh:mm:ss.")]
    Invalid { expression: String, reason: String },
}

impl TimeExprError {
    pub(crate) fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        TimeExprError::Invalid {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// The ordered input list could not be produced.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// `--till` was given without `--since`.
    #[error("Option --till can be specified only with --since")]
    TillWithoutSince,

    /// No time window and no explicit inputs.
    #[error("Input files are required (or use --since to pick SVG files from the current directory)")]
    NoInputsSpecified,

    /// The modification time of a candidate could not be read.
    #[error("Cannot read modification time of '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The discovery directory could not be listed.
    #[error("Cannot list SVG files in '{dir}': {source}")]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single SVG → PDF conversion failed.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The external program could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the program's output (or writing it to the sink) failed.
    #[error("I/O error while converting: {0}")]
    Io(#[from] std::io::Error),

    /// The program exited above the tolerated exit code, or was killed.
    #[error("'{program}' exited with {}{}", describe_exit(.code), stderr_suffix(.stderr))]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The SVG file could not be read by the embedded transcoder.
    #[error("Cannot read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The embedded transcoder rejected the document.
    #[error("SVG transcoding failed: {0}")]
    Transcode(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// All fatal errors returned by the svgpdf-merge library.
#[derive(Debug, Error)]
pub enum Svg2PdfError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Builder validation failed or flags conflict.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A `--since` / `--till` value is malformed.
    #[error(transparent)]
    TimeExpression(#[from] TimeExprError),

    /// Inputs could not be resolved.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// An explicitly named input does not exist.
    #[error("SVG file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Converting one input failed; the whole run is aborted.
    #[error("Conversion of input #{} '{path}' failed: {source}", .index + 1)]
    Render {
        index: usize,
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    /// The renderer produced bytes that are not a loadable PDF.
    #[error("Renderer output for '{path}' is not a valid PDF: {detail}")]
    CorruptFragment { path: PathBuf, detail: String },

    /// Assembling the merged document failed.
    #[error("Failed to merge PDF fragments: {0}")]
    Merge(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Svg2PdfError {
    /// True for errors raised before any conversion work started.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Svg2PdfError::InvalidConfig(_)
                | Svg2PdfError::TimeExpression(_)
                | Svg2PdfError::Selection(_)
                | Svg2PdfError::FileNotFound { .. }
        )
    }
}
