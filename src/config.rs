//! Configuration types for SVG-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one `Clone` struct
//! so it can be shared with worker tasks and logged as a whole.

use crate::error::Svg2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest exit code of the external tool still treated as success.
pub const DEFAULT_MAX_EXIT_CODE: i32 = 0;

/// External renderer probed and invoked when available.
pub const DEFAULT_EXTERNAL_PROGRAM: &str = "inkscape";

/// Configuration for an SVG-to-PDF merge run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use svgpdf_merge::{ConversionConfig, RendererPreference};
///
/// let config = ConversionConfig::builder()
///     .concurrency(4)
///     .renderer(RendererPreference::Embedded)
///     .title("Etudes, book 2")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Number of files converted at once. Default: host parallelism.
    pub concurrency: usize,

    /// Which renderer to use. Default: [`RendererPreference::Auto`].
    pub renderer: RendererPreference,

    /// Program name (or path) of the external renderer. Default: `inkscape`.
    pub external_program: String,

    /// Exit codes up to and including this value count as success.
    /// Default: [`DEFAULT_MAX_EXIT_CODE`].
    pub max_exit_code: i32,

    /// Title written to the merged document's Info dictionary.
    pub title: Option<String>,

    /// Receives per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            renderer: RendererPreference::default(),
            external_program: DEFAULT_EXTERNAL_PROGRAM.to_string(),
            max_exit_code: DEFAULT_MAX_EXIT_CODE,
            title: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("renderer", &self.renderer)
            .field("external_program", &self.external_program)
            .field("max_exit_code", &self.max_exit_code)
            .field("title", &self.title)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Worker count matching the host's available parallelism.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn renderer(mut self, preference: RendererPreference) -> Self {
        self.config.renderer = preference;
        self
    }

    pub fn external_program(mut self, program: impl Into<String>) -> Self {
        self.config.external_program = program.into();
        self
    }

    pub fn max_exit_code(mut self, code: i32) -> Self {
        self.config.max_exit_code = code;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Svg2PdfError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Svg2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.external_program.trim().is_empty() {
            return Err(Svg2PdfError::InvalidConfig(
                "External program name must not be empty".into(),
            ));
        }
        if c.max_exit_code < 0 {
            return Err(Svg2PdfError::InvalidConfig(format!(
                "Tolerated exit code must be ≥ 0, got {}",
                c.max_exit_code
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Renderer selection policy, applied once per pipeline.
///
/// | Preference | Behaviour |
/// |------------|-----------|
/// | `Auto` | probe the external tool; use it if present, else the embedded transcoder (default) |
/// | `External` | require the external tool; fail at startup if the probe fails |
/// | `Embedded` | never spawn processes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererPreference {
    #[default]
    Auto,
    External,
    Embedded,
}
