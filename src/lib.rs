//! # svgpdf-merge
//!
//! Convert a batch of SVG files into PDF and merge them, in order, into a
//! single document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SVG files
//!  │
//!  ├─ 1. Select  explicit list, or files modified inside [since, till)
//!  ├─ 2. Render  one PDF fragment per file, N at a time
//!  │             (inkscape when available, embedded svg2pdf otherwise)
//!  ├─ 3. Merge   concatenate pages in input order (lopdf)
//!  └─ 4. Output  atomic write of the merged document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svgpdf_merge::{convert_to_file, ConversionConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inputs = vec![PathBuf::from("a.svg"), PathBuf::from("b.svg")];
//!     let config = ConversionConfig::builder().title("Sketches").build()?;
//!     let stats = convert_to_file(&inputs, "sketches.pdf", config).await?;
//!     eprintln!("{} pages via {}", stats.page_count, stats.renderer);
//!     Ok(())
//! }
//! ```
//!
//! ## Selecting by modification time
//!
//! ```rust,no_run
//! use svgpdf_merge::{select_inputs, TimeWindow, TimeWindowParser};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = TimeWindowParser::default();
//! let window = TimeWindow::resolve(&parser, Some("1d"), None, &chrono::Local)?;
//! let inputs = select_inputs(&[], &window, Path::new("."))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `svgpdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! svgpdf-merge = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod select;
pub mod time_window;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, RendererPreference};
pub use convert::{convert, convert_sync, convert_to_file, ConversionPipeline};
pub use error::{RenderError, SelectionError, Svg2PdfError, TimeExprError};
pub use output::{ConversionOutput, ConversionStats, FileResult};
pub use pipeline::render::{EmbeddedRenderer, ExternalToolRenderer, SvgRenderer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use select::select_inputs;
pub use time_window::{Clock, FixedClock, SystemClock, TimeWindow, TimeWindowParser};
