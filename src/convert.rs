//! Conversion entry points: render every input concurrently, then merge.
//!
//! Every job runs to completion before anything is merged. Results are
//! collected as they finish and placed back by input index, so the merged
//! page order always matches the input order no matter which job finished
//! first. A single failed job fails the whole run and nothing is written.

use crate::config::ConversionConfig;
use crate::error::Svg2PdfError;
use crate::output::{ConversionOutput, ConversionStats, FileResult};
use crate::pipeline::merge::merge_fragments;
use crate::pipeline::render::{resolve_renderer, SvgRenderer};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A configured renderer plus the settings for a run.
///
/// Build once, then call [`run`](Self::run) or
/// [`run_to_file`](Self::run_to_file) any number of times. The renderer
/// choice (including the external-tool probe) is made at construction.
pub struct ConversionPipeline {
    config: ConversionConfig,
    renderer: Arc<dyn SvgRenderer>,
}

/// Outcome of one render job, tagged with its input position.
struct Job {
    index: usize,
    path: PathBuf,
    elapsed: Duration,
    result: Result<Vec<u8>, Svg2PdfError>,
}

impl ConversionPipeline {
    /// Select a renderer per `config.renderer` and build the pipeline.
    ///
    /// Blocking: may spawn `<external_program> --version`.
    pub fn new(config: ConversionConfig) -> Result<Self, Svg2PdfError> {
        let renderer = resolve_renderer(&config)?;
        Ok(Self { config, renderer })
    }

    /// Build a pipeline around an already chosen renderer.
    pub fn with_renderer(config: ConversionConfig, renderer: Arc<dyn SvgRenderer>) -> Self {
        Self { config, renderer }
    }

    pub fn renderer(&self) -> &dyn SvgRenderer {
        self.renderer.as_ref()
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert `inputs` and return the merged document in memory.
    ///
    /// An empty `inputs` slice yields a valid zero-page PDF.
    ///
    /// # Errors
    /// * [`Svg2PdfError::FileNotFound`] before any work starts.
    /// * [`Svg2PdfError::Render`] for the lowest-index failed input, after
    ///   every started job has finished.
    /// * [`Svg2PdfError::CorruptFragment`] / [`Svg2PdfError::Merge`] from the
    ///   merge stage.
    pub async fn run(&self, inputs: &[PathBuf]) -> Result<ConversionOutput, Svg2PdfError> {
        let total_start = Instant::now();
        let total = inputs.len();
        info!(
            "Converting {} SVG file(s) with {} (concurrency {})",
            total,
            self.renderer.name(),
            self.config.concurrency
        );

        if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
            return Err(Svg2PdfError::FileNotFound {
                path: missing.clone(),
            });
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_start(total);
        }

        // ── Render ───────────────────────────────────────────────────────
        let render_start = Instant::now();
        let mut jobs: Vec<Job> = stream::iter(
            inputs
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, path)| self.render_one(index, path, total)),
        )
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        jobs.sort_by_key(|job| job.index);
        let success_count = jobs.iter().filter(|job| job.result.is_ok()).count();

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(total, success_count);
        }

        let mut fragments = Vec::with_capacity(total);
        let mut files = Vec::with_capacity(total);
        for job in jobs {
            // Sorted by index, so the first error seen is the lowest index.
            let bytes = job.result?;
            files.push(FileResult {
                index: job.index,
                path: job.path.clone(),
                fragment_bytes: bytes.len(),
                duration_ms: job.elapsed.as_millis() as u64,
            });
            fragments.push((job.path, bytes));
        }
        info!("Rendered {} file(s) in {}ms", total, render_duration_ms);

        // ── Merge ────────────────────────────────────────────────────────
        let merge_start = Instant::now();
        let title = self.config.title.clone();
        let merged =
            tokio::task::spawn_blocking(move || merge_fragments(&fragments, title.as_deref()))
                .await
                .map_err(|e| Svg2PdfError::Internal(format!("Merge task panicked: {e}")))??;
        let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

        let stats = ConversionStats {
            total_files: total,
            page_count: merged.page_count,
            output_bytes: merged.bytes.len(),
            renderer: self.renderer.name().to_string(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            render_duration_ms,
            merge_duration_ms,
        };

        info!(
            "Merged {} page(s), {} bytes, {}ms total",
            stats.page_count, stats.output_bytes, stats.total_duration_ms
        );

        Ok(ConversionOutput {
            pdf: merged.bytes,
            files,
            stats,
        })
    }

    /// Convert `inputs` and write the merged PDF to `output_path`.
    ///
    /// The destination is replaced atomically: on any failure it is left
    /// untouched.
    pub async fn run_to_file(
        &self,
        inputs: &[PathBuf],
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionStats, Svg2PdfError> {
        let output = self.run(inputs).await?;
        let path = output_path.as_ref().to_path_buf();
        let pdf = output.pdf;

        tokio::task::spawn_blocking(move || write_atomically(&path, &pdf))
            .await
            .map_err(|e| Svg2PdfError::Internal(format!("Write task panicked: {e}")))??;

        Ok(output.stats)
    }

    async fn render_one(&self, index: usize, path: PathBuf, total: usize) -> Job {
        let cb = self.config.progress_callback.clone();
        if let Some(ref cb) = cb {
            cb.on_file_start(index + 1, total, &path);
        }
        debug!("Rendering #{} {}", index + 1, path.display());

        let started = Instant::now();
        let renderer = Arc::clone(&self.renderer);
        let job_path = path.clone();
        // Each job writes into its own buffer; nothing is shared until merge.
        let rendered = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            renderer.render(&job_path, &mut buf).map(|()| buf)
        })
        .await;

        let result = match rendered {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(source)) => Err(Svg2PdfError::Render {
                index,
                path: path.clone(),
                source,
            }),
            Err(e) => Err(Svg2PdfError::Internal(format!("Render task panicked: {e}"))),
        };

        if let Some(ref cb) = cb {
            match &result {
                Ok(bytes) => cb.on_file_complete(index + 1, total, bytes.len()),
                Err(e) => cb.on_file_error(index + 1, total, &e.to_string()),
            }
        }
        if let Err(ref e) = result {
            warn!("{}", e);
        }

        Job {
            index,
            path,
            elapsed: started.elapsed(),
            result,
        }
    }
}

/// Convert `inputs` and return the merged document in memory.
///
/// # Example
/// ```rust,no_run
/// use svgpdf_merge::{convert, ConversionConfig};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = vec![PathBuf::from("cover.svg"), PathBuf::from("page1.svg")];
/// let output = convert(&inputs, ConversionConfig::default()).await?;
/// std::fs::write("book.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    inputs: &[PathBuf],
    config: ConversionConfig,
) -> Result<ConversionOutput, Svg2PdfError> {
    build_pipeline(config).await?.run(inputs).await
}

/// Convert `inputs` and write the merged PDF atomically to `output_path`.
pub async fn convert_to_file(
    inputs: &[PathBuf],
    output_path: impl AsRef<Path>,
    config: ConversionConfig,
) -> Result<ConversionStats, Svg2PdfError> {
    build_pipeline(config)
        .await?
        .run_to_file(inputs, output_path)
        .await
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    inputs: &[PathBuf],
    output_path: impl AsRef<Path>,
    config: ConversionConfig,
) -> Result<ConversionStats, Svg2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Svg2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_file(inputs, output_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the blocking renderer probe off the async worker threads.
async fn build_pipeline(config: ConversionConfig) -> Result<ConversionPipeline, Svg2PdfError> {
    tokio::task::spawn_blocking(move || ConversionPipeline::new(config))
        .await
        .map_err(|e| Svg2PdfError::Internal(format!("Renderer probe panicked: {e}")))?
}

/// Write `bytes` to a temp file beside `path`, then rename it into place.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Svg2PdfError> {
    let failed = |source: std::io::Error| Svg2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(failed)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".svgpdf-")
        .suffix(".pdf.tmp")
        .tempfile_in(&parent)
        .map_err(failed)?;
    tmp.write_all(bytes).map_err(failed)?;
    tmp.as_file().sync_all().map_err(failed)?;

    // Temp files are created owner-only; give the result normal permissions.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(failed)?;
    }

    tmp.persist(path).map_err(|e| failed(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
