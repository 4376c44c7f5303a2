//! SVG → PDF rendering: one SVG file in, one PDF fragment out.
//!
//! Two renderers implement [`SvgRenderer`]:
//!
//! * [`ExternalToolRenderer`] runs `inkscape` (or a compatible program) and
//!   streams its standard output into the sink.
//! * [`EmbeddedRenderer`] transcodes in-process with `svg2pdf`.
//!
//! [`resolve_renderer`] picks one per pipeline. The external probe runs once,
//! when the pipeline is built, and the chosen renderer is shared by every job.
//!
//! Both renderers are blocking; the pipeline calls them from
//! `spawn_blocking` threads.

use crate::config::{ConversionConfig, RendererPreference};
use crate::error::{RenderError, Svg2PdfError};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use svg2pdf::usvg;
use tracing::{debug, info, warn};

/// Converts a single SVG file into a complete PDF document.
pub trait SvgRenderer: Send + Sync {
    /// Render `input`, writing the PDF bytes to `sink`.
    ///
    /// Bytes may already have been written when an error is returned; the
    /// caller owns the sink and must discard partial output.
    fn render(&self, input: &Path, sink: &mut dyn Write) -> Result<(), RenderError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

// ── External tool ────────────────────────────────────────────────────────

/// Renders through an external program invoked as
/// `<program> -o - --export-type pdf -- <input>`.
#[derive(Debug, Clone)]
pub struct ExternalToolRenderer {
    program: String,
    max_exit_code: i32,
}

impl ExternalToolRenderer {
    pub fn new(program: impl Into<String>, max_exit_code: i32) -> Self {
        Self {
            program: program.into(),
            max_exit_code,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn accepts(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| c <= self.max_exit_code)
    }
}

impl SvgRenderer for ExternalToolRenderer {
    fn render(&self, input: &Path, sink: &mut dyn Write) -> Result<(), RenderError> {
        debug!("Running {} on {}", self.program, input.display());

        let mut child = Command::new(&self.program)
            .args(["-o", "-", "--export-type", "pdf", "--"])
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain stderr on its own thread so a chatty tool cannot block on a
        // full pipe while we are reading stdout.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                // Tools may emit non-UTF-8 diagnostics; keep them lossily.
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, sink),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "child stdout was not captured",
            )),
        };

        if let Err(e) = copied {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::Io(e));
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if self.accepts(status.code()) {
            if status.code() != Some(0) {
                debug!(
                    "{} exited with tolerated code {:?} for {}",
                    self.program,
                    status.code(),
                    input.display()
                );
            }
            Ok(())
        } else {
            Err(RenderError::ToolFailed {
                program: self.program.clone(),
                code: status.code(),
                stderr,
            })
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Run `<program> --version` and report whether it exits within the ceiling.
///
/// Any spawn failure counts as "not available".
pub fn probe_external_tool(program: &str, max_exit_code: i32) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()
        .and_then(|s| s.code())
        .is_some_and(|code| code <= max_exit_code)
}

// ── Embedded transcoder ──────────────────────────────────────────────────

/// In-process renderer backed by `svg2pdf`.
///
/// System fonts are loaded once at construction and shared across renders.
pub struct EmbeddedRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl EmbeddedRenderer {
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        debug!("Embedded renderer loaded {} font faces", fontdb.len());
        Self {
            fontdb: Arc::new(fontdb),
        }
    }
}

impl Default for EmbeddedRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SvgRenderer for EmbeddedRenderer {
    fn render(&self, input: &Path, sink: &mut dyn Write) -> Result<(), RenderError> {
        let data = std::fs::read(input).map_err(|source| RenderError::ReadInput {
            path: input.to_path_buf(),
            source,
        })?;

        let options = usvg::Options {
            resources_dir: input.parent().map(Path::to_path_buf),
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };

        let tree = usvg::Tree::from_data(&data, &options)
            .map_err(|e| RenderError::Transcode(e.to_string()))?;

        let pdf = svg2pdf::to_pdf(
            &tree,
            svg2pdf::ConversionOptions::default(),
            svg2pdf::PageOptions::default(),
        )
        .map_err(|e| RenderError::Transcode(e.to_string()))?;

        sink.write_all(&pdf)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "svg2pdf"
    }
}

// ── Selection ────────────────────────────────────────────────────────────

/// Choose the renderer for one pipeline according to `config.renderer`.
///
/// # Errors
/// [`Svg2PdfError::InvalidConfig`] when [`RendererPreference::External`] is
/// requested but the probe fails.
pub fn resolve_renderer(config: &ConversionConfig) -> Result<Arc<dyn SvgRenderer>, Svg2PdfError> {
    let program = config.external_program.as_str();
    match config.renderer {
        RendererPreference::Embedded => {
            info!("Using embedded SVG transcoder");
            Ok(Arc::new(EmbeddedRenderer::new()))
        }
        RendererPreference::External => {
            if probe_external_tool(program, config.max_exit_code) {
                info!("Using external renderer '{}'", program);
                Ok(Arc::new(ExternalToolRenderer::new(program, config.max_exit_code)))
            } else {
                Err(Svg2PdfError::InvalidConfig(format!(
                    "External renderer '{program}' is not available"
                )))
            }
        }
        RendererPreference::Auto => {
            if probe_external_tool(program, config.max_exit_code) {
                info!("Using external renderer '{}'", program);
                Ok(Arc::new(ExternalToolRenderer::new(program, config.max_exit_code)))
            } else {
                warn!(
                    "'{}' not found, falling back to embedded SVG transcoder",
                    program
                );
                Ok(Arc::new(EmbeddedRenderer::new()))
            }
        }
    }
}
