//! CLI binary for svgpdf-merge.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, resolves the input list and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use svgpdf_merge::{
    convert_to_file, select_inputs, ConversionConfig, ConversionProgressCallback,
    ProgressCallback, RendererPreference, TimeWindow, TimeWindowParser,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per file. Files finish out of order,
/// so elapsed time is tracked per input index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, index: usize, _total: usize, path: &Path) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(file_label(path));
    }

    fn on_file_complete(&self, index: usize, total: usize, pdf_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{pdf_len:>7} B")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed > 0 {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge files in the given order
  svgpdf -o book.pdf svg-to-pdf cover.svg p1.svg p2.svg

  # Every SVG in the current directory modified in the last day
  svgpdf -o today.pdf svg-to-pdf --since 1d

  # A window between two points in local time, with a title
  svgpdf -o week.pdf svg-to-pdf --since 2024-03-04T00:00:00 --till 2024-03-11T00:00:00 \
      --title "Week 10"

  # Never spawn inkscape
  svgpdf -o out.pdf svg-to-pdf --renderer embedded *.svg

TIME EXPRESSIONS:
  [N:]N{d|h|m|s}         relative to now; "1:12h" is 36 hours, "2d" two days
  yyyy-MM-ddThh:mm:ss    absolute, in the local timezone
  --since is inclusive, --till is exclusive.

ENVIRONMENT VARIABLES:
  SVGPDF_OUTPUT, SVGPDF_TITLE, SVGPDF_SINCE, SVGPDF_TILL, SVGPDF_RENDERER,
  SVGPDF_EXTERNAL_PROGRAM, SVGPDF_MAX_EXIT_CODE, SVGPDF_CONCURRENCY, SVGPDF_JSON
  RUST_LOG                 Override the log filter (e.g. svgpdf_merge=debug)
"#;

/// Convert SVG files to PDF and merge them into one document.
#[derive(Parser, Debug)]
#[command(
    name = "svgpdf",
    version,
    about = "Convert SVG files to PDF and merge them into one document",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path of the merged PDF.
    #[arg(short, long, global = true, env = "SVGPDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SVGPDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SVGPDF_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "SVGPDF_NO_PROGRESS")]
    no_progress: bool,

    /// Print run statistics as JSON on stdout.
    #[arg(long, global = true, env = "SVGPDF_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert SVG files to PDF and merge them in order.
    SvgToPdf(SvgToPdfArgs),
}

#[derive(Args, Debug)]
struct SvgToPdfArgs {
    /// Title of the merged document.
    #[arg(long, env = "SVGPDF_TITLE")]
    title: Option<String>,

    /// Only include files modified at or after this time.
    #[arg(long, env = "SVGPDF_SINCE")]
    since: Option<String>,

    /// Only include files modified before this time (requires --since).
    #[arg(long, env = "SVGPDF_TILL")]
    till: Option<String>,

    /// Renderer: auto (inkscape if found), external, embedded.
    #[arg(long, env = "SVGPDF_RENDERER", value_enum, default_value = "auto")]
    renderer: RendererArg,

    /// External renderer program.
    #[arg(long, env = "SVGPDF_EXTERNAL_PROGRAM", default_value = "inkscape")]
    external_program: String,

    /// Highest exit code of the external renderer still treated as success.
    #[arg(long, env = "SVGPDF_MAX_EXIT_CODE", default_value_t = svgpdf_merge::config::DEFAULT_MAX_EXIT_CODE)]
    max_exit_code: i32,

    /// Number of files converted at once (default: CPU count).
    #[arg(short, long, env = "SVGPDF_CONCURRENCY")]
    concurrency: Option<usize>,

    /// SVG files, merged in the given order.
    inputs: Vec<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RendererArg {
    Auto,
    External,
    Embedded,
}

impl From<RendererArg> for RendererPreference {
    fn from(v: RendererArg) -> Self {
        match v {
            RendererArg::Auto => RendererPreference::Auto,
            RendererArg::External => RendererPreference::External,
            RendererArg::Embedded => RendererPreference::Embedded,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would tear the progress bar, so it gets `error` only.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let Command::SvgToPdf(args) = &cli.command;
    let output_path = cli
        .output
        .clone()
        .context("Output file is required (-o/--output)")?;

    // ── Resolve inputs ───────────────────────────────────────────────────
    let parser = TimeWindowParser::default();
    let window = TimeWindow::resolve(
        &parser,
        args.since.as_deref(),
        args.till.as_deref(),
        &chrono::Local,
    )?;
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    let inputs = select_inputs(&args.inputs, &window, &cwd)?;

    if inputs.is_empty() && !cli.quiet {
        eprintln!(
            "{} no SVG files modified in the given window; writing an empty document",
            cyan("⚠")
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress && !inputs.is_empty() {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let stats = convert_to_file(&inputs, &output_path, config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} files  {} pages  {}ms  via {}  →  {}",
            green("✔"),
            stats.total_files,
            stats.page_count,
            stats.total_duration_ms,
            dim(&stats.renderer),
            bold(&output_path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(args: &SvgToPdfArgs, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .renderer(args.renderer.into())
        .external_program(args.external_program.clone())
        .max_exit_code(args.max_exit_code);

    if let Some(n) = args.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref title) = args.title {
        builder = builder.title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_full_invocation() {
        let cli = Cli::try_parse_from([
            "svgpdf",
            "-o",
            "out.pdf",
            "svg-to-pdf",
            "--title",
            "Book",
            "--since",
            "1d",
            "--renderer",
            "embedded",
            "-c",
            "2",
            "a.svg",
            "b.svg",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.pdf")));
        let Command::SvgToPdf(args) = cli.command;
        assert_eq!(args.title.as_deref(), Some("Book"));
        assert_eq!(args.since.as_deref(), Some("1d"));
        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.inputs, vec![PathBuf::from("a.svg"), PathBuf::from("b.svg")]);

        let config = build_config(&args, None).unwrap();
        assert_eq!(config.renderer, RendererPreference::Embedded);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.title.as_deref(), Some("Book"));
    }

    #[test]
    fn output_after_subcommand_is_accepted() {
        let cli = Cli::try_parse_from(["svgpdf", "svg-to-pdf", "-o", "x.pdf", "a.svg"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("x.pdf")));
    }

    #[test]
    fn zero_concurrency_is_rejected_by_config() {
        let cli =
            Cli::try_parse_from(["svgpdf", "-o", "o.pdf", "svg-to-pdf", "-c", "0", "a.svg"]).unwrap();
        let Command::SvgToPdf(args) = cli.command;
        assert!(build_config(&args, None).is_err());
    }
}
