//! CLI binary for molsnap.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, drives a `Session` through intake, extraction and
//! conversion, and prints the results table.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use molsnap::config::{DECIMER_URL_ENV, MODEL_ENV, MOLSNAP_URL_ENV, TIMEOUT_ENV};
use molsnap::parse::{parse_page_range, selectable_pages};
use molsnap::state::ToggleAll;
use molsnap::{
    intake, ClientConfig, ConversionResult, CopyField, PredictionEndpoint, ResultStatus,
    ResultsSummary, Screen, Session, SessionObserver, SystemClipboard,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Spinner shown while a request is outstanding.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }

    fn spin(&self, prefix: &'static str, msg: String) {
        self.bar.reset_elapsed();
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }
}

impl SessionObserver for CliObserver {
    fn on_parse_start(&self, start_page: usize, end_page: usize) {
        self.spin("Extracting", format!("pages {start_page}-{end_page}…"));
    }

    fn on_parse_complete(&self, segment_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} segment images extracted", green("✔"), bold(&segment_count.to_string()));
    }

    fn on_conversion_start(&self, file_count: usize) {
        let noun = if file_count == 1 { "file" } else { "files" };
        self.spin("Converting", format!("{file_count} {noun}…"));
    }

    fn on_segment_fetched(&self, path: &str, index: usize, total: usize) {
        self.bar
            .set_message(format!("downloaded {}/{}  {}", index + 1, total, dim(path)));
    }

    fn on_conversion_complete(&self, result_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} structures recognised", green("✔"), bold(&result_count.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.bar.finish_and_clear();
        let first = message.lines().next().unwrap_or(message);
        eprintln!("{} {}", red("✘"), red(first));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check what a file looks like to the uploader
  molsnap inspect paper.pdf

  # Recognise a single structure image
  molsnap convert benzoic_acid.png

  # Segment pages 2-4 of a PDF and list the images found
  molsnap extract paper.pdf --start 2 --end 4

  # Segment, pick images 1 and 3, convert them, export CSV
  molsnap convert paper.pdf --start 2 --end 4 --select 1,3 --csv results/

  # Everything on page 1, JSON on stdout
  molsnap convert paper.pdf --end 1 --select all --json > results.json

  # Prediction without the extra rendering step
  molsnap convert mol.png --endpoint only --model molnextr_best.pth

ENVIRONMENT VARIABLES:
  DECIMER_API_URL         Segmentation / static-asset service base URL (required)
  MOLSNAP_API_URL         Prediction service base URL (required)
  MOLSNAP_MODEL           Default model checkpoint (default: molnextr_best.pth)
  MOLSNAP_TIMEOUT_SECS    Per-request timeout in seconds (default: 120)
  RUST_LOG                Override the log filter (e.g. molsnap=debug)
"#;

/// Recognise chemical structures in images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "molsnap",
    version,
    about = "Recognise chemical structures in images and PDFs",
    long_about = "Upload a structure image or a PDF to the DECIMER segmentation and MolSnap \
prediction services and get SMILES / SELFIES back, with per-structure confidence and CSV export.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Segmentation service base URL.
    #[arg(long, global = true, env = DECIMER_URL_ENV)]
    decimer_url: Option<String>,

    /// Prediction service base URL.
    #[arg(long, global = true, env = MOLSNAP_URL_ENV)]
    molsnap_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = TIMEOUT_ENV, default_value_t = 120)]
    timeout: u64,

    /// Retries on transport errors, timeouts, 429 and 5xx.
    #[arg(long, global = true, env = "MOLSNAP_MAX_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MOLSNAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "MOLSNAP_QUIET")]
    quiet: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "MOLSNAP_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how a file would be accepted (no network).
    Inspect {
        file: PathBuf,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Segment a PDF page range into structure images.
    Extract {
        pdf: PathBuf,
        #[command(flatten)]
        pages: PageArgs,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recognise structures and print the results table.
    Convert(ConvertArgs),
}

#[derive(Args, Debug, Clone)]
struct PageArgs {
    /// First page to segment.
    #[arg(long, default_value_t = 1)]
    start: usize,

    /// Last page to segment. Default: start + 1, capped at the page count.
    #[arg(long)]
    end: Option<usize>,

    /// Page range shorthand, e.g. 2-4 (overrides --start/--end).
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pages: Option<String>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Image or PDF to convert.
    file: PathBuf,

    #[command(flatten)]
    pages: PageArgs,

    /// Segment images to convert (1-based, e.g. 1,3 or all). PDF only.
    #[arg(long)]
    select: Option<String>,

    /// Model checkpoint.
    #[arg(long, env = MODEL_ENV)]
    model: Option<String>,

    /// Prediction route for single-file conversion.
    #[arg(long, value_enum, default_value = "full")]
    endpoint: EndpointArg,

    /// Write results CSV to this file or directory.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print results as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Copy the SMILES of this result row (1-based) to the clipboard.
    #[arg(long)]
    copy: Option<usize>,
}

#[derive(ValueEnum, Clone, Debug)]
enum EndpointArg {
    Full,
    Only,
}

impl From<EndpointArg> for PredictionEndpoint {
    fn from(v: EndpointArg) -> Self {
        match v {
            EndpointArg::Full => PredictionEndpoint::Full,
            EndpointArg::Only => PredictionEndpoint::Only,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; library INFO logs only show without it.
    let show_progress = !g.quiet && !g.no_progress;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
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

    match cli.command {
        Command::Inspect { ref file, json } => run_inspect(file, json),
        Command::Extract {
            ref pdf,
            ref pages,
            json,
        } => {
            let session = Session::new(build_config(g, None, None, show_progress)?)
                .context("Failed to create HTTP client")?;
            run_extract(&session, pdf, pages, json).await
        }
        Command::Convert(ref args) => {
            let config = build_config(
                g,
                args.model.clone(),
                Some(args.endpoint.clone().into()),
                show_progress,
            )?;
            let session = Session::new(config).context("Failed to create HTTP client")?;
            run_convert(&session, args, g.quiet).await
        }
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(
    g: &GlobalArgs,
    model: Option<String>,
    endpoint: Option<PredictionEndpoint>,
    show_progress: bool,
) -> Result<ClientConfig> {
    let decimer_url = g
        .decimer_url
        .clone()
        .with_context(|| format!("No segmentation service URL: pass --decimer-url or set {DECIMER_URL_ENV}"))?;
    let molsnap_url = g
        .molsnap_url
        .clone()
        .with_context(|| format!("No prediction service URL: pass --molsnap-url or set {MOLSNAP_URL_ENV}"))?;

    let mut builder = ClientConfig::builder()
        .decimer_url(decimer_url)
        .molsnap_url(molsnap_url)
        .request_timeout_secs(g.timeout)
        .max_retries(g.retries);

    if let Some(model) = model {
        builder = builder.default_model(model);
    }
    if let Some(endpoint) = endpoint {
        builder = builder.prediction_endpoint(endpoint);
    }
    if show_progress {
        builder = builder.observer(CliObserver::new());
    }

    builder.build().context("Invalid configuration")
}

fn run_inspect(file: &Path, json: bool) -> Result<()> {
    let candidate = intake::FileCandidate::from_path(file)?;
    let selection = intake::accept(candidate)
        .with_context(|| format!("'{}' cannot be uploaded", file.display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&selection).context("Failed to serialize selection")?
        );
        return Ok(());
    }

    println!("File:         {}", selection.file_name);
    println!("Type:         {}", selection.mime_type);
    println!("Size:         {:.2} MB", selection.size_megabytes());
    if let Some(pages) = selection.page_count {
        let sel = selectable_pages(Some(pages));
        println!("Pages:        {}", pages);
        println!("Selectable:   {}-{}", sel.start(), sel.end());
    }
    Ok(())
}

/// Select `file`, apply the page range and run extraction.
async fn select_and_extract(session: &Session, file: &Path, pages: &PageArgs) -> Result<usize> {
    let selection = session
        .select_path(file)
        .with_context(|| format!("'{}' cannot be uploaded", file.display()))?;
    session.navigate(Screen::Upload)?;

    if !selection.is_pdf() {
        bail!("'{}' is not a PDF; segment extraction needs a PDF", file.display());
    }

    let (start, end) = resolve_pages(pages, selection.page_count)?;
    session
        .set_page_range(start, end)
        .context("Invalid page range")?;

    let segments = session.parse().await.context("Segment extraction failed")?;
    Ok(segments.images.len())
}

fn resolve_pages(pages: &PageArgs, page_count: Option<usize>) -> Result<(usize, usize)> {
    if let Some(ref range) = pages.pages {
        return Ok(parse_page_range(range)?);
    }
    let max = *selectable_pages(page_count).end();
    let end = pages.end.unwrap_or_else(|| (pages.start + 1).min(max));
    Ok((pages.start, end))
}

async fn run_extract(session: &Session, pdf: &Path, pages: &PageArgs, json: bool) -> Result<()> {
    select_and_extract(session, pdf, pages).await?;
    let state = session.snapshot();

    if json {
        let out = serde_json::json!({
            "images": state.selection.candidates,
            "checkpoints": state.selection.checkpoints,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialize segments")?
        );
        return Ok(());
    }

    for (i, path) in state.selection.candidates.iter().enumerate() {
        println!("{:>3}  {}", i + 1, path);
    }
    if !state.selection.checkpoints.is_empty() {
        println!();
        println!("Checkpoints:");
        for c in &state.selection.checkpoints {
            let marker = if *c == state.selection.model_id { "*" } else { " " };
            println!("  {marker} {c}");
        }
    }
    Ok(())
}

async fn run_convert(session: &Session, args: &ConvertArgs, quiet: bool) -> Result<()> {
    let results = if let Some(ref select) = args.select {
        let found = select_and_extract(session, &args.file, &args.pages).await?;
        if found == 0 {
            bail!("No structures were found on the selected pages");
        }
        apply_selection(session, select, found)?;
        session
            .convert_selected()
            .await
            .context("Conversion failed")?
    } else {
        session
            .select_path(&args.file)
            .with_context(|| format!("'{}' cannot be uploaded", args.file.display()))?;
        session.navigate(Screen::Upload)?;
        session.convert().await.context("Conversion failed")?
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?
        );
    } else {
        print_table(&results);
        if !quiet {
            print_summary(&session.summary());
        }
    }

    if let Some(ref path) = args.csv {
        let written = session
            .export_csv(path)
            .await
            .context("CSV export failed")?;
        if !quiet {
            eprintln!("{} CSV  →  {}", green("✔"), bold(&written.display().to_string()));
        }
    }

    if let Some(row) = args.copy {
        let result = row
            .checked_sub(1)
            .and_then(|i| results.get(i))
            .with_context(|| format!("No result row {row} (have {})", results.len()))?;
        let clipboard = SystemClipboard::new().context("Clipboard unavailable")?;
        let key = session
            .copy_field(&clipboard, &result.id, CopyField::Smiles)
            .context("Copy failed")?;
        if !quiet {
            eprintln!("{} Copied {}", green("✔"), dim(&key.to_string()));
        }
    }

    Ok(())
}

/// Apply `--select` (`all` or 1-based indices) to the extracted candidates.
fn apply_selection(session: &Session, select: &str, found: usize) -> Result<()> {
    if select.trim().eq_ignore_ascii_case("all") {
        if session.toggle_all()? == ToggleAll::DeselectAll {
            // Already fully selected before the toggle; put it back.
            session.toggle_all()?;
        }
        return Ok(());
    }

    let candidates = session.snapshot().selection.candidates;
    for part in select.split(',') {
        let n: usize = part
            .trim()
            .parse()
            .with_context(|| format!("Invalid image number: '{}'", part.trim()))?;
        let id = n
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .with_context(|| format!("Image number {n} is out of range (1-{found})"))?;
        if !session.snapshot().selection.is_selected(id) {
            session.toggle_image(id.clone())?;
        }
    }
    Ok(())
}

fn print_table(results: &[ConversionResult]) {
    println!(
        "{}",
        bold(&format!(
            "{:<28} {:<40} {:>5} {:>7}  {}",
            "File Name", "SMILES", "Conf", "Time", "Status"
        ))
    );
    for r in results {
        let conf = r
            .confidence
            .map(|c| format!("{c}%"))
            .unwrap_or_else(|| "-".into());
        let status = match r.status {
            ResultStatus::Success => green("success"),
            ResultStatus::Warning => yellow("warning"),
            ResultStatus::Error => red("error"),
        };
        println!(
            "{:<28} {:<40} {:>5} {:>6.1}s  {}",
            truncate(&r.file_name, 28),
            truncate(&r.smiles, 40),
            conf,
            r.processing_time,
            status
        );
    }
}

fn print_summary(summary: &ResultsSummary) {
    let conf = summary
        .mean_confidence
        .map(|c| format!("{c}%"))
        .unwrap_or_else(|| "-".into());
    let time = summary
        .mean_processing_time
        .map(|t| format!("{t:.1}s"))
        .unwrap_or_else(|| "-".into());
    eprintln!(
        "{} {} results  {} successful  {} avg confidence  {} avg time",
        cyan("◆"),
        bold(&summary.count.to_string()),
        summary.success_count,
        conf,
        time,
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{head}\u{2026}")
}
