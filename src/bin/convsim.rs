//! CLI binary for convsim.
//!
//! A thin shim over the library crate: maps CLI flags to `SessionConfig` and
//! `ConversionOptions`, drives one session to completion, and writes the
//! artifact to disk.

use anyhow::{Context, Result};
use clap::Parser;
use convsim::pipeline::simulate::{DEFAULT_SMOOTH_DURATION, DEFAULT_SMOOTH_INTERVAL, DEFAULT_STEP_INTERVAL};
use convsim::{
    write_artifact, ConversionOptions, ConversionSession, ConvertedArtifact, ObserverHandle, ProgressSchedule,
    ProgressTick, Quality, SelectOutcome, SelectedFile, SessionConfig, SessionObserver, SessionState, ValidationError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICK_STRINGS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one progress bar from 0 to 100 plus a log line per
/// lifecycle event.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICK_STRINGS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading file metadata…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICK_STRINGS);

        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_elapsed();
    }
}

impl SessionObserver for CliObserver {
    fn on_validation_rejected(&self, _error: &ValidationError) {
        self.bar.finish_and_clear();
    }

    fn on_file_ready(&self, file: &SelectedFile) {
        let mime = if file.mime_type.is_empty() {
            "unknown type"
        } else {
            file.mime_type.as_str()
        };
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&file.name),
            dim(&format!("{} · {}", file.display_size(), mime)),
        ));
    }

    fn on_conversion_started(&self, options: &ConversionOptions) {
        self.activate_bar();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting to {} ({} quality, {} size)…",
                options.target_format.to_uppercase(),
                options.quality,
                options.target_size
            ))
        ));
    }

    fn on_progress(&self, tick: &ProgressTick) {
        self.bar.set_position(u64::from(tick.percentage));
        self.bar.set_message(tick.phase_label.clone());
    }

    fn on_conversion_completed(&self, artifact: &ConvertedArtifact) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} ready  {}",
            green("✔"),
            bold(&artifact.suggested_file_name),
            dim(&format!("{} bytes", artifact.len())),
        );
    }

    fn on_cleared(&self) {
        self.bar.abandon_with_message("cancelled");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a video to GIF, artifact written to the current directory
  convsim holiday.mov --format gif

  # High quality, fixed output directory
  convsim track.wav --format mp3 --quality high -o out/

  # Smooth progress instead of discrete steps
  convsim photo.png --format webp --smooth

  # Machine-readable session snapshot
  convsim report.pdf --format txt --json

VALIDATION:
  Files larger than --max-size-mb are rejected. A file whose type can be
  guessed from its extension must be video/*, audio/*, image/*,
  application/* or text/*; files of unknown type are accepted.

ENVIRONMENT VARIABLES:
  CONVSIM_FORMAT        Default target format
  CONVSIM_QUALITY       Default quality (low, medium, high)
  CONVSIM_OUTPUT_DIR    Default output directory
  RUST_LOG              Log filter (overrides -v / -q)
"#;

/// Validate a file and run a simulated conversion on it.
#[derive(Parser, Debug)]
#[command(
    name = "convsim",
    version,
    about = "Validate a file and run a simulated conversion on it",
    long_about = "Validate a local file against size and type rules, run a simulated \
conversion with live progress, and write a placeholder artifact named \
<stem>_converted.<format>.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File to convert.
    input: PathBuf,

    /// Target format token (e.g. mp4, gif, mp3, webp).
    #[arg(short, long, env = "CONVSIM_FORMAT", default_value = "mp4")]
    format: String,

    /// Output quality.
    #[arg(long, env = "CONVSIM_QUALITY", value_enum, default_value = "medium")]
    quality: QualityArg,

    /// Target size token (e.g. original, 1080p, 720p).
    #[arg(long, env = "CONVSIM_SIZE", default_value = "original")]
    size: String,

    /// Directory the artifact is written to.
    #[arg(short, long, env = "CONVSIM_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Linear 0→100 progress instead of discrete steps.
    #[arg(long, env = "CONVSIM_SMOOTH")]
    smooth: bool,

    /// Milliseconds between progress updates (default 800, or 50 with --smooth).
    #[arg(long, env = "CONVSIM_INTERVAL_MS",
          value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,

    /// Maximum accepted file size in MiB.
    #[arg(long, env = "CONVSIM_MAX_SIZE_MB", default_value_t = 500,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size_mb: u64,

    /// Print a JSON session snapshot instead of the artifact path.
    #[arg(long, env = "CONVSIM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CONVSIM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONVSIM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONVSIM_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum QualityArg {
    Low,
    Medium,
    High,
}

impl From<QualityArg> for Quality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Low => Quality::Low,
            QualityArg::Medium => Quality::Medium,
            QualityArg::High => Quality::High,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let observer: Option<ObserverHandle> = if show_progress {
        Some(CliObserver::new() as ObserverHandle)
    } else {
        None
    };
    let config = build_config(&cli, observer)?;
    let options = ConversionOptions::builder()
        .target_format(cli.format.clone())
        .quality(cli.quality.clone().into())
        .target_size(cli.size.clone())
        .build()
        .context("Invalid conversion options")?;

    // ── Intake ───────────────────────────────────────────────────────────
    let file = SelectedFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let mut session = ConversionSession::new(config);
    if let SelectOutcome::Rejected(e) = session.select_file(Some(file))? {
        eprintln!("{} {}", red("✘"), e);
        anyhow::bail!("File rejected ({})", e.reason());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    session
        .start_conversion(&options)
        .context("Failed to start conversion")?;

    let settled = tokio::select! {
        res = session.run_until_settled() => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    let state = match settled {
        Some(res) => res.context("Conversion failed")?,
        None => {
            session.remove_file()?;
            anyhow::bail!("Interrupted");
        }
    };
    if state != SessionState::Completed {
        anyhow::bail!("Conversion ended in unexpected state '{}'", state);
    }

    // ── Output ───────────────────────────────────────────────────────────
    let artifact = session
        .artifact()
        .context("Completed session holds no artifact")?;
    let path = write_artifact(artifact, &cli.output_dir)
        .await
        .context("Failed to save artifact")?;

    if cli.json {
        let report = serde_json::json!({
            "session": session.snapshot(),
            "output_path": path,
        });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise snapshot")?;
        println!("{json}");
    } else {
        println!("{}", path.display());
        if !cli.quiet && !show_progress {
            eprintln!(
                "Converted {} to {} ({} bytes)",
                artifact.source_name,
                artifact.suggested_file_name,
                artifact.len()
            );
        }
    }

    Ok(())
}

/// Map CLI args to `SessionConfig`.
fn build_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<SessionConfig> {
    let schedule = if cli.smooth {
        ProgressSchedule::Smooth {
            duration: DEFAULT_SMOOTH_DURATION,
            interval: cli
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SMOOTH_INTERVAL),
        }
    } else {
        ProgressSchedule::Stepped {
            interval: cli
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STEP_INTERVAL),
        }
    };

    let mut builder = SessionConfig::builder()
        .max_file_size_bytes(cli.max_size_mb.saturating_mul(1024 * 1024))
        .schedule(schedule);

    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
