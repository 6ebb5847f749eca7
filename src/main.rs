use anyhow::{Context, Result};
use autohdr::app::{AutoHdrSession, KeyboardInputHandler};
use autohdr::capture::CaptureOutcome;
use autohdr::composition::CompositionOutcome;
use autohdr::config::AutoHdrConfig;
use autohdr::error::EventBusError;
use autohdr::events::EventFilter;
use autohdr::sequence::AnalysisOutcome;
use autohdr::sequence_file::{load_sequence, save_sequence};
use autohdr::shots::{Criteria, Sequence};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "autohdr")]
#[command(about = "Automatic HDR bracketing driven by live-view exposure analysis")]
#[command(version)]
#[command(long_about = "Measures the scene through the camera live view to find the darkest \
and brightest exposures worth shooting, spreads intermediate shots between them, captures the \
bracket and optionally merges it with an external HDR tool.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "autohdr.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Accepted over-exposed percentage in the darkest shot
    #[arg(long, value_name = "PCT", allow_negative_numbers = true)]
    lower: Option<i64>,

    /// Accepted under-exposed percentage in the brightest shot
    #[arg(long, value_name = "PCT", allow_negative_numbers = true)]
    upper: Option<i64>,

    /// Maximum number of shots, boundaries included
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    max_shots: Option<i64>,

    /// Save the computed sequence to this file
    #[arg(long, value_name = "PATH")]
    save_sequence: Option<PathBuf>,

    /// Capture a previously saved sequence instead of analyzing the scene
    #[arg(long, value_name = "PATH")]
    load_sequence: Option<PathBuf>,

    /// Stop after the analysis
    #[arg(long)]
    no_capture: bool,

    /// Merge the captured shots with the configured HDR tool
    #[arg(long)]
    compose: bool,

    /// Press 'c' or Esc to cancel, 'q' to quit
    #[arg(long)]
    keyboard: bool,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    events_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting AutoHDR v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = AutoHdrConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let criteria = Criteria::new(
        args.lower.unwrap_or(config.analysis.lower_criteria),
        args.upper.unwrap_or(config.analysis.upper_criteria),
        args.max_shots.unwrap_or(config.analysis.max_shots),
    );

    let session = AutoHdrSession::new(config).context("Failed to set up the camera session")?;
    let signal_handlers = session.spawn_signal_handlers();

    let printer = spawn_event_printer(&session, args.events_json);

    let keyboard = if args.keyboard {
        let handler = Arc::new(KeyboardInputHandler::new(
            session.activity_tracker(),
            session.shutdown_token(),
            session.event_bus(),
        ));
        handler.start();
        Some(handler)
    } else {
        None
    };

    let result = run(&args, &session, criteria).await;

    if let Some(handler) = keyboard {
        handler.stop().await;
    }
    session.shutdown_token().cancel();
    for handle in signal_handlers {
        handle.abort();
    }
    printer.abort();

    result
}

async fn run(args: &Args, session: &AutoHdrSession, criteria: Criteria) -> Result<()> {
    let mut sequence = match &args.load_sequence {
        Some(path) => {
            let sequence = load_sequence(path)
                .await
                .with_context(|| format!("Failed to load sequence {}", path.display()))?;
            println!(
                "Loaded sequence of {} shot(s): {}",
                sequence.len(),
                sequence.exposures().join(", ")
            );
            sequence
        }
        None => match analyze(session, criteria).await? {
            Some(sequence) => sequence,
            None => return Ok(()),
        },
    };

    if let Some(path) = &args.save_sequence {
        save_sequence(path, &sequence)
            .await
            .with_context(|| format!("Failed to save sequence {}", path.display()))?;
        println!("Sequence saved to {}", path.display());
    }

    if args.no_capture {
        return Ok(());
    }

    match session.capture(&mut sequence).await? {
        CaptureOutcome::Completed { captured } => {
            println!("Captured {} shot(s)", captured);
        }
        CaptureOutcome::Cancelled { captured, total } => {
            println!("Capture aborted after {} of {} shot(s)", captured, total);
            return Ok(());
        }
    }

    if args.compose {
        match session.compose(&sequence).await? {
            CompositionOutcome::Finished { code } => {
                println!("HDR composition ended with code {}", code);
                if code != 0 {
                    anyhow::bail!("HDR composition tool exited with code {}", code);
                }
            }
            CompositionOutcome::Cancelled => println!("HDR composition aborted"),
        }
    }

    Ok(())
}

async fn analyze(session: &AutoHdrSession, criteria: Criteria) -> Result<Option<Sequence>> {
    println!(
        "Analyzing scene (lower {}%, upper {}%, at most {} shots)...",
        criteria.lower_pct(),
        criteria.upper_pct(),
        criteria.max_shots()
    );

    match session.analyze(criteria).await? {
        AnalysisOutcome::Completed(sequence) => {
            println!(
                "Sequence: {}",
                sequence.exposures().join(", ")
            );
            Ok(Some(sequence))
        }
        AnalysisOutcome::Aborted => {
            println!("Analysis aborted");
            Ok(None)
        }
    }
}

/// Print events on stdout: every event as JSON, or just status lines
fn spawn_event_printer(session: &AutoHdrSession, json: bool) -> tokio::task::JoinHandle<()> {
    let filter = if json {
        EventFilter::All
    } else {
        EventFilter::EventTypes(vec!["analysis_status", "capture_progress"])
    };
    let mut events = session.event_bus().subscribe_filtered(filter, "cli");

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(EventBusError::Lagged { .. }) => continue,
                Err(_) => break,
            };
            if !json {
                println!("{}", event.description());
                continue;
            }
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Cannot serialize event {}: {}", event.event_type(), e),
            }
        }
    })
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("autohdr={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# AutoHDR Configuration File");
    println!("# This is the default configuration with all available options");
    println!();

    let default_config = r#"[camera]
# Camera parameter names of the bracketed settings
iso_key = "iso"
aperture_key = "aperture"
exposure_key = "shutterspeed"

[analysis]
# Any channel at or above this value makes a pixel over-exposed
white_threshold = 254
# All channels at or below this value make a pixel under-exposed
black_threshold = 5
# Maximum EV between two shots
ev_gap = 2
# Camera scale steps per EV
ev_steps = 3
# Over-exposed percentage accepted in the darkest shot
lower_criteria = 5
# Under-exposed percentage accepted in the brightest shot
upper_criteria = 5
# Maximum number of shots, boundaries included
max_shots = 10
# Exposure the brighter search must never reach (optional)
# max_exposure = "30"

[capture]
# Folder receiving captured shots
folder = "."
# Shot file name prefix, followed by the shot index
shot_prefix = "Image_"
# Store each capture in its own timestamped subfolder
session_subfolder = false
# Write capture.json next to the shots
save_metadata = true

[composition]
# Folder receiving the merged images
folder = "."
# External HDR merge tool
program = "luminance-hdr-cli"
hdr_file_name = "hdr_result.tif"
ldr_file_name = "ldr_result.tif"

[liveview]
# Delay between two live-view frames in milliseconds
interval_ms = 100
# Frames buffered between live view and analysis
frame_channel_capacity = 2

[simulation]
# Simulated camera exposure scale, darkest first (defaults to third stops 1/4000..30)
# exposures = ["1/4000", "1/3200", "1/2500"]
start_exposure = "1/60"
iso = "100"
aperture = "8"
steps_per_ev = 3
# Scene dynamic range in EV
scene_stops = 12.0
# Live-view frames before a new exposure shows up
settle_frames = 1
# Live-view resolution (width, height)
preview_size = [160, 120]

[system]
# Event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
