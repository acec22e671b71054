//! Clickweave - auto-clicker and pointer macro recorder
//!
//! `click` runs the precision clicker, `record` captures pointer input until
//! Ctrl+C and prints the generated script, `play` replays a saved script.

use clap::{Parser, Subcommand, ValueEnum};
use clickweave::{
    create_injector, join_script_generation, parse_script, render_script, spawn_script_generation,
    Backend, ClickConfig, ClickLimit, ClickerEngine, ClickweaveError, Instruction, MouseButton,
    NormalizeOptions, RdevCapture, Recorder, ScriptPlayer,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "clickweave", version, about = "Auto-clicker and pointer macro recorder")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Input injection backend
    #[arg(long, value_enum, default_value_t = BackendArg::X11, global = true)]
    backend: BackendArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    X11,
    Ydotool,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::X11 => Backend::X11,
            BackendArg::Ydotool => Backend::Ydotool,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Click repeatedly until Ctrl+C or a limit is reached
    Click {
        /// Clicks per second
        #[arg(short, long, default_value_t = 10.0)]
        rate: f64,

        /// Button to click (left, right, middle)
        #[arg(short, long, value_parser = parse_button, default_value = "left")]
        button: MouseButton,

        /// Random offset added to each interval, in milliseconds
        #[arg(short, long, default_value_t = 0.0)]
        jitter: f64,

        /// Stop after this many clicks
        #[arg(long, conflicts_with = "duration")]
        count: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Record pointer input until Ctrl+C and emit a script
    Record {
        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of the text script format
        #[arg(long)]
        json: bool,
    },

    /// Replay a recorded script (text, or JSON with a .json extension)
    Play { script: PathBuf },
}

fn parse_button(s: &str) -> Result<MouseButton, String> {
    MouseButton::from_name(&s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown button `{}` (expected left, right or middle)", s))
}

fn main() -> Result<(), ClickweaveError> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .compact()
        .init();

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        running_clone.store(false, Ordering::SeqCst);
    })
    .map_err(|e| ClickweaveError::Worker(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let backend = Backend::from(cli.backend);
    let result = match cli.command {
        Command::Click {
            rate,
            button,
            jitter,
            count,
            duration,
        } => {
            let limit = match (count, duration) {
                (Some(n), _) => ClickLimit::Count(n),
                (None, Some(secs)) => ClickLimit::from_secs(secs)?,
                (None, None) => ClickLimit::None,
            };
            let config = ClickConfig::default()
                .with_rate(rate)
                .with_button(button)
                .with_jitter_ms(jitter)
                .with_limit(limit);
            run_clicker(backend, config, &running)
        }
        Command::Record { output, json } => run_recorder(backend, output.as_deref(), json, &running),
        Command::Play { script } => run_player(backend, &script, &running),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn run_clicker(backend: Backend, config: ClickConfig, running: &AtomicBool) -> Result<(), ClickweaveError> {
    let injector = create_injector(backend)?;
    let engine = ClickerEngine::new(injector);
    engine.configure(config)?;
    let progress = engine.subscribe();

    engine.start()?;
    info!("Clicking - press Ctrl+C to stop");

    while running.load(Ordering::SeqCst) {
        match progress.recv_timeout(Duration::from_millis(100)) {
            Ok(report) if report.finished => {
                info!(
                    "Done: {} clicks in {:.1}s ({} failed)",
                    report.clicks_done, report.elapsed_secs, report.failures
                );
                return Ok(());
            }
            Ok(report) => debug!("{} clicks in {:.1}s", report.clicks_done, report.elapsed_secs),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Progress channel disconnected");
                break;
            }
        }
    }

    engine.stop();
    if let Some(report) = progress.try_iter().find(|r| r.finished) {
        info!(
            "Stopped: {} clicks in {:.1}s ({} failed)",
            report.clicks_done, report.elapsed_secs, report.failures
        );
    }
    Ok(())
}

fn run_recorder(
    backend: Backend,
    output: Option<&Path>,
    json: bool,
    running: &AtomicBool,
) -> Result<(), ClickweaveError> {
    let initial_position = match create_injector(backend) {
        Ok(injector) => injector.pointer_position(),
        Err(e) => {
            warn!("Cannot query the pointer position: {}", e);
            None
        }
    };

    let mut recorder = Recorder::new(RdevCapture::new());
    recorder.start(initial_position)?;
    info!("Recording - press Ctrl+C to stop");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    let events = recorder.stop()?;
    let worker = spawn_script_generation(events, NormalizeOptions::default())?;
    let script = join_script_generation(worker)?;
    info!("Generated {} instructions", script.len());

    let text = if json {
        serde_json::to_string_pretty(&script)
            .map_err(|e| ClickweaveError::Worker(format!("Failed to encode script: {}", e)))?
    } else {
        render_script(&script)
    };

    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Script written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn load_script(path: &Path) -> Result<Vec<Instruction>, ClickweaveError> {
    let text = fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&text).map_err(|e| ClickweaveError::ScriptParse {
            line: e.line(),
            reason: e.to_string(),
        })
    } else {
        parse_script(&text)
    }
}

fn run_player(backend: Backend, path: &Path, running: &AtomicBool) -> Result<(), ClickweaveError> {
    let script = load_script(path)?;
    let player = ScriptPlayer::new(create_injector(backend)?);
    let playback = player.spawn(script)?;
    info!("Playing {} - press Ctrl+C to stop", path.display());

    while running.load(Ordering::SeqCst) && !playback.is_finished() {
        thread::sleep(Duration::from_millis(50));
    }

    let report = if playback.is_finished() {
        playback.wait()?
    } else {
        playback.stop()?
    };
    info!(
        "Played {} instructions ({} failed{})",
        report.executed,
        report.failures,
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}
