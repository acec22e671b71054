//! Clickweave - high-frequency auto-clicker and pointer macro recorder
//!
//! This library provides components for:
//! - A precision click-timing engine (rate, jitter, limits, catch-up)
//! - Global pointer capture for macro recording
//! - Normalizing a raw pointer trace into semantic operations
//! - Emitting, rendering and replaying a primitive instruction script

pub mod clicker;
pub mod config;
pub mod emitter;
pub mod events;
pub mod input_listener;
pub mod input_simulator;
pub mod normalizer;
pub mod player;
pub mod recorder;
pub mod script;
pub mod timer_resolution;

pub use clicker::{ClickProgress, ClickerEngine, ClickerRunState};
pub use config::{ClickConfig, ClickLimit};
pub use emitter::emit;
pub use events::{ButtonEdge, Instruction, MouseButton, RawEvent, SemanticOp};
pub use input_listener::{EventCapture, EventSink, RdevCapture};
pub use input_simulator::{create_injector, Backend, InputInjector, XTestInjector, YdotoolInjector};
pub use normalizer::{normalize, normalize_with, NormalizeOptions};
pub use player::{Playback, PlaybackReport, ScriptPlayer};
pub use recorder::{generate_script, join_script_generation, spawn_script_generation, Recorder};
pub use script::{parse_script, render_script};

use thiserror::Error;

/// Main error type for Clickweave
#[derive(Error, Debug)]
pub enum ClickweaveError {
    #[error("Failed to access input devices: {0}")]
    InputAccess(String),

    #[error("Failed to send input event: {0}")]
    SendEvent(String),

    #[error("Event capture failed: {0}")]
    Capture(String),

    #[error("Invalid click configuration: {0}")]
    InvalidConfig(String),

    #[error("Event {index} is out of order: t={current} after t={previous}")]
    OutOfOrder {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Script line {line}: {reason}")]
    ScriptParse { line: usize, reason: String },

    #[error("Background worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ClickweaveError>;
