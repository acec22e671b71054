//! Macro recording and script generation
//!
//! Capture must be fully stopped before a buffer is normalized. Script
//! generation runs on its own worker thread so it never delays the capture
//! thread or the caller's event loop.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::emitter::emit;
use crate::events::{Instruction, RawEvent};
use crate::input_listener::EventCapture;
use crate::normalizer::{normalize_with, NormalizeOptions};
use crate::{ClickweaveError, Result};

/// Records pointer input from a capture port into an in-memory buffer
pub struct Recorder<C: EventCapture> {
    capture: C,
    buffer: Arc<Mutex<Vec<RawEvent>>>,
    recording: bool,
}

impl<C: EventCapture> Recorder<C> {
    pub fn new(capture: C) -> Self {
        Self {
            capture,
            buffer: Arc::new(Mutex::new(Vec::new())),
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start a new recording, discarding any previous buffer
    ///
    /// `initial_position` seeds the trace with a move at t=0, since the
    /// capture port only reports the pointer once it moves.
    pub fn start(&mut self, initial_position: Option<(f64, f64)>) -> Result<()> {
        if self.recording {
            return Err(ClickweaveError::Capture("already recording".to_string()));
        }

        {
            let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
            buffer.clear();
            if let Some((x, y)) = initial_position {
                buffer.push(RawEvent::Move { x, y, t: 0.0 });
            }
        }

        let buffer = Arc::clone(&self.buffer);
        self.capture.start_capture(Box::new(move |event| {
            buffer.lock().unwrap_or_else(|p| p.into_inner()).push(event);
        }))?;

        self.recording = true;
        info!("Recording started");
        Ok(())
    }

    /// Stop recording and hand back everything captured
    pub fn stop(&mut self) -> Result<Vec<RawEvent>> {
        if !self.recording {
            return Err(ClickweaveError::Capture("not recording".to_string()));
        }
        self.capture.stop_capture()?;
        self.recording = false;

        let events = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|p| p.into_inner()));
        info!("Recording stopped with {} events", events.len());
        Ok(events)
    }
}

/// Normalize a captured trace and emit its instruction script
pub fn generate_script(events: &[RawEvent], options: &NormalizeOptions) -> Result<Vec<Instruction>> {
    let ops = normalize_with(events, options)?;
    let script = emit(&ops);
    debug!(
        "Generated {} instructions from {} events",
        script.len(),
        events.len()
    );
    Ok(script)
}

/// Run [`generate_script`] on a dedicated worker thread
///
/// Joining the handle yields the script; dropping it discards the result.
pub fn spawn_script_generation(
    events: Vec<RawEvent>,
    options: NormalizeOptions,
) -> Result<JoinHandle<Result<Vec<Instruction>>>> {
    thread::Builder::new()
        .name("script-generator".into())
        .spawn(move || generate_script(&events, &options))
        .map_err(|e| ClickweaveError::Worker(format!("Failed to spawn script generator: {}", e)))
}

/// Join a script generation worker, mapping a panic to an error
pub fn join_script_generation(handle: JoinHandle<Result<Vec<Instruction>>>) -> Result<Vec<Instruction>> {
    handle
        .join()
        .map_err(|_| ClickweaveError::Worker("script generator panicked".to_string()))?
}
