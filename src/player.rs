//! Script playback
//!
//! Replays an instruction list on a background thread. Waits are honored
//! with a cancellable timed receive, so `stop()` takes effect at the next
//! instruction or during a wait.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::events::Instruction;
use crate::input_simulator::InputInjector;
use crate::{ClickweaveError, Result};

/// Outcome of a playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    /// Instructions carried out, waits included
    pub executed: usize,
    /// Instructions whose injection failed
    pub failures: usize,
    /// Whether playback was stopped before the end of the script
    pub cancelled: bool,
}

/// Replays scripts through an [`InputInjector`]
pub struct ScriptPlayer {
    injector: Arc<dyn InputInjector>,
}

/// Handle to a running playback
pub struct Playback {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<PlaybackReport>,
}

impl ScriptPlayer {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self { injector }
    }

    /// Start replaying `script` in the background
    pub fn spawn(&self, script: Vec<Instruction>) -> Result<Playback> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let injector = Arc::clone(&self.injector);

        let handle = thread::Builder::new()
            .name("script-player".into())
            .spawn(move || play(injector.as_ref(), &script, &stop_rx))
            .map_err(|e| ClickweaveError::Worker(format!("Failed to spawn player thread: {}", e)))?;

        Ok(Playback { stop_tx, handle })
    }
}

impl Playback {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel playback and wait for the player thread to exit
    pub fn stop(self) -> Result<PlaybackReport> {
        // Fails only if playback already ended
        let _ = self.stop_tx.send(());
        self.wait()
    }

    /// Wait for playback to finish
    pub fn wait(self) -> Result<PlaybackReport> {
        let Playback { stop_tx, handle } = self;
        let report = handle
            .join()
            .map_err(|_| ClickweaveError::Worker("player thread panicked".to_string()));
        drop(stop_tx);
        report
    }
}

fn play(injector: &dyn InputInjector, script: &[Instruction], stop_rx: &mpsc::Receiver<()>) -> PlaybackReport {
    let mut report = PlaybackReport::default();
    info!("Starting playback of {} instructions", script.len());

    for instruction in script {
        if stop_rx.try_recv().is_ok() {
            report.cancelled = true;
            break;
        }

        let result = match *instruction {
            Instruction::Wait(secs) => {
                let wait = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX);
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => Ok(()),
                    Ok(()) => {
                        report.cancelled = true;
                        break;
                    }
                    // Sender lives in the Playback handle until it is joined
                    Err(RecvTimeoutError::Disconnected) => Ok(()),
                }
            }
            Instruction::MoveTo { x, y } => injector.move_to(x, y),
            Instruction::Click(button) => injector.inject_click(button),
            Instruction::DoubleClick(button) => injector.double_click(button),
            Instruction::Press(button) => injector.press(button),
            Instruction::Release(button) => injector.release(button),
        };

        report.executed += 1;
        match result {
            Ok(()) => debug!("Played {}", instruction),
            Err(e) => {
                report.failures += 1;
                warn!("Failed to play {}: {}", instruction, e);
            }
        }
    }

    info!(
        "Playback {}: {} instructions, {} failed",
        if report.cancelled { "cancelled" } else { "complete" },
        report.executed,
        report.failures
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MouseButton;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingInjector {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingInjector {
        fn log(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl InputInjector for RecordingInjector {
        fn inject_click(&self, button: MouseButton) -> Result<()> {
            self.log(format!("click {}", button))
        }

        fn press(&self, button: MouseButton) -> Result<()> {
            self.log(format!("press {}", button))
        }

        fn release(&self, _button: MouseButton) -> Result<()> {
            Err(ClickweaveError::SendEvent("stuck button".to_string()))
        }

        fn move_to(&self, x: f64, y: f64) -> Result<()> {
            self.log(format!("move {} {}", x, y))
        }
    }

    #[test]
    fn plays_instructions_in_order() {
        let injector = Arc::new(RecordingInjector::default());
        let player = ScriptPlayer::new(injector.clone());
        let script = vec![
            Instruction::MoveTo { x: 5.0, y: 6.0 },
            Instruction::Wait(0.01),
            Instruction::DoubleClick(MouseButton::Left),
            Instruction::Press(MouseButton::Right),
            Instruction::Release(MouseButton::Right),
        ];

        let report = player.spawn(script).unwrap().wait().unwrap();
        assert_eq!(
            report,
            PlaybackReport {
                executed: 5,
                failures: 1,
                cancelled: false
            }
        );
        assert_eq!(
            *injector.calls.lock().unwrap(),
            vec!["move 5 6", "click left", "click left", "press right"]
        );
    }

    #[test]
    fn stop_cancels_a_long_wait() {
        let injector = Arc::new(RecordingInjector::default());
        let player = ScriptPlayer::new(injector.clone());
        let playback = player
            .spawn(vec![
                Instruction::Wait(30.0),
                Instruction::Click(MouseButton::Left),
            ])
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        let before = Instant::now();
        let report = playback.stop().unwrap();

        assert!(before.elapsed() < Duration::from_secs(5));
        assert!(report.cancelled);
        assert!(injector.calls.lock().unwrap().is_empty());
    }
}
