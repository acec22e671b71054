//! Global pointer capture using rdev

use rdev::{listen, Button, Event, EventType};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::events::{ButtonEdge, MouseButton, RawEvent};
use crate::{ClickweaveError, Result};

/// How long to wait for the listener to report a startup failure
const LISTENER_GRACE: Duration = Duration::from_millis(200);

/// Subscriber receiving captured events on the delivery thread
///
/// Must return quickly; slow sinks hold up event delivery.
pub type EventSink = Box<dyn FnMut(RawEvent) + Send>;

/// Capability to observe live pointer input
pub trait EventCapture: Send {
    /// Start delivering events to `on_event`
    fn start_capture(&mut self, on_event: EventSink) -> Result<()>;

    /// Stop delivering events; the sink is dropped
    fn stop_capture(&mut self) -> Result<()>;
}

struct Armed {
    sink: EventSink,
    epoch: Instant,
}

/// Capture port backed by a global rdev listener
///
/// rdev's listener cannot be torn down, so one listener thread lives for the
/// rest of the process and events are forwarded only while armed.
pub struct RdevCapture {
    armed: Arc<Mutex<Option<Armed>>>,
    listener: Option<JoinHandle<()>>,
}

impl RdevCapture {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(Mutex::new(None)),
            listener: None,
        }
    }

    fn ensure_listener(&mut self) -> Result<()> {
        if self.listener.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        let (err_tx, err_rx) = mpsc::channel::<String>();
        let armed = Arc::clone(&self.armed);

        let handle = thread::Builder::new()
            .name("pointer-listener".into())
            .spawn(move || {
                info!("Input listener started");

                let callback = move |event: Event| {
                    let mut guard = armed.lock().unwrap_or_else(|p| p.into_inner());
                    if let Some(armed) = guard.as_mut() {
                        let t = armed.epoch.elapsed().as_secs_f64();
                        if let Some(raw) = to_raw_event(&event.event_type, t) {
                            (armed.sink)(raw);
                        }
                    }
                };

                match listen(callback) {
                    Ok(()) => {
                        let _ = err_tx.send("listener exited unexpectedly".to_string());
                    }
                    Err(e) => {
                        error!("Error in input listener: {:?}", e);
                        let _ = err_tx.send(format!("{:?}", e));
                    }
                }
            })
            .map_err(|e| ClickweaveError::Capture(format!("Failed to spawn listener: {}", e)))?;

        match err_rx.recv_timeout(LISTENER_GRACE) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.listener = Some(handle);
                Ok(())
            }
            Ok(reason) => Err(ClickweaveError::Capture(reason)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ClickweaveError::Capture(
                "listener thread exited".to_string(),
            )),
        }
    }
}

impl Default for RdevCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCapture for RdevCapture {
    fn start_capture(&mut self, on_event: EventSink) -> Result<()> {
        if self.armed.lock().unwrap_or_else(|p| p.into_inner()).is_some() {
            return Err(ClickweaveError::Capture("capture already running".to_string()));
        }

        self.ensure_listener()?;

        *self.armed.lock().unwrap_or_else(|p| p.into_inner()) = Some(Armed {
            sink: on_event,
            epoch: Instant::now(),
        });
        debug!("Pointer capture armed");
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<()> {
        match self.armed.lock().unwrap_or_else(|p| p.into_inner()).take() {
            Some(_) => {
                debug!("Pointer capture disarmed");
                Ok(())
            }
            None => Err(ClickweaveError::Capture("capture is not running".to_string())),
        }
    }
}

fn to_button(button: &Button) -> Option<MouseButton> {
    match button {
        Button::Left => Some(MouseButton::Left),
        Button::Right => Some(MouseButton::Right),
        Button::Middle => Some(MouseButton::Middle),
        Button::Unknown(_) => None,
    }
}

/// Map an rdev event to a pointer event, dropping keyboard and wheel input
fn to_raw_event(event_type: &EventType, t: f64) -> Option<RawEvent> {
    match event_type {
        EventType::MouseMove { x, y } => Some(RawEvent::Move { x: *x, y: *y, t }),
        EventType::ButtonPress(button) => to_button(button).map(|button| RawEvent::Button {
            button,
            edge: ButtonEdge::Down,
            t,
        }),
        EventType::ButtonRelease(button) => to_button(button).map(|button| RawEvent::Button {
            button,
            edge: ButtonEdge::Up,
            t,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_pointer_events() {
        assert_eq!(
            to_raw_event(&EventType::MouseMove { x: 3.0, y: 4.0 }, 0.5),
            Some(RawEvent::Move {
                x: 3.0,
                y: 4.0,
                t: 0.5
            })
        );
        assert_eq!(
            to_raw_event(&EventType::ButtonPress(Button::Right), 1.0),
            Some(RawEvent::Button {
                button: MouseButton::Right,
                edge: ButtonEdge::Down,
                t: 1.0
            })
        );
        assert_eq!(
            to_raw_event(&EventType::ButtonRelease(Button::Middle), 1.5),
            Some(RawEvent::Button {
                button: MouseButton::Middle,
                edge: ButtonEdge::Up,
                t: 1.5
            })
        );
    }

    #[test]
    fn ignores_other_input() {
        assert_eq!(to_raw_event(&EventType::ButtonPress(Button::Unknown(8)), 0.0), None);
        assert_eq!(to_raw_event(&EventType::KeyPress(rdev::Key::KeyA), 0.0), None);
        assert_eq!(
            to_raw_event(
                &EventType::Wheel {
                    delta_x: 0,
                    delta_y: 1
                },
                0.0
            ),
            None
        );
    }

    #[test]
    fn stopping_an_idle_capture_fails_cleanly() {
        let mut capture = RdevCapture::new();
        assert!(matches!(capture.stop_capture(), Err(ClickweaveError::Capture(_))));
    }
}
