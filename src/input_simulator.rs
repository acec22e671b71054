//! Input injection backends
//!
//! Two ways to synthesize pointer input on Linux:
//! - XTest through the X server (X11 and XWayland sessions)
//! - ydotool through kernel uinput, which bypasses the display server and
//!   also works on Wayland. Requires the ydotoold daemon to be running:
//!   sudo systemctl enable --now ydotoold

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, Window, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, MOTION_NOTIFY_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use crate::events::MouseButton;
use crate::{ClickweaveError, Result};

/// Capability to synthesize pointer input at the OS level
pub trait InputInjector: Send + Sync {
    /// Send a down+up pair for `button` at the current pointer location
    fn inject_click(&self, button: MouseButton) -> Result<()>;

    /// Send only the down edge
    fn press(&self, button: MouseButton) -> Result<()>;

    /// Send only the up edge
    fn release(&self, button: MouseButton) -> Result<()>;

    /// Warp the pointer to absolute screen coordinates
    fn move_to(&self, x: f64, y: f64) -> Result<()>;

    fn double_click(&self, button: MouseButton) -> Result<()> {
        self.inject_click(button)?;
        self.inject_click(button)
    }

    /// Current pointer location, if the backend can query it
    fn pointer_position(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Which injection backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    X11,
    Ydotool,
}

/// Create the injector for the chosen backend
pub fn create_injector(backend: Backend) -> Result<Arc<dyn InputInjector>> {
    let injector: Arc<dyn InputInjector> = match backend {
        Backend::X11 => Arc::new(XTestInjector::new()?),
        Backend::Ydotool => Arc::new(YdotoolInjector::new()?),
    };
    Ok(injector)
}

/// X11 core protocol button numbers
fn x11_button(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
    }
}

fn send_error(e: impl std::fmt::Display) -> ClickweaveError {
    ClickweaveError::SendEvent(format!("XTest request failed: {}", e))
}

/// Injector using the XTest extension
pub struct XTestInjector {
    conn: RustConnection,
    root: Window,
}

impl XTestInjector {
    /// Connect to the X server named by `$DISPLAY` and check for XTest
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| ClickweaveError::InputAccess(format!("Failed to connect to X11: {}", e)))?;
        let root = conn.setup().roots[screen_num].root;

        let version = conn
            .xtest_get_version(2, 2)
            .map_err(|e| ClickweaveError::InputAccess(format!("XTest unavailable: {}", e)))?
            .reply()
            .map_err(|e| ClickweaveError::InputAccess(format!("XTest unavailable: {}", e)))?;

        info!(
            "Connected to X11 with XTest {}.{}",
            version.major_version, version.minor_version
        );
        Ok(Self { conn, root })
    }

    fn fake_button(&self, event_type: u8, button: MouseButton) -> Result<()> {
        self.conn
            .xtest_fake_input(event_type, x11_button(button), x11rb::CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(send_error)?
            .ignore_error();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush().map_err(send_error)
    }
}

impl InputInjector for XTestInjector {
    fn inject_click(&self, button: MouseButton) -> Result<()> {
        // Both edges go out in one flush so nothing of ours lands in between
        self.fake_button(BUTTON_PRESS_EVENT, button)?;
        self.fake_button(BUTTON_RELEASE_EVENT, button)?;
        self.flush()
    }

    fn press(&self, button: MouseButton) -> Result<()> {
        debug!("XTest press {}", button);
        self.fake_button(BUTTON_PRESS_EVENT, button)?;
        self.flush()
    }

    fn release(&self, button: MouseButton) -> Result<()> {
        debug!("XTest release {}", button);
        self.fake_button(BUTTON_RELEASE_EVENT, button)?;
        self.flush()
    }

    fn move_to(&self, x: f64, y: f64) -> Result<()> {
        let x = x.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        let y = y.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        self.conn
            .xtest_fake_input(MOTION_NOTIFY_EVENT, 0, x11rb::CURRENT_TIME, self.root, x, y, 0)
            .map_err(send_error)?
            .ignore_error();
        self.flush()
    }

    fn pointer_position(&self) -> Option<(f64, f64)> {
        let reply = self.conn.query_pointer(self.root).ok()?.reply().ok()?;
        Some((reply.root_x as f64, reply.root_y as f64))
    }
}

/// Socket of the ydotoold daemon: `$YDOTOOL_SOCKET`, else the per-user default
fn ydotool_socket(from_env: Option<String>) -> String {
    from_env.unwrap_or_else(|| {
        let uid = unsafe { libc::getuid() };
        format!("/run/user/{}/.ydotool_socket", uid)
    })
}

/// ydotool button code: low nibble is the button, 0x40 is down, 0x80 is up
fn ydotool_code(button: MouseButton, down: bool, up: bool) -> String {
    let id: u8 = match button {
        MouseButton::Left => 0x00,
        MouseButton::Right => 0x01,
        MouseButton::Middle => 0x02,
    };
    let mut code = id;
    if down {
        code |= 0x40;
    }
    if up {
        code |= 0x80;
    }
    format!("0x{:02X}", code)
}

/// Injector that drives the ydotool CLI
pub struct YdotoolInjector {
    socket_path: String,
}

impl YdotoolInjector {
    /// Locate the ydotool binary and the ydotoold socket
    pub fn new() -> Result<Self> {
        match Command::new("ydotool").arg("help").output() {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ClickweaveError::InputAccess(
                    "ydotool is not on PATH; install it or use --backend x11".to_string(),
                ))
            }
            Err(e) => {
                return Err(ClickweaveError::InputAccess(format!("Cannot run ydotool: {}", e)))
            }
            Ok(_) => {}
        }

        let socket_path = ydotool_socket(std::env::var("YDOTOOL_SOCKET").ok());
        if !Path::new(&socket_path).exists() {
            return Err(ClickweaveError::InputAccess(format!(
                "no ydotoold socket at {}; is the daemon running?",
                socket_path
            )));
        }

        info!("Injecting pointer input through ydotoold at {}", socket_path);
        Ok(Self { socket_path })
    }

    fn run_ydotool(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("ydotool")
            .env("YDOTOOL_SOCKET", &self.socket_path)
            .args(args)
            .output()
            .map_err(|e| ClickweaveError::SendEvent(format!("Failed to run ydotool: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClickweaveError::SendEvent(format!("ydotool failed: {}", stderr)));
        }

        Ok(())
    }
}

impl InputInjector for YdotoolInjector {
    fn inject_click(&self, button: MouseButton) -> Result<()> {
        self.run_ydotool(&["click", &ydotool_code(button, true, true)])
    }

    fn press(&self, button: MouseButton) -> Result<()> {
        debug!("Sending {} press via ydotool", button);
        self.run_ydotool(&["click", &ydotool_code(button, true, false)])
    }

    fn release(&self, button: MouseButton) -> Result<()> {
        debug!("Sending {} release via ydotool", button);
        self.run_ydotool(&["click", &ydotool_code(button, false, true)])
    }

    fn double_click(&self, button: MouseButton) -> Result<()> {
        let code = ydotool_code(button, true, true);
        self.run_ydotool(&["click", "--repeat", "2", &code])
    }

    fn move_to(&self, x: f64, y: f64) -> Result<()> {
        let x = format!("{}", x.round() as i64);
        let y = format!("{}", y.round() as i64);
        self.run_ydotool(&["mousemove", "--absolute", "-x", &x, "-y", &y])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ydotool_codes() {
        assert_eq!(ydotool_code(MouseButton::Left, true, true), "0xC0");
        assert_eq!(ydotool_code(MouseButton::Right, true, true), "0xC1");
        assert_eq!(ydotool_code(MouseButton::Middle, true, false), "0x42");
        assert_eq!(ydotool_code(MouseButton::Right, false, true), "0x81");
    }

    #[test]
    fn ydotool_socket_prefers_the_environment() {
        assert_eq!(ydotool_socket(Some("/tmp/ydo.sock".to_string())), "/tmp/ydo.sock");
        let default = ydotool_socket(None);
        assert!(default.starts_with("/run/user/"));
        assert!(default.ends_with("/.ydotool_socket"));
    }

    #[test]
    fn x11_buttons_follow_core_numbering() {
        assert_eq!(x11_button(MouseButton::Left), 1);
        assert_eq!(x11_button(MouseButton::Middle), 2);
        assert_eq!(x11_button(MouseButton::Right), 3);
    }
}
