//! Event, operation and instruction types shared by the recording pipeline
//!
//! Timestamps are seconds since capture start, coordinates are screen units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn name(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEdge {
    Down,
    Up,
}

/// Raw pointer event as delivered by the capture port
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawEvent {
    Move { x: f64, y: f64, t: f64 },
    Button { button: MouseButton, edge: ButtonEdge, t: f64 },
}

impl RawEvent {
    pub fn time(&self) -> f64 {
        match *self {
            RawEvent::Move { t, .. } | RawEvent::Button { t, .. } => t,
        }
    }

    pub fn is_button(&self) -> bool {
        matches!(self, RawEvent::Button { .. })
    }
}

/// Semantic pointer operation produced by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SemanticOp {
    Move {
        x: f64,
        y: f64,
        t: f64,
    },
    Click {
        button: MouseButton,
        x: f64,
        y: f64,
        press_t: f64,
        release_t: f64,
    },
    /// `press_t` is the first click's press, `end_t` the second click's release
    DoubleClick {
        button: MouseButton,
        x: f64,
        y: f64,
        press_t: f64,
        end_t: f64,
    },
    Press {
        button: MouseButton,
        x: f64,
        y: f64,
        t: f64,
    },
    Release {
        button: MouseButton,
        x: f64,
        y: f64,
        t: f64,
    },
}

impl SemanticOp {
    /// Cursor position the operation happens at
    pub fn position(&self) -> (f64, f64) {
        match *self {
            SemanticOp::Move { x, y, .. }
            | SemanticOp::Click { x, y, .. }
            | SemanticOp::DoubleClick { x, y, .. }
            | SemanticOp::Press { x, y, .. }
            | SemanticOp::Release { x, y, .. } => (x, y),
        }
    }

    /// When the operation begins (press time for clicks)
    pub fn start_time(&self) -> f64 {
        match *self {
            SemanticOp::Click { press_t, .. } | SemanticOp::DoubleClick { press_t, .. } => press_t,
            SemanticOp::Move { t, .. }
            | SemanticOp::Press { t, .. }
            | SemanticOp::Release { t, .. } => t,
        }
    }

    /// When the operation is over (release time for clicks)
    pub fn end_time(&self) -> f64 {
        match *self {
            SemanticOp::Click { release_t, .. } => release_t,
            SemanticOp::DoubleClick { end_t, .. } => end_t,
            SemanticOp::Move { t, .. }
            | SemanticOp::Press { t, .. }
            | SemanticOp::Release { t, .. } => t,
        }
    }

    /// The button instruction this operation replays as, if any
    pub fn action(&self) -> Option<Instruction> {
        match *self {
            SemanticOp::Move { .. } => None,
            SemanticOp::Click { button, .. } => Some(Instruction::Click(button)),
            SemanticOp::DoubleClick { button, .. } => Some(Instruction::DoubleClick(button)),
            SemanticOp::Press { button, .. } => Some(Instruction::Press(button)),
            SemanticOp::Release { button, .. } => Some(Instruction::Release(button)),
        }
    }
}

/// Primitive script instruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Pause for this many seconds
    Wait(f64),
    MoveTo { x: f64, y: f64 },
    Click(MouseButton),
    DoubleClick(MouseButton),
    Press(MouseButton),
    Release(MouseButton),
}
