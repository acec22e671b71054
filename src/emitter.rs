//! Script emission from semantic operations
//!
//! Turns the normalizer output into a flat instruction list. All timing is
//! encoded as explicit `Wait` instructions; nothing here sleeps.

use tracing::debug;

use crate::events::{Instruction, SemanticOp};

/// Gaps at or below this many seconds are not worth a wait instruction
pub const MIN_WAIT_SECS: f64 = 0.002;

/// Emit the instruction script for a sequence of semantic operations
pub fn emit(ops: &[SemanticOp]) -> Vec<Instruction> {
    let mut script = Vec::with_capacity(ops.len() * 2);
    let Some(first) = ops.first() else {
        return script;
    };

    let mut last_time = first.start_time();
    let mut last_position: Option<(f64, f64)> = None;

    for op in ops {
        // Clicks wait until their press so the dwell before the click survives
        let dt = op.start_time() - last_time;
        if dt > MIN_WAIT_SECS {
            script.push(Instruction::Wait(dt));
        }

        let position = op.position();
        if last_position != Some(position) {
            script.push(Instruction::MoveTo {
                x: position.0,
                y: position.1,
            });
            last_position = Some(position);
        }

        if let Some(action) = op.action() {
            script.push(action);
        }

        last_time = op.end_time();
    }

    debug!("Emitted {} instructions from {} ops", script.len(), ops.len());
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MouseButton;

    fn press(x: f64, y: f64, t: f64) -> SemanticOp {
        SemanticOp::Press {
            button: MouseButton::Left,
            x,
            y,
            t,
        }
    }

    fn waits(script: &[Instruction]) -> Vec<f64> {
        script
            .iter()
            .filter_map(|i| match i {
                Instruction::Wait(secs) => Some(*secs),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_ops_emit_nothing() {
        assert!(emit(&[]).is_empty());
    }

    #[test]
    fn tiny_gaps_are_suppressed() {
        let script = emit(&[press(0.0, 0.0, 1.000), press(0.0, 0.0, 1.001)]);
        assert!(waits(&script).is_empty());
    }

    #[test]
    fn long_gaps_become_waits() {
        let script = emit(&[press(0.0, 0.0, 1.0), press(0.0, 0.0, 1.9)]);
        let waits = waits(&script);
        assert_eq!(waits.len(), 1);
        assert!((waits[0] - 0.9).abs() < 0.0005);
    }

    #[test]
    fn repeated_position_moves_once() {
        let script = emit(&[press(7.0, 9.0, 0.0), press(7.0, 9.0, 0.001)]);
        assert_eq!(
            script,
            vec![
                Instruction::MoveTo { x: 7.0, y: 9.0 },
                Instruction::Press(MouseButton::Left),
                Instruction::Press(MouseButton::Left),
            ]
        );
    }

    #[test]
    fn click_waits_until_press_and_advances_to_release() {
        let ops = [
            SemanticOp::Move {
                x: 1.0,
                y: 1.0,
                t: 0.0,
            },
            SemanticOp::Click {
                button: MouseButton::Right,
                x: 1.0,
                y: 1.0,
                press_t: 0.5,
                release_t: 0.6,
            },
            SemanticOp::Release {
                button: MouseButton::Left,
                x: 1.0,
                y: 1.0,
                t: 1.6,
            },
        ];
        let script = emit(&ops);
        assert_eq!(script.len(), 5);
        assert_eq!(script[0], Instruction::MoveTo { x: 1.0, y: 1.0 });
        assert!(matches!(script[1], Instruction::Wait(secs) if (secs - 0.5).abs() < 1e-9));
        assert_eq!(script[2], Instruction::Click(MouseButton::Right));
        assert!(matches!(script[3], Instruction::Wait(secs) if (secs - 1.0).abs() < 1e-9));
        assert_eq!(script[4], Instruction::Release(MouseButton::Left));
    }

    #[test]
    fn double_click_uses_first_press_time() {
        let ops = [
            SemanticOp::Move {
                x: 3.0,
                y: 4.0,
                t: 0.0,
            },
            SemanticOp::DoubleClick {
                button: MouseButton::Left,
                x: 3.0,
                y: 4.0,
                press_t: 0.25,
                end_t: 0.6,
            },
        ];
        let script = emit(&ops);
        assert_eq!(
            script,
            vec![
                Instruction::MoveTo { x: 3.0, y: 4.0 },
                Instruction::Wait(0.25),
                Instruction::DoubleClick(MouseButton::Left),
            ]
        );
    }

    #[test]
    fn position_changes_emit_moves() {
        let ops = [press(0.0, 0.0, 0.0), press(10.0, 0.0, 0.0)];
        let script = emit(&ops);
        assert_eq!(
            script,
            vec![
                Instruction::MoveTo { x: 0.0, y: 0.0 },
                Instruction::Press(MouseButton::Left),
                Instruction::MoveTo { x: 10.0, y: 0.0 },
                Instruction::Press(MouseButton::Left),
            ]
        );
    }
}
