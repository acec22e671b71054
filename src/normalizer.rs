//! Event normalization for recorded pointer traces
//!
//! A captured trace goes through three pure passes:
//! 1. [`compress`] drops near-duplicate movement samples
//! 2. [`pair_clicks`] folds matching down/up edges into clicks
//! 3. [`fold_double_clicks`] merges quick same-button clicks into double-clicks
//!
//! Each pass is a single left-to-right scan and is usable on its own.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{ButtonEdge, MouseButton, RawEvent, SemanticOp};
use crate::{ClickweaveError, Result};

/// Tolerances used by the normalizer passes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Moves within this many units of the last kept move are dropped in pass 1
    pub move_threshold: f64,

    /// Pointer drift allowed while a button is held (pass 2) or between
    /// the clicks of a double-click (pass 3)
    pub tremor_tolerance: f64,

    /// Longest release-to-press gap that still counts as a double-click
    pub double_click_gap_secs: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            move_threshold: 5.0,
            tremor_tolerance: 5.0,
            double_click_gap_secs: 0.8,
        }
    }
}

/// Output of the pairing pass; double-clicks only exist after pass 3
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairedOp {
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

impl From<PairedOp> for SemanticOp {
    fn from(op: PairedOp) -> Self {
        match op {
            PairedOp::Move { x, y, t } => SemanticOp::Move { x, y, t },
            PairedOp::Click {
                button,
                x,
                y,
                press_t,
                release_t,
            } => SemanticOp::Click {
                button,
                x,
                y,
                press_t,
                release_t,
            },
            PairedOp::Press { button, x, y, t } => SemanticOp::Press { button, x, y, t },
            PairedOp::Release { button, x, y, t } => SemanticOp::Release { button, x, y, t },
        }
    }
}

fn within(ax: f64, ay: f64, bx: f64, by: f64, tolerance: f64) -> bool {
    (ax - bx).abs() <= tolerance && (ay - by).abs() <= tolerance
}

/// Normalize a captured trace with the default tolerances
pub fn normalize(events: &[RawEvent]) -> Result<Vec<SemanticOp>> {
    normalize_with(events, &NormalizeOptions::default())
}

/// Normalize a captured trace into semantic operations
///
/// Fails with [`ClickweaveError::OutOfOrder`] if timestamps go backwards,
/// which only happens when the capture port breaks its ordering contract.
pub fn normalize_with(events: &[RawEvent], options: &NormalizeOptions) -> Result<Vec<SemanticOp>> {
    check_order(events)?;

    let compressed = compress(events, options);
    let paired = pair_clicks(&compressed, options);
    let ops = fold_double_clicks(&paired, options);

    debug!(
        "Normalized {} raw events -> {} kept -> {} paired -> {} ops",
        events.len(),
        compressed.len(),
        paired.len(),
        ops.len()
    );
    Ok(ops)
}

fn check_order(events: &[RawEvent]) -> Result<()> {
    let mut previous = f64::NEG_INFINITY;
    for (index, event) in events.iter().enumerate() {
        let current = event.time();
        if !current.is_finite() || current < previous {
            return Err(ClickweaveError::OutOfOrder {
                index,
                previous,
                current,
            });
        }
        previous = current;
    }
    Ok(())
}

/// Pass 1: sparse sampling of movement
///
/// Button events always survive. The first move survives, as does any move
/// directly followed by a button event. Other moves survive only if they are
/// more than `move_threshold` away from the last kept move on some axis.
pub fn compress(events: &[RawEvent], options: &NormalizeOptions) -> Vec<RawEvent> {
    let mut kept = Vec::with_capacity(events.len());
    let mut last_move: Option<(f64, f64)> = None;

    for (i, event) in events.iter().enumerate() {
        match *event {
            RawEvent::Button { .. } => kept.push(*event),
            RawEvent::Move { x, y, .. } => {
                let precedes_button = events.get(i + 1).is_some_and(RawEvent::is_button);
                let keep = match last_move {
                    None => true,
                    Some(_) if precedes_button => true,
                    Some((lx, ly)) => !within(x, y, lx, ly, options.move_threshold),
                };
                if keep {
                    kept.push(*event);
                    last_move = Some((x, y));
                }
            }
        }
    }
    kept
}

/// Pass 2: pair button edges into clicks
///
/// A down followed by an up of the same button, with only small moves in
/// between, becomes a click at the cursor position of the down edge. An
/// unmatched down becomes a press; an up that was not consumed becomes a
/// release.
pub fn pair_clicks(events: &[RawEvent], options: &NormalizeOptions) -> Vec<PairedOp> {
    let mut ops = Vec::with_capacity(events.len());
    let (mut cur_x, mut cur_y) = (0.0, 0.0);
    let mut i = 0;

    while i < events.len() {
        match events[i] {
            RawEvent::Move { x, y, t } => {
                cur_x = x;
                cur_y = y;
                ops.push(PairedOp::Move { x, y, t });
                i += 1;
            }
            RawEvent::Button {
                button,
                edge: ButtonEdge::Down,
                t: press_t,
            } => match find_release(events, i + 1, button, cur_x, cur_y, options) {
                Some((up_index, release_t)) => {
                    ops.push(PairedOp::Click {
                        button,
                        x: cur_x,
                        y: cur_y,
                        press_t,
                        release_t,
                    });
                    i = up_index + 1;
                }
                None => {
                    ops.push(PairedOp::Press {
                        button,
                        x: cur_x,
                        y: cur_y,
                        t: press_t,
                    });
                    i += 1;
                }
            },
            RawEvent::Button {
                button,
                edge: ButtonEdge::Up,
                t,
            } => {
                ops.push(PairedOp::Release {
                    button,
                    x: cur_x,
                    y: cur_y,
                    t,
                });
                i += 1;
            }
        }
    }
    ops
}

/// Look past tremor moves for the up edge matching a down
fn find_release(
    events: &[RawEvent],
    from: usize,
    button: MouseButton,
    cur_x: f64,
    cur_y: f64,
    options: &NormalizeOptions,
) -> Option<(usize, f64)> {
    for (j, event) in events.iter().enumerate().skip(from) {
        match *event {
            RawEvent::Move { x, y, .. } => {
                if !within(x, y, cur_x, cur_y, options.tremor_tolerance) {
                    return None;
                }
            }
            RawEvent::Button {
                button: other,
                edge: ButtonEdge::Up,
                t,
            } if other == button => return Some((j, t)),
            RawEvent::Button { .. } => return None,
        }
    }
    None
}

/// Pass 3: fold pairs of quick clicks into double-clicks
///
/// Small moves between the two clicks are measured from the first click's
/// position and are dropped when the pair folds.
pub fn fold_double_clicks(ops: &[PairedOp], options: &NormalizeOptions) -> Vec<SemanticOp> {
    let mut folded = Vec::with_capacity(ops.len());
    let mut i = 0;

    while i < ops.len() {
        if let PairedOp::Click {
            button,
            x,
            y,
            press_t,
            release_t,
        } = ops[i]
        {
            if let Some((second, end_t)) = find_second_click(ops, i + 1, button, x, y, release_t, options) {
                folded.push(SemanticOp::DoubleClick {
                    button,
                    x,
                    y,
                    press_t,
                    end_t,
                });
                i = second + 1;
                continue;
            }
        }
        folded.push(ops[i].into());
        i += 1;
    }
    folded
}

fn find_second_click(
    ops: &[PairedOp],
    from: usize,
    button: MouseButton,
    x: f64,
    y: f64,
    first_release: f64,
    options: &NormalizeOptions,
) -> Option<(usize, f64)> {
    for (j, op) in ops.iter().enumerate().skip(from) {
        match *op {
            PairedOp::Move { x: mx, y: my, .. } => {
                if !within(mx, my, x, y, options.tremor_tolerance) {
                    return None;
                }
            }
            PairedOp::Click {
                button: other,
                press_t,
                release_t,
                ..
            } if other == button => {
                let gap = press_t - first_release;
                return (gap < options.double_click_gap_secs).then_some((j, release_t));
            }
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(x: f64, y: f64, t: f64) -> RawEvent {
        RawEvent::Move { x, y, t }
    }

    fn down(button: MouseButton, t: f64) -> RawEvent {
        RawEvent::Button {
            button,
            edge: ButtonEdge::Down,
            t,
        }
    }

    fn up(button: MouseButton, t: f64) -> RawEvent {
        RawEvent::Button {
            button,
            edge: ButtonEdge::Up,
            t,
        }
    }

    fn click(x: f64, y: f64, press_t: f64, release_t: f64) -> PairedOp {
        PairedOp::Click {
            button: MouseButton::Left,
            x,
            y,
            press_t,
            release_t,
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        let options = NormalizeOptions::default();
        assert!(compress(&[], &options).is_empty());
        assert!(pair_clicks(&[], &options).is_empty());
        assert!(fold_double_clicks(&[], &options).is_empty());
        assert!(normalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn compress_drops_micro_movements() {
        let events = [
            mv(100.0, 100.0, 0.0),
            mv(102.0, 101.0, 0.01),
            mv(104.0, 99.0, 0.02),
            mv(106.0, 100.0, 0.03),
            mv(107.0, 100.0, 0.04),
        ];
        let kept = compress(&events, &NormalizeOptions::default());
        assert_eq!(kept, vec![events[0], events[3]]);
    }

    #[test]
    fn compress_keeps_move_before_button() {
        let events = [
            mv(0.0, 0.0, 0.0),
            mv(1.0, 1.0, 0.1),
            down(MouseButton::Left, 0.2),
            up(MouseButton::Left, 0.3),
            mv(2.0, 2.0, 0.4),
        ];
        let kept = compress(&events, &NormalizeOptions::default());
        assert_eq!(kept, events[..4].to_vec());
    }

    #[test]
    fn compress_is_identity_on_sparse_input() {
        let events = [
            mv(0.0, 0.0, 0.0),
            mv(10.0, 0.0, 0.1),
            mv(10.0, 20.0, 0.2),
            down(MouseButton::Right, 0.3),
            up(MouseButton::Right, 0.4),
            mv(40.0, 20.0, 0.5),
            mv(40.0, 60.0, 0.6),
        ];
        let options = NormalizeOptions::default();
        let once = compress(&events, &options);
        assert_eq!(once, events.to_vec());
        assert_eq!(compress(&once, &options), once);
    }

    #[test]
    fn down_up_pairs_into_one_click() {
        let events = [down(MouseButton::Left, 1000.0), up(MouseButton::Left, 1000.1)];
        let ops = normalize(&events).unwrap();
        assert_eq!(
            ops,
            vec![SemanticOp::Click {
                button: MouseButton::Left,
                x: 0.0,
                y: 0.0,
                press_t: 1000.0,
                release_t: 1000.1,
            }]
        );
    }

    #[test]
    fn tremor_during_click_is_tolerated() {
        let events = [
            mv(50.0, 50.0, 0.0),
            down(MouseButton::Left, 0.1),
            mv(53.0, 48.0, 0.12),
            up(MouseButton::Left, 0.15),
        ];
        let paired = pair_clicks(&events, &NormalizeOptions::default());
        assert_eq!(
            paired,
            vec![
                PairedOp::Move {
                    x: 50.0,
                    y: 50.0,
                    t: 0.0
                },
                click(50.0, 50.0, 0.1, 0.15),
            ]
        );
    }

    #[test]
    fn drag_becomes_press_move_release() {
        let events = [
            mv(0.0, 0.0, 0.0),
            down(MouseButton::Left, 0.1),
            mv(80.0, 40.0, 0.3),
            up(MouseButton::Left, 0.5),
        ];
        let paired = pair_clicks(&events, &NormalizeOptions::default());
        assert_eq!(
            paired,
            vec![
                PairedOp::Move {
                    x: 0.0,
                    y: 0.0,
                    t: 0.0
                },
                PairedOp::Press {
                    button: MouseButton::Left,
                    x: 0.0,
                    y: 0.0,
                    t: 0.1
                },
                PairedOp::Move {
                    x: 80.0,
                    y: 40.0,
                    t: 0.3
                },
                PairedOp::Release {
                    button: MouseButton::Left,
                    x: 80.0,
                    y: 40.0,
                    t: 0.5
                },
            ]
        );
    }

    #[test]
    fn other_button_breaks_pairing() {
        let events = [
            down(MouseButton::Left, 0.0),
            down(MouseButton::Right, 0.05),
            up(MouseButton::Right, 0.1),
            up(MouseButton::Left, 0.2),
        ];
        let paired = pair_clicks(&events, &NormalizeOptions::default());
        assert_eq!(paired.len(), 3);
        assert!(matches!(paired[0], PairedOp::Press { button: MouseButton::Left, .. }));
        assert!(matches!(paired[1], PairedOp::Click { button: MouseButton::Right, .. }));
        assert!(matches!(paired[2], PairedOp::Release { button: MouseButton::Left, .. }));
    }

    #[test]
    fn trailing_down_is_an_unmatched_press() {
        let ops = normalize(&[mv(5.0, 5.0, 0.0), down(MouseButton::Middle, 0.2)]).unwrap();
        assert_eq!(
            ops.last(),
            Some(&SemanticOp::Press {
                button: MouseButton::Middle,
                x: 5.0,
                y: 5.0,
                t: 0.2
            })
        );
    }

    #[test]
    fn quick_clicks_fold_into_double_click() {
        let ops = [click(10.0, 10.0, 0.0, 0.1), click(10.0, 10.0, 0.6, 0.7)];
        let folded = fold_double_clicks(&ops, &NormalizeOptions::default());
        assert_eq!(
            folded,
            vec![SemanticOp::DoubleClick {
                button: MouseButton::Left,
                x: 10.0,
                y: 10.0,
                press_t: 0.0,
                end_t: 0.7,
            }]
        );
    }

    #[test]
    fn slow_clicks_stay_separate() {
        let ops = [click(10.0, 10.0, 0.0, 0.1), click(10.0, 10.0, 1.1, 1.2)];
        let folded = fold_double_clicks(&ops, &NormalizeOptions::default());
        assert_eq!(folded.len(), 2);
        assert!(folded.iter().all(|op| matches!(op, SemanticOp::Click { .. })));
    }

    #[test]
    fn double_click_gap_boundary() {
        let options = NormalizeOptions::default();
        let folds = fold_double_clicks(&[click(0.0, 0.0, 0.0, 0.1), click(0.0, 0.0, 0.89, 0.95)], &options);
        assert_eq!(folds.len(), 1);
        let splits = fold_double_clicks(&[click(0.0, 0.0, 0.0, 0.1), click(0.0, 0.0, 0.91, 0.95)], &options);
        assert_eq!(splits.len(), 2);
    }

    #[test]
    fn small_moves_between_clicks_are_absorbed() {
        let ops = [
            click(10.0, 10.0, 0.0, 0.1),
            PairedOp::Move {
                x: 13.0,
                y: 8.0,
                t: 0.15,
            },
            click(13.0, 8.0, 0.2, 0.3),
        ];
        let folded = fold_double_clicks(&ops, &NormalizeOptions::default());
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].position(), (10.0, 10.0));
    }

    #[test]
    fn large_move_between_clicks_prevents_folding() {
        let ops = [
            click(10.0, 10.0, 0.0, 0.1),
            PairedOp::Move {
                x: 30.0,
                y: 10.0,
                t: 0.15,
            },
            click(30.0, 10.0, 0.2, 0.3),
        ];
        let folded = fold_double_clicks(&ops, &NormalizeOptions::default());
        assert_eq!(folded.len(), 3);
    }

    #[test]
    fn different_buttons_do_not_fold() {
        let ops = [
            click(0.0, 0.0, 0.0, 0.1),
            PairedOp::Click {
                button: MouseButton::Right,
                x: 0.0,
                y: 0.0,
                press_t: 0.2,
                release_t: 0.3,
            },
        ];
        assert_eq!(fold_double_clicks(&ops, &NormalizeOptions::default()).len(), 2);
    }

    #[test]
    fn three_quick_clicks_fold_the_first_pair() {
        let ops = [
            click(0.0, 0.0, 0.0, 0.05),
            click(0.0, 0.0, 0.1, 0.15),
            click(0.0, 0.0, 0.2, 0.25),
        ];
        let folded = fold_double_clicks(&ops, &NormalizeOptions::default());
        assert_eq!(folded.len(), 2);
        assert!(matches!(folded[0], SemanticOp::DoubleClick { end_t, .. } if end_t == 0.15));
        assert!(matches!(folded[1], SemanticOp::Click { press_t, .. } if press_t == 0.2));
    }

    #[test]
    fn out_of_order_input_is_rejected() {
        let events = [mv(0.0, 0.0, 1.0), mv(20.0, 0.0, 0.5)];
        match normalize(&events) {
            Err(ClickweaveError::OutOfOrder { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected out-of-order error, got {:?}", other),
        }
    }

    #[test]
    fn equal_timestamps_are_accepted() {
        let events = [down(MouseButton::Left, 2.0), up(MouseButton::Left, 2.0)];
        assert_eq!(normalize(&events).unwrap().len(), 1);
    }
}
