//! Text form of an instruction script
//!
//! One instruction per line, e.g. `move(640, 360)`, `wait(0.2500)`,
//! `click(left)`. Blank lines and `#` comments are ignored when parsing, so
//! a rendered script can be edited by hand and played back.

use std::fmt;
use std::str::FromStr;

use crate::events::{Instruction, MouseButton};
use crate::ClickweaveError;

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Wait(secs) => write!(f, "wait({:.4})", secs),
            Instruction::MoveTo { x, y } => write!(f, "move({}, {})", x, y),
            Instruction::Click(button) => write!(f, "click({})", button),
            Instruction::DoubleClick(button) => write!(f, "double_click({})", button),
            Instruction::Press(button) => write!(f, "press({})", button),
            Instruction::Release(button) => write!(f, "release({})", button),
        }
    }
}

impl FromStr for Instruction {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = line
            .split_once('(')
            .ok_or_else(|| format!("expected `name(args)`, got `{}`", line))?;
        let args = rest
            .strip_suffix(')')
            .ok_or_else(|| format!("missing closing parenthesis in `{}`", line))?;
        let args: Vec<&str> = args.split(',').map(str::trim).collect();

        let button = || -> Result<MouseButton, String> {
            match args.as_slice() {
                [arg] => MouseButton::from_name(arg).ok_or_else(|| format!("unknown button `{}`", arg)),
                _ => Err(format!("expected one button argument in `{}`", line)),
            }
        };
        let number = |s: &str| -> Result<f64, String> {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("`{}` is not a number", s))
        };

        match name.trim() {
            "wait" => match args.as_slice() {
                [secs] => {
                    let secs = number(secs)?;
                    if secs < 0.0 {
                        return Err(format!("negative wait `{}`", secs));
                    }
                    Ok(Instruction::Wait(secs))
                }
                _ => Err(format!("expected one duration argument in `{}`", line)),
            },
            "move" => match args.as_slice() {
                [x, y] => Ok(Instruction::MoveTo {
                    x: number(x)?,
                    y: number(y)?,
                }),
                _ => Err(format!("expected two coordinates in `{}`", line)),
            },
            "click" => Ok(Instruction::Click(button()?)),
            "double_click" => Ok(Instruction::DoubleClick(button()?)),
            "press" => Ok(Instruction::Press(button()?)),
            "release" => Ok(Instruction::Release(button()?)),
            other => Err(format!("unknown instruction `{}`", other)),
        }
    }
}

/// Render a script as text, one instruction per line
pub fn render_script(script: &[Instruction]) -> String {
    let mut text = String::from("# clickweave script\n");
    for instruction in script {
        text.push_str(&instruction.to_string());
        text.push('\n');
    }
    text
}

/// Parse a script previously produced by [`render_script`] or written by hand
pub fn parse_script(text: &str) -> crate::Result<Vec<Instruction>> {
    let mut script = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let instruction = line.parse::<Instruction>().map_err(|reason| ClickweaveError::ScriptParse {
            line: index + 1,
            reason,
        })?;
        script.push(instruction);
    }
    Ok(script)
}
