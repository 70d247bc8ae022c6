//! Operator command parsing
//!
//! Commands follow the Klipper console form:
//! `MOTION_MINDER SET_MAINTENANCE=50 AXES=z UNIT=km RELATIVE=True`.
//! Parsing never touches state, so a rejected command changes nothing.

use motionminder_core::{AxisSet, CommandError, DistanceUnit, MergePolicy};
use std::collections::HashSet;

/// Optional verb in front of the arguments
pub const COMMAND_VERB: &str = "MOTION_MINDER";

/// A validated operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Report odometer and maintenance state
    Stats {
        axes: AxisSet,
        /// Forced display unit; recommended unit per axis when `None`
        unit: Option<DistanceUnit>,
    },
    /// Override the odometer value
    SetOdometer {
        value: f64,
        axes: AxisSet,
        unit: DistanceUnit,
        relative: bool,
    },
    /// Set the maintenance threshold
    SetMaintenance {
        value: f64,
        axes: AxisSet,
        unit: DistanceUnit,
        relative: bool,
    },
    /// Replay archived G-code and merge the result
    ProcessHistory { merge: MergePolicy },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Stats,
    SetOdometer,
    SetMaintenance,
    ProcessHistory,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Stats => "STATS",
            Action::SetOdometer => "SET_ODOMETER",
            Action::SetMaintenance => "SET_MAINTENANCE",
            Action::ProcessHistory => "PROCESS_HISTORY",
        }
    }

    fn accepts(self, modifier: &str) -> bool {
        match self {
            Action::Stats => matches!(modifier, "AXES" | "UNIT"),
            Action::SetOdometer | Action::SetMaintenance => {
                matches!(modifier, "AXES" | "UNIT" | "RELATIVE")
            }
            Action::ProcessHistory => modifier == "MERGE",
        }
    }
}

/// Parse an operator command line
///
/// `default_unit` applies to SET commands given without `UNIT`.
pub fn parse_command(line: &str, default_unit: DistanceUnit) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace().peekable();
    if tokens
        .peek()
        .is_some_and(|t| t.eq_ignore_ascii_case(COMMAND_VERB))
    {
        tokens.next();
    }

    let mut seen = HashSet::new();
    let mut action: Option<(Action, Option<f64>)> = None;
    let mut axes = None;
    let mut unit = None;
    let mut relative = None;
    let mut merge = None;
    let mut modifiers = Vec::new();

    for token in tokens {
        let (raw_key, value) = token.split_once('=').ok_or_else(|| {
            CommandError::invalid_argument(token, "expected KEY=VALUE")
        })?;
        let key = raw_key.to_ascii_uppercase();
        if !seen.insert(key.clone()) {
            return Err(CommandError::invalid_argument(key, "given more than once"));
        }

        let parsed = match key.as_str() {
            "STATS" => parse_bool(&key, value)?.then_some((Action::Stats, None)),
            "PROCESS_HISTORY" => {
                parse_bool(&key, value)?.then_some((Action::ProcessHistory, None))
            }
            "SET_ODOMETER" | "SET_AXIS" => {
                Some((Action::SetOdometer, Some(parse_number(&key, value)?)))
            }
            "SET_MAINTENANCE" => Some((Action::SetMaintenance, Some(parse_number(&key, value)?))),
            "AXES" => {
                axes = Some(parse_axes(value)?);
                modifiers.push("AXES");
                None
            }
            "UNIT" => {
                unit = Some(value.parse::<DistanceUnit>().map_err(|e| {
                    CommandError::invalid_argument("UNIT", e.to_string())
                })?);
                modifiers.push("UNIT");
                None
            }
            "RELATIVE" => {
                relative = Some(parse_bool(&key, value)?);
                modifiers.push("RELATIVE");
                None
            }
            "MERGE" => {
                merge = Some(value.parse::<MergePolicy>()?);
                modifiers.push("MERGE");
                None
            }
            _ => return Err(CommandError::invalid_argument(raw_key, "unknown argument")),
        };

        if let Some((next, number)) = parsed {
            if let Some((previous, _)) = action {
                return Err(CommandError::invalid_argument(
                    raw_key,
                    format!("conflicts with {}", previous.name()),
                ));
            }
            action = Some((next, number));
        }
    }

    let (action, number) = action.unwrap_or((Action::Stats, None));
    if let Some(modifier) = modifiers.iter().find(|m| !action.accepts(m)) {
        return Err(CommandError::invalid_argument(
            *modifier,
            format!("not applicable to {}", action.name()),
        ));
    }

    let axes = axes.unwrap_or_else(AxisSet::all);
    let value = number.unwrap_or_default();
    Ok(match action {
        Action::Stats => Command::Stats { axes, unit },
        Action::SetOdometer => Command::SetOdometer {
            value,
            axes,
            unit: unit.unwrap_or(default_unit),
            relative: relative.unwrap_or(false),
        },
        Action::SetMaintenance => Command::SetMaintenance {
            value,
            axes,
            unit: unit.unwrap_or(default_unit),
            relative: relative.unwrap_or(false),
        },
        Action::ProcessHistory => Command::ProcessHistory {
            merge: merge.unwrap_or_default(),
        },
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CommandError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CommandError::invalid_argument(
            key,
            format!("'{}' is not a boolean", value),
        )),
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64, CommandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::invalid_argument(key, format!("'{}' is not a number", value)))
}

fn parse_axes(value: &str) -> Result<AxisSet, CommandError> {
    let axes = value
        .parse::<AxisSet>()
        .map_err(|e| CommandError::invalid_argument("AXES", e.to_string()))?;
    if axes.is_empty() {
        return Err(CommandError::invalid_argument("AXES", "no axis given"));
    }
    Ok(axes)
}
