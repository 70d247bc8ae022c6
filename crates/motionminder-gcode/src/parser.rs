//! G-Code motion parser and modal state tracking
//!
//! Only the commands that move or re-reference the toolhead are interpreted.
//! Extended commands, macros and calibration routines are opaque and skipped.

use motionminder_core::{AxisMap, GcodeError, MotionSample, Position, SampleSource};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Millimeters per inch, used under G20
pub const MM_PER_INCH: f64 = 25.4;

/// Positioning mode (G90/G91 for axes, M82/M83 for the extruder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMode {
    #[default]
    Absolute,
    Relative,
}

/// Length units (G20/G21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthUnits {
    #[default]
    Millimeters,
    Inches,
}

impl LengthUnits {
    fn scale(self) -> f64 {
        match self {
            Self::Millimeters => 1.0,
            Self::Inches => MM_PER_INCH,
        }
    }
}

/// Modal state carried between lines
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionState {
    /// Axis positioning mode
    pub distance_mode: DistanceMode,
    /// Extruder positioning mode
    pub extruder_mode: DistanceMode,
    /// Active length units
    pub units: LengthUnits,
    /// Last commanded toolhead position in mm
    pub position: Position,
    /// Last commanded extruder position in mm
    pub extruder: f64,
}

/// Travel produced by one motion command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionDelta {
    /// Per-axis travel magnitude in mm
    pub travel: AxisMap<f64>,
    /// Net extrusion in mm (negative for retractions)
    pub extrusion_mm: f64,
}

impl MotionDelta {
    /// Non-zero per-axis samples attributed to the G-code feed
    pub fn samples(&self) -> impl Iterator<Item = MotionSample> + '_ {
        self.travel
            .iter()
            .filter(|(_, delta)| **delta > 0.0)
            .map(|(axis, delta)| MotionSample::new(axis, *delta, SampleSource::GcodeCommand))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Move,
    Home,
    Absolute,
    Relative,
    ExtruderAbsolute,
    ExtruderRelative,
    SetPosition,
    Inches,
    Millimeters,
}

impl Command {
    fn lookup(letter: char, code: u32, sub: Option<u32>) -> Option<Self> {
        if sub.is_some_and(|s| s != 0) {
            return None;
        }
        match (letter, code) {
            ('G', 0..=3) => Some(Self::Move),
            ('G', 20) => Some(Self::Inches),
            ('G', 21) => Some(Self::Millimeters),
            ('G', 28) => Some(Self::Home),
            ('G', 90) => Some(Self::Absolute),
            ('G', 91) => Some(Self::Relative),
            ('G', 92) => Some(Self::SetPosition),
            ('M', 82) => Some(Self::ExtruderAbsolute),
            ('M', 83) => Some(Self::ExtruderRelative),
            _ => None,
        }
    }
}

/// Axis words of one command; `Some(None)` marks a letter without a value
#[derive(Debug, Default)]
struct Words {
    x: Option<Option<f64>>,
    y: Option<Option<f64>>,
    z: Option<Option<f64>>,
    e: Option<Option<f64>>,
}

impl Words {
    fn axes(&self) -> AxisMap<Option<Option<f64>>> {
        AxisMap::new(self.x, self.y, self.z)
    }

    fn any_axis(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }
}

/// G-Code parser that turns motion commands into per-axis travel
#[derive(Debug, Clone, Default)]
pub struct MotionParser {
    state: MotionState,
    extruded_mm: f64,
    line_number: u64,
}

impl MotionParser {
    /// Create a parser at the origin in absolute millimeter mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser whose commanded position starts at `position`
    pub fn starting_at(position: Position) -> Self {
        let mut parser = Self::new();
        parser.state.position = position;
        parser
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Last commanded position
    pub fn position(&self) -> Position {
        self.state.position
    }

    /// Net extrusion since the parser was created
    pub fn extruded_mm(&self) -> f64 {
        self.extruded_mm
    }

    /// Lines fed so far
    pub fn lines_parsed(&self) -> u64 {
        self.line_number
    }

    /// Parse one line, returning the travel of a motion command
    ///
    /// Non-motion lines update modal state and return `Ok(None)`. On error
    /// the modal state is left unchanged.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<MotionDelta>, GcodeError> {
        self.line_number += 1;

        let cleaned = strip_line(line);
        let Some((command, rest)) = split_command(cleaned) else {
            return Ok(None);
        };

        let words = self.parse_words(rest)?;
        let scale = self.state.units.scale();

        match command {
            Command::Move => return self.apply_move(&words, scale).map(Some),
            Command::Home => {
                let all = !words.any_axis();
                for (axis, word) in words.axes().iter() {
                    if all || word.is_some() {
                        self.state.position[axis] = 0.0;
                    }
                }
            }
            Command::SetPosition => {
                let values = self.require_values(&words, "G92")?;
                if !words.any_axis() && words.e.is_none() {
                    self.state.position = Position::splat(0.0);
                    self.state.extruder = 0.0;
                } else {
                    for (axis, value) in values.iter() {
                        if let Some(v) = value {
                            self.state.position[axis] = v * scale;
                        }
                    }
                    if let Some(Some(e)) = words.e {
                        self.state.extruder = e * scale;
                    }
                }
            }
            Command::Absolute => {
                self.state.distance_mode = DistanceMode::Absolute;
                self.state.extruder_mode = DistanceMode::Absolute;
            }
            Command::Relative => {
                self.state.distance_mode = DistanceMode::Relative;
                self.state.extruder_mode = DistanceMode::Relative;
            }
            Command::ExtruderAbsolute => self.state.extruder_mode = DistanceMode::Absolute,
            Command::ExtruderRelative => self.state.extruder_mode = DistanceMode::Relative,
            Command::Inches => self.state.units = LengthUnits::Inches,
            Command::Millimeters => self.state.units = LengthUnits::Millimeters,
        }
        Ok(None)
    }

    fn apply_move(&mut self, words: &Words, scale: f64) -> Result<MotionDelta, GcodeError> {
        let values = self.require_values(words, "move")?;
        let e_value = match words.e {
            Some(None) => return Err(self.syntax_error("missing value for E")),
            Some(Some(e)) => Some(e * scale),
            None => None,
        };

        let mut delta = MotionDelta::default();
        for (axis, value) in values.iter() {
            let Some(value) = value.map(|v| v * scale) else {
                continue;
            };
            match self.state.distance_mode {
                DistanceMode::Absolute => {
                    delta.travel[axis] = (value - self.state.position[axis]).abs();
                    self.state.position[axis] = value;
                }
                DistanceMode::Relative => {
                    delta.travel[axis] = value.abs();
                    self.state.position[axis] += value;
                }
            }
        }

        if let Some(e) = e_value {
            delta.extrusion_mm = match self.state.extruder_mode {
                DistanceMode::Absolute => e - self.state.extruder,
                DistanceMode::Relative => e,
            };
            self.state.extruder += delta.extrusion_mm;
            self.extruded_mm += delta.extrusion_mm;
        }

        Ok(delta)
    }

    /// Axis values with letters-without-values rejected
    fn require_values(
        &self,
        words: &Words,
        context: &str,
    ) -> Result<AxisMap<Option<f64>>, GcodeError> {
        let axes = words.axes();
        if let Some((axis, _)) = axes.iter().find(|(_, word)| matches!(word, Some(None))) {
            return Err(self.syntax_error(format!("missing value for {} in {}", axis, context)));
        }
        Ok(axes.map(|_, word| word.flatten()))
    }

    fn parse_words(&self, rest: &str) -> Result<Words, GcodeError> {
        static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = WORD_REGEX.get_or_init(|| {
            Regex::new(r"([A-Za-z])\s*([^A-Za-z\s]*)").expect("invalid regex pattern")
        });

        let mut words = Words::default();
        for caps in regex.captures_iter(rest) {
            let letter = caps[1].chars().next().unwrap_or(' ').to_ascii_uppercase();
            let slot = match letter {
                'X' => &mut words.x,
                'Y' => &mut words.y,
                'Z' => &mut words.z,
                'E' => &mut words.e,
                _ => continue,
            };
            let raw = &caps[2];
            let value = if raw.is_empty() {
                None
            } else {
                let parsed = raw.parse::<f64>().ok().filter(|v| v.is_finite());
                match parsed {
                    Some(v) => Some(v),
                    None => {
                        return Err(
                            self.syntax_error(format!("invalid value '{}' for {}", raw, letter))
                        )
                    }
                }
            };
            *slot = Some(value);
        }
        Ok(words)
    }

    fn syntax_error(&self, reason: impl Into<String>) -> GcodeError {
        GcodeError::InvalidSyntax {
            line_number: self.line_number,
            reason: reason.into(),
        }
    }
}

/// Remove comments and checksum from a line
fn strip_line(line: &str) -> &str {
    let end = line.find([';', '(', '*']).unwrap_or(line.len());
    line[..end].trim()
}

/// Split off the leading command word, skipping an `N` line number
fn split_command(line: &str) -> Option<(Command, &str)> {
    static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COMMAND_REGEX.get_or_init(|| {
        Regex::new(r"^(?:[Nn]\d+\s*)?([GgMm])0*(\d+)(?:\.(\d+))?(?:\s+|$|[A-Za-z])")
            .expect("invalid regex pattern")
    });

    let caps = regex.captures(line)?;
    let letter = caps[1].chars().next()?.to_ascii_uppercase();
    let code = caps[2].parse::<u32>().ok()?;
    let sub = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
    let command = Command::lookup(letter, code, sub)?;

    // The optional trailing letter belongs to the first word, e.g. "G1X10".
    let end = caps.get(2).map(|m| m.end())?;
    let end = caps.get(3).map_or(end, |m| m.end());
    Some((command, &line[end..]))
}
