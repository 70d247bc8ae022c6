//! Axis and motion data model
//!
//! Distances are tracked per axis with no cross-axis coupling, so most of
//! the tracker works on [`AxisMap`] values indexed by [`Axis`].

use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// A tracked logical axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All tracked axes in canonical order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of the axis in [`Axis::ALL`]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Lowercase axis letter
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    /// Parse a single axis letter, case-insensitive
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter().to_ascii_uppercase())
    }
}

impl FromStr for Axis {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_letter(c).ok_or_else(|| CommandError::InvalidAxis {
                axis: s.to_string(),
            }),
            _ => Err(CommandError::InvalidAxis {
                axis: s.to_string(),
            }),
        }
    }
}

/// A non-empty or empty selection of axes, iterated in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisSet(u8);

impl AxisSet {
    /// No axes
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every tracked axis
    pub fn all() -> Self {
        Axis::ALL.iter().fold(Self::empty(), |set, axis| set.with(*axis))
    }

    /// This set plus `axis`
    pub fn with(self, axis: Axis) -> Self {
        Self(self.0 | (1 << axis.index()))
    }

    /// This set minus `axis`
    pub fn without(self, axis: Axis) -> Self {
        Self(self.0 & !(1 << axis.index()))
    }

    pub fn contains(self, axis: Axis) -> bool {
        self.0 & (1 << axis.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate contained axes in canonical order
    pub fn iter(self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().filter(move |axis| self.contains(*axis))
    }
}

impl FromIterator<Axis> for AxisSet {
    fn from_iter<I: IntoIterator<Item = Axis>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, axis| set.with(axis))
    }
}

impl FromStr for AxisSet {
    type Err = CommandError;

    /// Parse axis letters such as `xyz`, `XZ` or `zx`; the empty string is an empty set
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .chars()
            .map(|c| {
                Axis::from_letter(c).ok_or_else(|| CommandError::InvalidAxis {
                    axis: c.to_string(),
                })
            })
            .collect()
    }
}

impl fmt::Display for AxisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.iter() {
            write!(f, "{}", axis.letter())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for AxisSet {
    type Error = CommandError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AxisSet> for String {
    fn from(set: AxisSet) -> Self {
        set.to_string()
    }
}

/// One value per tracked axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisMap<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

/// Carriage or commanded position in millimeters
pub type Position = AxisMap<f64>;

impl<T> AxisMap<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    /// Build a map by evaluating `f` for each axis
    pub fn from_fn(mut f: impl FnMut(Axis) -> T) -> Self {
        Self {
            x: f(Axis::X),
            y: f(Axis::Y),
            z: f(Axis::Z),
        }
    }

    /// Iterate `(axis, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &T)> {
        Axis::ALL.into_iter().map(move |axis| (axis, &self[axis]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Axis, &T) -> U) -> AxisMap<U> {
        AxisMap::from_fn(|axis| f(axis, &self[axis]))
    }
}

impl AxisMap<f64> {
    /// Same value on every axis
    pub fn splat(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// True when every axis is exactly zero
    pub fn is_zero(&self) -> bool {
        self.iter().all(|(_, v)| *v == 0.0)
    }

    /// Axis-wise sum
    pub fn add(&self, other: &Self) -> Self {
        Self::from_fn(|axis| self[axis] + other[axis])
    }

    /// Sum over all axes
    pub fn total(&self) -> f64 {
        self.x + self.y + self.z
    }
}

impl<T> Index<Axis> for AxisMap<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl<T> IndexMut<Axis> for AxisMap<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

/// Which feed a motion sample was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// Live carriage position snapshot (idle mode)
    LivePosition,
    /// Parsed G-code motion command (printing mode)
    GcodeCommand,
}

/// Ephemeral per-axis distance delta, consumed immediately by the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub axis: Axis,
    pub delta_mm: f64,
    pub source: SampleSource,
}

impl MotionSample {
    pub fn new(axis: Axis, delta_mm: f64, source: SampleSource) -> Self {
        Self {
            axis,
            delta_mm,
            source,
        }
    }
}

/// Active tracking mode; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// No print job; tracked through position samples
    #[default]
    Idle,
    /// Print job running; tracked through G-code parsing
    Printing,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Printing => write!(f, "printing"),
        }
    }
}

/// How a recomputed history total is applied to the live odometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Add the recomputed distance to the current odometer
    #[default]
    Add,
    /// Replace the current odometer with the recomputed distance
    Replace,
}

impl FromStr for MergePolicy {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" | "accumulate" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            _ => Err(CommandError::invalid_argument(
                "MERGE",
                format!("'{}' is not ADD or REPLACE", s),
            )),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Replace => write!(f, "replace"),
        }
    }
}
