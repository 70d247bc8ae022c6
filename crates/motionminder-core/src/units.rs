//! Unit conversion utilities
//!
//! Distances are stored in millimeters and converted to meters or
//! kilometers for operator input and display.

use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters in one meter
pub const MM_PER_M: f64 = 1_000.0;

/// Millimeters in one kilometer
pub const MM_PER_KM: f64 = 1_000_000.0;

/// Distance unit accepted by operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    /// Millimeters
    #[serde(rename = "mm")]
    Millimeters,
    /// Meters
    #[serde(rename = "m")]
    Meters,
    /// Kilometers
    #[serde(rename = "km")]
    Kilometers,
}

impl Default for DistanceUnit {
    fn default() -> Self {
        Self::Kilometers
    }
}

impl DistanceUnit {
    /// Millimeters per one of this unit
    pub fn mm_factor(self) -> f64 {
        match self {
            Self::Millimeters => 1.0,
            Self::Meters => MM_PER_M,
            Self::Kilometers => MM_PER_KM,
        }
    }

    /// Convert a value in this unit to millimeters
    pub fn to_mm(self, value: f64) -> f64 {
        value * self.mm_factor()
    }

    /// Convert a value in millimeters to this unit
    pub fn from_mm(self, value_mm: f64) -> f64 {
        value_mm / self.mm_factor()
    }

    /// Short label ("mm", "m" or "km")
    pub fn label(self) -> &'static str {
        match self {
            Self::Millimeters => "mm",
            Self::Meters => "m",
            Self::Kilometers => "km",
        }
    }

    /// The unit that keeps a millimeter magnitude readable
    ///
    /// Below 1 m stays in mm, below 1 km switches to m, km otherwise.
    pub fn recommended_for(value_mm: f64) -> Self {
        let magnitude = value_mm.abs();
        if magnitude < MM_PER_M {
            Self::Millimeters
        } else if magnitude < MM_PER_KM {
            Self::Meters
        } else {
            Self::Kilometers
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DistanceUnit {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" => Ok(Self::Millimeters),
            "m" => Ok(Self::Meters),
            "km" => Ok(Self::Kilometers),
            _ => Err(CommandError::InvalidUnit {
                unit: s.to_string(),
            }),
        }
    }
}

/// Convert `value` between units using fixed linear scale factors
pub fn convert(value: f64, from: DistanceUnit, to: DistanceUnit) -> f64 {
    if from == to {
        return value;
    }
    to.from_mm(from.to_mm(value))
}

/// Convert using unit names, failing with `InvalidUnit` on unknown names
pub fn convert_str(value: f64, from: &str, to: &str) -> Result<f64, CommandError> {
    let from = from.parse::<DistanceUnit>()?;
    let to = to.parse::<DistanceUnit>()?;
    Ok(convert(value, from, to))
}

/// Format a millimeter distance in the given unit with 3 decimals
pub fn format_distance(value_mm: f64, unit: DistanceUnit) -> String {
    format!("{:.3} {}", unit.from_mm(value_mm), unit)
}

/// Format a millimeter distance in its recommended unit
pub fn format_distance_auto(value_mm: f64) -> String {
    format_distance(value_mm, DistanceUnit::recommended_for(value_mm))
}
