//! Per-axis odometer record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative distance and maintenance state of one axis
///
/// The maintenance threshold is always stored as an absolute odometer
/// target, however the operator specified it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometerRecord {
    /// Total travel in mm; never negative
    pub total_distance_mm: f64,
    /// Absolute odometer value at which maintenance is due
    pub maintenance_threshold_mm: Option<f64>,
    /// Odometer value when the threshold was last set
    pub maintenance_set_at_mm: Option<f64>,
    /// Last mutation time
    pub updated_at: Option<DateTime<Utc>>,
}

impl OdometerRecord {
    /// True once the odometer reached or passed the stored threshold
    pub fn is_maintenance_due(&self) -> bool {
        self.maintenance_threshold_mm
            .is_some_and(|threshold| self.total_distance_mm >= threshold)
    }

    /// Distance left before maintenance; negative when overdue
    pub fn remaining_mm(&self) -> Option<f64> {
        self.maintenance_threshold_mm
            .map(|threshold| threshold - self.total_distance_mm)
    }

    /// Fraction of the maintenance interval still left, 1.0 right after setting it
    ///
    /// Returns `None` without a threshold or when the interval is empty.
    pub fn health(&self) -> Option<f64> {
        let threshold = self.maintenance_threshold_mm?;
        let set_at = self.maintenance_set_at_mm.unwrap_or(0.0);
        let interval = threshold - set_at;
        if interval <= 0.0 {
            return None;
        }
        let travelled = self.total_distance_mm - set_at;
        Some((interval - travelled) / interval)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
