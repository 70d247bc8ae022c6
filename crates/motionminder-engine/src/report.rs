//! Operator-facing stats report

use motionminder_core::{format_distance, AxisMap, AxisSet, DistanceUnit};
use motionminder_store::OdometerRecord;
use std::fmt::Write;

/// Render odometer and maintenance state for `axes`
///
/// Every distance uses `unit` when given, otherwise the unit recommended
/// for its own magnitude.
pub fn format_stats(
    records: &AxisMap<OdometerRecord>,
    axes: AxisSet,
    unit: Option<DistanceUnit>,
) -> String {
    let pick = |value_mm: f64| unit.unwrap_or_else(|| DistanceUnit::recommended_for(value_mm));
    let mut out = String::new();

    for axis in axes.iter() {
        let record = &records[axis];
        let total = record.total_distance_mm;
        let _ = writeln!(out, "{}: {}", axis, format_distance(total, pick(total)));

        let Some(remaining) = record.remaining_mm() else {
            let _ = writeln!(out, "  Maintenance not set.");
            continue;
        };

        if record.is_maintenance_due() {
            let overdue = -remaining;
            let _ = write!(out, "  Maintenance due");
            if overdue > 0.0 {
                let _ = write!(out, " (overdue by {})", format_distance(overdue, pick(overdue)));
            }
        } else {
            let _ = write!(
                out,
                "  Next maintenance in: {}",
                format_distance(remaining, pick(remaining))
            );
        }
        match record.health() {
            Some(health) => {
                let _ = writeln!(out, ", health {:.2}%", health * 100.0);
            }
            None => out.push('\n'),
        }
    }

    out.trim_end().to_string()
}
