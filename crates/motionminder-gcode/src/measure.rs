//! Per-file travel measurement

use crate::parser::MotionParser;
use crate::reader::GcodeFileReader;
use motionminder_core::{AxisMap, GcodeError};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Travel measured from one G-code file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDistance {
    pub path: PathBuf,
    /// Per-axis travel in mm
    pub travel: AxisMap<f64>,
    /// Net extrusion in mm at the point the read stopped
    pub extrusion_mm: f64,
    pub lines_read: u64,
    /// True if the extrusion cutoff ended the read before end of file
    pub truncated: bool,
}

/// Measure the per-axis travel of a G-code file
///
/// With `max_extrusion_mm` set, reading stops once the cumulative extrusion
/// exceeds it, which approximates how far a cancelled print got. Any
/// syntax error makes the whole file fail.
pub fn measure_file(
    path: impl AsRef<Path>,
    max_extrusion_mm: Option<f64>,
) -> Result<FileDistance, GcodeError> {
    let path = path.as_ref();
    let reader = GcodeFileReader::new(path)?;
    let mut parser = MotionParser::new();
    let mut travel = AxisMap::splat(0.0);

    let stats = reader.read_lines(|line| {
        if let Some(delta) = parser.parse_line(line)? {
            travel = travel.add(&delta.travel);
        }
        match max_extrusion_mm {
            Some(limit) if parser.extruded_mm() > limit => Ok(ControlFlow::Break(())),
            _ => Ok(ControlFlow::Continue(())),
        }
    })?;

    tracing::debug!(
        "Measured {} ({} lines, {:.3} mm total, {} ms)",
        path.display(),
        stats.lines_read,
        travel.total(),
        stats.read_time_ms
    );

    Ok(FileDistance {
        path: path.to_path_buf(),
        travel,
        extrusion_mm: parser.extruded_mm(),
        lines_read: stats.lines_read,
        truncated: stats.stopped_early,
    })
}
