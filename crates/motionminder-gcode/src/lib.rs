//! # Motion Minder G-code
//!
//! Turns G-code into per-axis travel. The same parser serves the live
//! printing feed and the replay of archived jobs.

pub mod history;
pub mod measure;
pub mod parser;
pub mod reader;

pub use history::{CancelToken, FileFailure, HistoryEntry, HistoryJob, HistorySummary};
pub use measure::{measure_file, FileDistance};
pub use parser::{DistanceMode, LengthUnits, MotionDelta, MotionParser, MotionState, MM_PER_INCH};
pub use reader::{FileReadStats, GcodeFileReader};
