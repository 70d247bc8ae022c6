//! # Motion Minder
//!
//! Axis odometer and maintenance tracker for Klipper-driven 3D printers.
//!
//! ## Architecture
//!
//! Motion Minder is organized as a workspace with multiple crates:
//!
//! 1. **motionminder-core** - Axis data model, units, host events, errors
//! 2. **motionminder-settings** - Configuration loading and validation
//! 3. **motionminder-store** - Durable per-axis odometer records
//! 4. **motionminder-gcode** - G-code motion parsing and history replay
//! 5. **motionminder-engine** - Motion sampler, command dispatch, facade
//! 6. **motionminder** - Command-line binary that integrates all crates
//!
//! ## Features
//!
//! - **Dual-mode tracking**: live position samples while idle, G-code parsing while printing
//! - **Durable odometer**: atomic snapshot writes, retry after failed writes
//! - **Maintenance alerts**: absolute thresholds, relative input, health percentage
//! - **History replay**: recompute travel from archived jobs and merge on request

use std::path::Path;

pub use motionminder_core::{
    Axis, AxisMap, AxisSet, DistanceUnit, Error, EventDispatcher, MergePolicy, MotionEvent,
    Position, Result, TrackingMode,
};
pub use motionminder_engine::{parse_command, Command, MotionMinder};
pub use motionminder_gcode::{HistoryJob, HistorySummary};
pub use motionminder_settings::Config;
pub use motionminder_store::{delete_store, OdometerRecord, OdometerStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - `RUST_LOG` environment variable support on top of `level`
/// - Output to stderr, or appended to `log_file` when given
///
/// Command responses go to stdout, so logs never mix with them.
pub fn init_logging(level: tracing::Level, log_file: Option<&Path>) -> anyhow::Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let fmt_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}
