//! # Motion Minder Engine
//!
//! Dual-mode motion tracking and operator command dispatch on top of the
//! odometer store.
//!
//! - [`MotionSampler`]: idle position sampling and printing G-code parsing
//! - [`parse_command`]: console command validation
//! - [`MotionMinder`]: facade tying the event feed, commands and history together

pub mod command;
pub mod minder;
pub mod report;
pub mod sampler;

pub use command::{parse_command, Command, COMMAND_VERB};
pub use minder::MotionMinder;
pub use report::format_stats;
pub use sampler::MotionSampler;
