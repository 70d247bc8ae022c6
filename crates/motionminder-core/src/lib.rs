//! # Motion Minder Core
//!
//! Core types and utilities for Motion Minder.
//! Provides the axis data model, distance units, the host event feed
//! and the layered error types shared by every other crate.

pub mod data;
pub mod error;
pub mod event;
pub mod units;

pub use data::{
    Axis, AxisMap, AxisSet, MergePolicy, MotionSample, Position, SampleSource, TrackingMode,
};

pub use error::{CommandError, Error, GcodeError, Result, StoreError};

pub use event::{EventDispatcher, MotionEvent};

pub use units::{convert, convert_str, format_distance, format_distance_auto, DistanceUnit};
