//! Error handling for Motion Minder
//!
//! Provides error types for all layers of the tracker:
//! - Command errors (operator arguments and value validation)
//! - Store errors (odometer persistence)
//! - G-Code errors (motion parsing and history replay)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Command error type
///
/// Raised synchronously while validating operator input. None of these
/// variants leave any state mutated behind them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Unit is not one of mm, m or km
    #[error("Invalid unit '{unit}'. Expected one of: mm, m, km")]
    InvalidUnit {
        /// The unit text as given.
        unit: String,
    },

    /// Axis letter is not tracked
    #[error("Invalid '{axis}' axis. Axes must be X, Y, Z or a combination such as XY or ZX")]
    InvalidAxis {
        /// The offending axis text.
        axis: String,
    },

    /// Argument is unknown, duplicated, malformed or not applicable
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// The argument name.
        argument: String,
        /// Why the argument was rejected.
        reason: String,
    },

    /// The operation would produce an invalid value (e.g. a negative odometer)
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// Why the value was rejected.
        reason: String,
    },
}

impl CommandError {
    /// Shorthand for an [`CommandError::InvalidArgument`]
    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`CommandError::InvalidValue`]
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// Store error type
///
/// Represents failures reading or writing the durable odometer snapshot.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Snapshot exists but could not be read
    #[error("Failed to load odometer store {path}: {reason}")]
    LoadFailed {
        /// Snapshot path.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// Snapshot could not be written or synced
    #[error("Failed to persist odometer store {path}: {reason}")]
    SaveFailed {
        /// Snapshot path.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// Snapshot content is not a valid odometer document
    #[error("Corrupted odometer store {path}: {reason}")]
    Corrupted {
        /// Snapshot path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// G-Code error type
///
/// Raised while parsing motion commands or replaying archived files.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// A recognised command carried an unusable word
    #[error("Invalid syntax at line {line_number}: {reason}")]
    InvalidSyntax {
        /// 1-based line number within the stream.
        line_number: u64,
        /// The reason for the syntax error.
        reason: String,
    },

    /// The file could not be opened or decoded
    #[error("File error for {path}: {reason}")]
    FileError {
        /// File path.
        path: String,
        /// The reason for the file error.
        reason: String,
    },

    /// A batch was cancelled before completion
    #[error("History processing cancelled after {completed} of {total} files")]
    Cancelled {
        /// Files finished before cancellation.
        completed: usize,
        /// Files in the batch.
        total: usize,
    },
}

/// Main error type for Motion Minder
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this error was caused by operator input
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }

    /// Check if this is a persistence failure
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }

    /// Check if a history batch was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Gcode(GcodeError::Cancelled { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::InvalidUnit {
            unit: "ft".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid unit 'ft'. Expected one of: mm, m, km");

        let err = CommandError::invalid_argument("FOO", "unknown argument");
        assert_eq!(err.to_string(), "Invalid argument 'FOO': unknown argument");
    }

    #[test]
    fn test_error_classification() {
        let err: Error = CommandError::invalid_value("negative").into();
        assert!(err.is_command_error());
        assert!(!err.is_persistence_failure());

        let err: Error = StoreError::SaveFailed {
            path: "/tmp/odometer.json".to_string(),
            reason: "disk full".to_string(),
        }
        .into();
        assert!(err.is_persistence_failure());

        let err: Error = GcodeError::Cancelled {
            completed: 1,
            total: 3,
        }
        .into();
        assert!(err.is_gcode_error());
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
