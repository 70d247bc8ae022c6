//! Streaming G-code file reader
//!
//! Job files routinely run to hundreds of megabytes, so they are read
//! line by line through a large buffer instead of being loaded whole.

use motionminder_core::GcodeError;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Buffer size for reading large files (256 KB)
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// File read statistics
#[derive(Debug, Clone, Default)]
pub struct FileReadStats {
    /// Total bytes read
    pub bytes_read: u64,
    /// Total lines read
    pub lines_read: u64,
    /// File size in bytes
    pub file_size: u64,
    /// Time taken to read (milliseconds)
    pub read_time_ms: u64,
    /// True if the callback stopped the read early
    pub stopped_early: bool,
}

impl FileReadStats {
    /// Get progress percentage
    pub fn progress_percent(&self) -> f64 {
        if self.file_size == 0 {
            0.0
        } else {
            (self.bytes_read as f64 / self.file_size as f64) * 100.0
        }
    }
}

/// G-code file reader with streaming support
#[derive(Debug, Clone)]
pub struct GcodeFileReader {
    path: PathBuf,
    file_size: u64,
}

impl GcodeFileReader {
    /// Create a reader for an existing regular file
    pub fn new(path: impl AsRef<Path>) -> Result<Self, GcodeError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(file_error(&path, "file does not exist"));
        }

        if !path.is_file() {
            return Err(file_error(&path, "path is not a file"));
        }

        let metadata = fs::metadata(&path).map_err(|e| file_error(&path, e))?;
        let file_size = metadata.len();

        Ok(Self { path, file_size })
    }

    /// Get file size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream lines into `callback` until the file ends or it breaks
    ///
    /// I/O and decoding failures surface as [`GcodeError::FileError`];
    /// callback errors are returned unchanged.
    pub fn read_lines<F>(&self, mut callback: F) -> Result<FileReadStats, GcodeError>
    where
        F: FnMut(&str) -> Result<ControlFlow<()>, GcodeError>,
    {
        let start_time = Instant::now();
        let file = File::open(&self.path).map_err(|e| file_error(&self.path, e))?;
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut stats = FileReadStats {
            file_size: self.file_size,
            ..FileReadStats::default()
        };

        for line_result in reader.lines() {
            let line = line_result.map_err(|e| file_error(&self.path, e))?;
            stats.bytes_read += line.len() as u64 + 1;
            stats.lines_read += 1;

            if callback(&line)?.is_break() {
                stats.stopped_early = true;
                break;
            }
        }

        stats.read_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(stats)
    }
}

fn file_error(path: &Path, reason: impl ToString) -> GcodeError {
    GcodeError::FileError {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
