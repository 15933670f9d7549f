//! Error types for result aggregation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while merging or inspecting results.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// There was nothing to average.
    #[error("No samples to average")]
    NoSamples,

    /// A sample's size differs from the first sample's.
    #[error("Sample is {found_width}x{found_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },

    /// Decoding or encoding an image failed.
    #[error("Image error for {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Listing the result directory failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl AggregateError {
    pub fn dimension_mismatch(expected: (u32, u32), found: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            width: expected.0,
            height: expected.1,
            found_width: found.0,
            found_height: found.1,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for aggregation.
pub type AggregateResult<T> = Result<T, AggregateError>;
