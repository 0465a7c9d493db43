// Load-time error types.
// Per-frame operations (height queries, walker steps) are total and have no
// error path; only loading terrain, paths and configuration can fail.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while building a terrain from a heightmap.
#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("failed to decode heightmap {path:?}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("heightmap grid must be at least 2x2, got {width}x{height}")]
    GridTooSmall { width: u32, height: u32 },

    #[error("expected {expected} elevation samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },
}

/// Failure while loading a path file.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("failed to open path file {path:?}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path file {path:?} contains no complete x y z triple")]
    Empty { path: PathBuf },
}

/// Invalid command-line configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("flag {0} expects a value")]
    MissingValue(String),

    #[error("flag {flag} expects a number, got {value:?}")]
    InvalidNumber { flag: String, value: String },

    #[error("flag {flag} must be positive, got {value}")]
    NotPositive { flag: String, value: f32 },

    #[error("unknown flag {0}")]
    UnknownFlag(String),

    #[error("unknown boundary policy {0:?} (expected \"bounce\" or \"loop\")")]
    UnknownPolicy(String),
}
