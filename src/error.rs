//! Error types for the controller.

use std::io;
use thiserror::Error;

/// Errors raised by the controller and its configuration layer.
#[derive(Error, Debug)]
pub enum Error {
    /// The name matches no capability or point of any attached fixture.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A capability was invoked without a value to buffer.
    #[error("capability {0} needs a value")]
    MissingValue(String),

    /// Writing a frame to the bus process failed.
    #[error("transport failure: {0}")]
    TransportFailure(#[source] io::Error),

    /// The frame length changed while an animation mutation ran.
    #[error("frame length changed during animation ({before} -> {after})")]
    FrameLengthMismatch { before: usize, after: usize },

    /// The frame rate gives no usable delay between ticks.
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;
