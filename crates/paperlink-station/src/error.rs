//! Station-level error type.

use std::io;

use paperlink_core::DriverError;
use thiserror::Error;

/// Errors from endpoint setup and execution.
#[derive(Error, Debug)]
pub enum StationError {
    /// Bad flag combination or unusable path.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connecting to or talking with the camera multiplexer failed during
    /// setup.
    #[error("camera I/O: {0}")]
    Camera(#[from] io::Error),

    /// The ARQ driver terminated with a fatal error.
    #[error(transparent)]
    Driver(#[from] DriverError),
}
