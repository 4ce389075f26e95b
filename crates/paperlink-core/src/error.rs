//! Error types for the link layer and drivers.
//!
//! Corruption on the channel is NOT an error here - the state machines
//! absorb it and recover through retransmission. These types cover the
//! things retransmission cannot fix: a dead camera, a failed artifact
//! write, spool I/O, and user cancellation.

use std::io;

use thiserror::Error;

/// Errors surfaced by link implementations (frame sources, emitters,
/// spools).
#[derive(Error, Debug)]
pub enum LinkError {
    /// User asked the endpoint to stop while it was waiting on the channel.
    #[error("cancelled by user")]
    Cancelled,

    /// The frame source failed to produce a usable frame.
    ///
    /// Transient: a single bad read is indistinguishable from a blurry
    /// frame, so drivers retry and only escalate after repeated failures.
    #[error("frame source failure: {0}")]
    FrameSource(String),

    /// Producing a visual artifact failed (QR generation or image write).
    #[error("artifact emission failed: {0}")]
    Emit(String),

    /// Filesystem I/O on a spool or delivery sink.
    #[error("spool I/O: {0}")]
    Io(#[from] io::Error),
}

impl LinkError {
    /// True if retrying the same operation may succeed.
    ///
    /// Frame-source hiccups are transient; everything else either reflects
    /// explicit user intent (`Cancelled`) or broken local resources.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FrameSource(_))
    }
}

/// Fatal errors terminating a driver loop.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A non-transient link failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The chunk source violated the codec contract (oversize chunk).
    /// A configuration or programming error, never channel damage.
    #[error(transparent)]
    Protocol(#[from] paperlink_proto::ProtocolError),

    /// The frame source failed too many times in a row to keep trusting it.
    #[error("frame source failed {failures} consecutive times, last: {last}")]
    FrameSourceFailed {
        /// Consecutive failure count at escalation
        failures: u32,
        /// Message of the final failure
        last: String,
    },
}
