//! Contracts between the ARQ core and the physical channel.
//!
//! The state machines never touch a camera, a printer queue, or a
//! filesystem. Everything physical sits behind these four traits, so the
//! same protocol code runs against a webcam multiplexer in production and
//! an in-memory lossy queue in the simulation harness.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;

use crate::error::LinkError;

/// One decoded camera frame: zero or more recognized QR payloads.
///
/// Payloads are opaque byte strings exactly as the QR decoder produced
/// them; the state machines apply the visual unwrap and CRC check
/// themselves. A frame with no payloads is a camera looking at nothing
/// interesting - common, and not an error.
#[derive(Debug, Clone, Default)]
pub struct CameraFrame {
    /// Detected QR payloads, in detection order
    pub payloads: Vec<Bytes>,
}

impl CameraFrame {
    /// Frame with no detected symbols.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if the frame carried no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// A lazy, infinite stream of decoded camera frames.
///
/// `next_frame` blocks until a frame is available. Frames are never
/// replayed; each call advances the stream. The implementation owns the
/// camera connection exclusively for the session.
pub trait FrameSource {
    /// Block until the next frame is available and return it.
    ///
    /// # Errors
    ///
    /// - [`LinkError::Cancelled`] once the user's cancel flag is raised
    /// - [`LinkError::FrameSource`] for transient read/decode failures -
    ///   drivers retry these and escalate only after many in a row
    fn next_frame(&mut self) -> Result<CameraFrame, LinkError>;
}

/// Produces a visual artifact for a packet so an out-of-band mechanism
/// (printer, screen) can surface it to the peer's camera.
///
/// Implementations MUST apply the visual text wrap
/// ([`paperlink_proto::to_visual`]) before building the symbol. Emission is
/// fire-and-forget: the medium gives no acknowledgement, the ARQ layer
/// does.
pub trait VisualEmitter {
    /// Emit `packet` under `tag`, overwriting any previous artifact with
    /// the same tag (retransmissions collide on purpose).
    fn emit(&mut self, packet: &[u8], tag: ArtifactTag) -> Result<ArtifactId, LinkError>;
}

/// Source of outgoing payload chunks for the sender.
///
/// Polled before every send cycle so input queued mid-transfer is picked
/// up. Every returned chunk must be at most
/// [`DATA_SIZE`](paperlink_proto::DATA_SIZE) bytes.
pub trait ChunkSource {
    /// Return chunks that became available since the last poll.
    fn poll_chunks(&mut self) -> Result<Vec<Bytes>, LinkError>;
}

/// Destination for in-order delivered payload bytes on the receiver.
pub trait DeliverySink {
    /// Append one delivered payload to the output stream.
    fn deliver(&mut self, payload: &[u8]) -> Result<(), LinkError>;
}

/// Label distinguishing emitted artifacts.
///
/// Renders as `packet_<seq>` / `ack_<seq>`, the names under which artifacts
/// land in the printing directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactTag {
    /// Data packet with this sequence number
    Data(u8),
    /// Acknowledgement of this sequence number
    Ack(u8),
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(seq) => write!(f, "packet_{seq}"),
            Self::Ack(seq) => write!(f, "ack_{seq}"),
        }
    }
}

/// Opaque identifier of an emitted artifact (a path, a queue slot, a test
/// index - whatever the emitter namespace uses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactId(pub String);

/// Shared cancellation flag.
///
/// Raised from outside the ARQ loop (a quit key, a signal); observed by
/// blocking link implementations, which then return
/// [`LinkError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, un-raised flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_render_like_artifact_names() {
        assert_eq!(ArtifactTag::Data(17).to_string(), "packet_17");
        assert_eq!(ArtifactTag::Ack(0).to_string(), "ack_0");
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let observer = flag.clone();

        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }
}
