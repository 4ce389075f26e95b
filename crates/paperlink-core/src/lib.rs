//! Go-Back-N ARQ over a lossy visual channel.
//!
//! The channel is asymmetric, high-latency and half-duplex: one endpoint
//! prints QR codes, the other watches them through a camera, and
//! acknowledgements travel back the same way. Reliability comes entirely
//! from this layer - the QR symbols themselves carry minimal error
//! correction.
//!
//! # Architecture
//!
//! The protocol endpoints are pure state machines ([`Sender`], [`Receiver`])
//! that take time as input and return actions for a driver to execute. They
//! perform no I/O, which keeps every state transition deterministic and
//! directly testable under virtual time. The blocking loops in [`driver`]
//! wire the machines to the physical world through four narrow traits
//! ([`FrameSource`], [`VisualEmitter`], [`ChunkSource`], [`DeliverySink`]).
//!
//! Each endpoint is a single cooperative thread of control: it suspends only
//! while waiting for a camera frame or sleeping between polls, and no state
//! is ever observed by two actors at once.

pub mod driver;
pub mod env;
pub mod error;
pub mod link;
pub mod receiver;
pub mod seq;
pub mod sender;

pub use driver::{
    ReceiverDriverConfig, ReceiverReport, SenderDriverConfig, SenderReport, TransferOutcome,
    run_receiver, run_sender,
};
pub use env::Environment;
pub use error::{DriverError, LinkError};
pub use link::{
    ArtifactId, ArtifactTag, CameraFrame, CancelFlag, ChunkSource, DeliverySink, FrameSource,
    VisualEmitter,
};
pub use receiver::{Receiver, ReceiverAction, ReceiverState, RecvOutcome};
pub use sender::{AckOutcome, Sender, SenderAction, SenderConfig};
