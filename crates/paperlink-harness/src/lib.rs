//! Deterministic simulation harness for the paperlink ARQ protocol.
//!
//! Replaces the camera, the printer tray, and wall-clock time with
//! in-memory stand-ins so whole transfers run in microseconds and every
//! run with the same seed is byte-identical:
//!
//! - [`SimEnv`] - virtual monotonic clock; `sleep` just advances it.
//! - [`LossyDirection`] - one direction of the visual channel as an ordered
//!   queue with scripted and seeded-random fault injection (drop, corrupt,
//!   duplicate). Its sending side implements `VisualEmitter` and its camera
//!   side `FrameSource`, so protocol code sees the same seams as in
//!   production; [`SharedDirection`] lets two driver threads hold the ends
//!   of one direction.
//! - [`TransferSim`] - a sender and a receiver in lockstep across two lossy
//!   directions, with protocol invariants checked after every step.
//!
//! # Invariant Testing
//!
//! The [`invariants`] module verifies WHAT must always hold (window bound,
//! ACK alignment, delivered-is-prefix-of-sent, exactly-once delivery)
//! across every execution path, independent of any specific scenario. Use
//! [`InvariantRegistry::standard()`] everywhere.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_link;
pub mod transfer_sim;

pub use invariants::{
    AckAlignment, DeliveryPrefix, ExactlyOnce, Invariant, InvariantKind, InvariantRegistry,
    LinkSnapshot, Violation, WindowBound,
};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_link::{ChaosConfig, FaultPlan, LossyDirection, SharedDirection};
pub use transfer_sim::{SimFailure, TransferSim};
