//! Production endpoint pieces for the paperlink visual channel.
//!
//! Everything the pure ARQ core delegates to the physical world lives
//! here: the QR PNG emitter feeding the printing directory, the camera
//! frame source speaking to the webcam multiplexer over TCP, the spool
//! directories shared with the application layer, and the system clock.
//!
//! The `paperlink` binary wires these into the core drivers; see
//! `main.rs`.

pub mod camera;
pub mod error;
pub mod qr_emitter;
pub mod spool;
pub mod system_env;

pub use camera::CameraFrameSource;
pub use error::StationError;
pub use qr_emitter::QrPngEmitter;
pub use spool::{IncomingSpool, OutgoingSpool};
pub use system_env::SystemEnv;
