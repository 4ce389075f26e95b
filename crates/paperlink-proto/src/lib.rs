//! Wire protocol for the paperlink visual channel.
//!
//! Every unit that crosses the channel - data packet or acknowledgement -
//! uses the same five-byte envelope:
//!
//! ```text
//! offset  size  field
//! 0       4     crc32(seq || payload), little-endian
//! 4       1     sequence number
//! 5       k     payload bytes (k <= DATA_SIZE; 0 for ACKs)
//! ```
//!
//! The checksum covers the sequence byte concatenated with the payload,
//! never itself. All multi-byte integers are little-endian on the wire.
//!
//! Because the medium treats QR payloads as text, packet bytes are wrapped
//! with base64 before they reach a symbol and unwrapped after a scan; see
//! [`to_visual`] / [`from_visual`]. The wrap is mandatory - raw bytes above
//! 0x7f do not survive every decoder.

pub mod errors;
mod packet;
mod visual;

pub use errors::{ProtocolError, Result};
pub use packet::Packet;
pub use visual::{from_visual, to_visual};

/// Total on-wire size of a full data packet, in bytes.
pub const PACKET_SIZE: usize = 1024;

/// Size of the CRC-32 checksum field.
pub const CHECKSUM_SIZE: usize = 4;

/// Size of the sequence-number field.
pub const SEQ_NUM_SIZE: usize = 1;

/// Fixed envelope overhead preceding the payload.
pub const HEADER_SIZE: usize = CHECKSUM_SIZE + SEQ_NUM_SIZE;

/// Maximum payload bytes per packet.
pub const DATA_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

/// Number of distinct sequence values (one byte on the wire).
pub const SEQ_SPACE: usize = 1 << (8 * SEQ_NUM_SIZE);

/// Go-Back-N window size.
///
/// Two values of the sequence space are left unused so a wrapped sequence
/// number can never be confused with a fresh one under reordering.
pub const WINDOW_SIZE: usize = SEQ_SPACE - 2;

/// On-wire size of an acknowledgement (envelope only, no payload).
pub const ACK_SIZE: usize = HEADER_SIZE;
