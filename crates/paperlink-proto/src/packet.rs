//! Packet framing: the five-byte CRC envelope shared by data and ACK paths.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    CHECKSUM_SIZE, DATA_SIZE, HEADER_SIZE,
    errors::{ProtocolError, Result},
};

/// A logical packet: sequence number plus payload.
///
/// The same framing serves both directions of the protocol. A data packet
/// carries up to [`DATA_SIZE`](crate::DATA_SIZE) payload bytes; an
/// acknowledgement carries none, and its sequence byte is the acknowledged
/// sequence number.
///
/// # Invariants
///
/// - `payload.len() <= DATA_SIZE`, enforced by [`Packet::data`] and verified
///   by [`Packet::decode`].
/// - For every encoded packet, `crc32(seq || payload)` equals the checksum
///   field. [`Packet::decode`] rejects everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number (or acknowledged sequence number for ACKs)
    pub seq: u8,
    /// Payload bytes; empty for acknowledgements
    pub payload: Bytes,
}

impl Packet {
    /// Build a data packet.
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the payload exceeds
    /// [`DATA_SIZE`](crate::DATA_SIZE). Chunking input to size is the
    /// caller's job; the codec refuses to truncate.
    pub fn data(seq: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();

        if payload.len() > DATA_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: DATA_SIZE });
        }

        Ok(Self { seq, payload })
    }

    /// Build an acknowledgement for `seq`.
    #[must_use]
    pub fn ack(seq: u8) -> Self {
        Self { seq, payload: Bytes::new() }
    }

    /// True if this packet is shaped like an acknowledgement.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialize to wire bytes: `crc32_le || seq || payload`.
    ///
    /// The checksum covers the sequence byte and the payload, not itself.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.seq]);
        hasher.update(&self.payload);
        let checksum = hasher.finalize();

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u32_le(checksum);
        buf.put_u8(self.seq);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse wire bytes, verifying length and checksum.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` if the buffer cannot hold the envelope
    /// - `ProtocolError::ChecksumMismatch` if the recomputed CRC disagrees
    ///   with the claimed one
    /// - `ProtocolError::PayloadTooLarge` if the residual payload exceeds
    ///   [`DATA_SIZE`](crate::DATA_SIZE) - an envelope that valid peers
    ///   never produce
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated { expected: HEADER_SIZE, actual: bytes.len() });
        }

        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&bytes[..CHECKSUM_SIZE]);
        let claimed = u32::from_le_bytes(checksum);

        let computed = crc32fast::hash(&bytes[CHECKSUM_SIZE..]);
        if computed != claimed {
            return Err(ProtocolError::ChecksumMismatch { claimed, computed });
        }

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() > DATA_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: DATA_SIZE });
        }

        Ok(Self { seq: bytes[CHECKSUM_SIZE], payload: Bytes::copy_from_slice(payload) })
    }
}
