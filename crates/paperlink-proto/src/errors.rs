//! Error types for the paperlink wire protocol.
//!
//! Decode errors are deliberately coarse: the ARQ layer treats every failed
//! decode as "corrupt" and recovers through retransmission, so callers
//! mostly care whether a packet parsed, not why. The variants still carry
//! enough detail for logs and tests.

use thiserror::Error;

/// Convenience alias used throughout the protocol crates.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced by the packet and visual codecs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Caller tried to build a packet larger than the wire allows.
    ///
    /// This is a programming error in the caller, not channel damage; it is
    /// surfaced loudly instead of being truncated silently.
    #[error("payload of {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Offending payload length
        size: usize,
        /// Largest permitted payload length
        max: usize,
    },

    /// Buffer is too short to contain the fixed envelope.
    #[error("packet truncated: need at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum bytes required
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Recomputed CRC-32 does not match the claimed checksum.
    #[error("checksum mismatch: claimed {claimed:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum carried in the packet
        claimed: u32,
        /// Checksum recomputed over the packet body
        computed: u32,
    },

    /// QR payload is not valid base64.
    #[error("malformed visual payload: {0}")]
    MalformedVisual(String),
}

impl ProtocolError {
    /// True for damage the ARQ layer recovers from by waiting for a
    /// retransmission; false for caller bugs.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::ChecksumMismatch { .. } | Self::MalformedVisual(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_damage_is_corruption() {
        assert!(ProtocolError::Truncated { expected: 5, actual: 2 }.is_corruption());
        assert!(ProtocolError::ChecksumMismatch { claimed: 1, computed: 2 }.is_corruption());
        assert!(ProtocolError::MalformedVisual("bad symbol".to_string()).is_corruption());
    }

    #[test]
    fn oversize_payload_is_a_caller_bug() {
        assert!(!ProtocolError::PayloadTooLarge { size: 2000, max: 1019 }.is_corruption());
    }
}
