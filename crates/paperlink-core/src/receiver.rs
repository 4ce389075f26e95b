//! In-order receiver state machine.
//!
//! Accepts exactly the next expected sequence number, acknowledges the
//! highest contiguous delivery, and suppresses everything else. Two states:
//!
//! ```text
//! ┌───────┐  first in-order packet   ┌─────────┐
//! │ Start │─────────────────────────>│ Running │──┐ every further packet
//! └───────┘                          └─────────┘<─┘ (deliver / re-ACK)
//! ```
//!
//! In `Start` no ACK has ever been sent, so corrupt or out-of-order input
//! is dropped silently. In `Running` the same input re-advertises
//! `last_ack`: in Go-Back-N the sender prunes its window off the cumulative
//! ACK of the last in-order packet, and if that ACK is lost, every
//! retransmission arrives here as a duplicate - the receiver must keep
//! repeating itself until the sender catches up.
//!
//! There is no terminal state; the receiver outlives any one sender
//! session.

use bytes::Bytes;
use paperlink_proto::{Packet, from_visual};

use crate::seq;

/// Actions returned by the receiver for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverAction {
    /// Hand this encoded acknowledgement to the visual emitter.
    EmitAck {
        /// Acknowledged sequence number
        ack: u8,
        /// Encoded ACK wire bytes (CRC envelope, empty payload)
        packet: Bytes,
    },
    /// Append this payload to the output sink.
    Deliver {
        /// In-order payload bytes
        payload: Bytes,
    },
}

/// Classification of one processed QR payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// In-order packet: acknowledged and delivered.
    Delivered {
        /// Sequence number that was delivered
        seq: u8,
    },
    /// Valid packet with the wrong sequence number (duplicate or gap);
    /// re-ACKed, not delivered.
    OutOfOrder {
        /// Sequence number the packet carried
        seq: u8,
    },
    /// Failed the visual unwrap or the CRC check; re-ACKed if possible.
    Corrupt,
}

/// Receiver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No valid packet delivered yet; no ACK to re-advertise.
    Start,
    /// At least one delivery; `last_ack` is live.
    Running,
}

/// In-order Go-Back-N receiver.
///
/// Owns the expected-sequence counter exclusively.
///
/// # Invariants
///
/// - in `Running`, `next(last_ack) == expected_seq` at every step
/// - a given sequence number is delivered at most once per window pass
#[derive(Debug, Clone, Default)]
pub struct Receiver {
    /// Next sequence number that will be accepted and delivered
    expected_seq: u8,
    /// Most recently emitted ACK; `None` before the first delivery
    last_ack: Option<u8>,
}

impl Receiver {
    /// New receiver in [`ReceiverState::Start`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReceiverState {
        if self.last_ack.is_some() { ReceiverState::Running } else { ReceiverState::Start }
    }

    /// Next sequence number the receiver will accept.
    #[must_use]
    pub fn expected_seq(&self) -> u8 {
        self.expected_seq
    }

    /// Most recently acknowledged sequence number.
    #[must_use]
    pub fn last_ack(&self) -> Option<u8> {
        self.last_ack
    }

    /// Process one QR payload from the data path.
    ///
    /// Returns the classification plus the actions to execute, ACK first so
    /// the acknowledgement is on its way before delivery I/O runs.
    pub fn handle_visual(&mut self, raw: &[u8]) -> (RecvOutcome, Vec<ReceiverAction>) {
        let packet = match from_visual(raw).and_then(|bytes| Packet::decode(&bytes)) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::debug!(%error, "Corrupt packet, re-advertising last ACK");
                return (RecvOutcome::Corrupt, self.reack());
            },
        };

        if packet.seq != self.expected_seq {
            tracing::info!(
                seq = packet.seq,
                expected = self.expected_seq,
                "Out-of-order packet, re-advertising last ACK"
            );
            return (RecvOutcome::OutOfOrder { seq: packet.seq }, self.reack());
        }

        let ack = self.expected_seq;
        let actions = vec![Self::emit_ack(ack), ReceiverAction::Deliver { payload: packet.payload }];

        self.last_ack = Some(ack);
        self.expected_seq = seq::next(self.expected_seq);
        debug_assert_eq!(seq::next(ack), self.expected_seq);

        tracing::info!(seq = ack, expected = self.expected_seq, "Delivered in-order packet");
        (RecvOutcome::Delivered { seq: ack }, actions)
    }

    /// Re-advertise the last acknowledgement, if one was ever sent.
    fn reack(&self) -> Vec<ReceiverAction> {
        self.last_ack.map(Self::emit_ack).into_iter().collect()
    }

    fn emit_ack(ack: u8) -> ReceiverAction {
        ReceiverAction::EmitAck { ack, packet: Packet::ack(ack).encode() }
    }
}
