//! Protocol invariant checks.
//!
//! These capture behavioral properties that must hold at EVERY step of any
//! execution, not outcomes of specific scenarios. The transfer simulator
//! runs the standard registry after each step, so a violated invariant
//! points at the exact step that broke it.

use bytes::Bytes;
use paperlink_core::{Receiver, Sender, seq};
use paperlink_proto::WINDOW_SIZE;
use std::{fmt, ops::Sub, time::Duration};

/// Point-in-time view of both endpoints and the delivered stream.
#[derive(Debug, Clone)]
pub struct LinkSnapshot {
    /// Sender window base
    pub base: u8,
    /// Sender next sequence number
    pub next_seq: u8,
    /// Receiver expected sequence number
    pub expected_seq: u8,
    /// Receiver last emitted ACK
    pub last_ack: Option<u8>,
    /// Chunks offered to the sender, in order
    pub offered: Vec<Bytes>,
    /// Payloads the receiver delivered, in order
    pub delivered: Vec<Bytes>,
    /// Sequence numbers of those deliveries, in delivery order
    pub delivered_seqs: Vec<u8>,
}

impl LinkSnapshot {
    /// Capture the current state of a sender/receiver pair.
    pub fn capture<I>(
        sender: &Sender<I>,
        receiver: &Receiver,
        offered: &[Bytes],
        delivered: &[Bytes],
        delivered_seqs: &[u8],
    ) -> Self
    where
        I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
    {
        Self {
            base: sender.base(),
            next_seq: sender.next_seq(),
            expected_seq: receiver.expected_seq(),
            last_ack: receiver.last_ack(),
            offered: offered.to_vec(),
            delivered: delivered.to_vec(),
            delivered_seqs: delivered_seqs.to_vec(),
        }
    }
}

/// Which invariant a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// Sender window never exceeds 254 outstanding packets
    WindowBound,
    /// Receiver's `last_ack + 1 == expected_seq` once running
    AckAlignment,
    /// Delivered payloads are exactly a prefix of the offered chunks
    DeliveryPrefix,
    /// Every delivery carries a fresh in-order sequence number
    ExactlyOnce,
}

/// A broken invariant, with context for the failure message.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant broke
    pub invariant: InvariantKind,
    /// Human-readable context
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.invariant, self.message)
    }
}

/// Result alias for invariant checks.
pub type InvariantResult = Result<(), Violation>;

/// One behavioral property checked against a snapshot.
pub trait Invariant {
    /// Which invariant this check implements.
    fn kind(&self) -> InvariantKind;

    /// Verify the property against the snapshot.
    fn check(&self, snapshot: &LinkSnapshot) -> InvariantResult;
}

/// The sender never has more than `WINDOW_SIZE` packets outstanding.
pub struct WindowBound;

impl Invariant for WindowBound {
    fn kind(&self) -> InvariantKind {
        InvariantKind::WindowBound
    }

    fn check(&self, snapshot: &LinkSnapshot) -> InvariantResult {
        let outstanding = seq::window_len(snapshot.base, snapshot.next_seq);
        if outstanding > WINDOW_SIZE {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "outstanding {} exceeds window size {} (base {}, next_seq {})",
                    outstanding, WINDOW_SIZE, snapshot.base, snapshot.next_seq
                ),
            });
        }
        Ok(())
    }
}

/// Once the receiver is running, its ACK counter trails `expected_seq` by
/// exactly one.
pub struct AckAlignment;

impl Invariant for AckAlignment {
    fn kind(&self) -> InvariantKind {
        InvariantKind::AckAlignment
    }

    fn check(&self, snapshot: &LinkSnapshot) -> InvariantResult {
        if let Some(last_ack) = snapshot.last_ack
            && seq::next(last_ack) != snapshot.expected_seq
        {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "last_ack {} + 1 != expected_seq {}",
                    last_ack, snapshot.expected_seq
                ),
            });
        }
        Ok(())
    }
}

/// Delivered payloads are exactly the offered chunks, in order, with no
/// duplicates and no holes - the prefix that has made it across so far.
pub struct DeliveryPrefix;

impl Invariant for DeliveryPrefix {
    fn kind(&self) -> InvariantKind {
        InvariantKind::DeliveryPrefix
    }

    fn check(&self, snapshot: &LinkSnapshot) -> InvariantResult {
        if snapshot.delivered.len() > snapshot.offered.len() {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "{} payloads delivered but only {} offered",
                    snapshot.delivered.len(),
                    snapshot.offered.len()
                ),
            });
        }

        for (position, (delivered, offered)) in
            snapshot.delivered.iter().zip(&snapshot.offered).enumerate()
        {
            if delivered != offered {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "delivery diverges from offered stream at chunk {position}"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Deliveries happen exactly once, in sequence order.
///
/// Consecutive delivered sequence numbers must be modular successors. A
/// repeat means the same packet was written to the sink twice; a skip
/// means a hole. Both would slip past [`DeliveryPrefix`] whenever adjacent
/// chunks happen to carry identical bytes, so the sequence numbers are
/// checked in their own right.
pub struct ExactlyOnce;

impl Invariant for ExactlyOnce {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ExactlyOnce
    }

    fn check(&self, snapshot: &LinkSnapshot) -> InvariantResult {
        for (position, pair) in snapshot.delivered_seqs.windows(2).enumerate() {
            if seq::next(pair[0]) != pair[1] {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "delivery {} carried seq {} after seq {}, expected {}",
                        position + 1,
                        pair[1],
                        pair[0],
                        seq::next(pair[0])
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Named collection of invariants checked together.
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// The standard protocol invariants.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            checks: vec![
                Box::new(WindowBound),
                Box::new(AckAlignment),
                Box::new(DeliveryPrefix),
                Box::new(ExactlyOnce),
            ],
        }
    }

    /// Check every registered invariant, failing on the first violation.
    pub fn check_all(&self, snapshot: &LinkSnapshot) -> InvariantResult {
        for check in &self.checks {
            check.check(snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> LinkSnapshot {
        LinkSnapshot {
            base: 0,
            next_seq: 0,
            expected_seq: 0,
            last_ack: None,
            offered: vec![],
            delivered: vec![],
            delivered_seqs: vec![],
        }
    }

    #[test]
    fn fresh_link_satisfies_everything() {
        assert!(InvariantRegistry::standard().check_all(&snapshot()).is_ok());
    }

    #[test]
    fn overfull_window_is_flagged() {
        let state = LinkSnapshot { base: 0, next_seq: 255, ..snapshot() };
        let violation = WindowBound.check(&state).unwrap_err();
        assert_eq!(violation.invariant, InvariantKind::WindowBound);
    }

    #[test]
    fn misaligned_ack_counter_is_flagged() {
        let state = LinkSnapshot { expected_seq: 5, last_ack: Some(3), ..snapshot() };
        assert!(AckAlignment.check(&state).is_err());

        let aligned = LinkSnapshot { expected_seq: 4, last_ack: Some(3), ..snapshot() };
        assert!(AckAlignment.check(&aligned).is_ok());
    }

    #[test]
    fn reordered_delivery_is_flagged() {
        let state = LinkSnapshot {
            offered: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
            delivered: vec![Bytes::from_static(b"b")],
            ..snapshot()
        };
        assert!(DeliveryPrefix.check(&state).is_err());
    }

    #[test]
    fn repeated_delivery_is_flagged() {
        let state = LinkSnapshot { delivered_seqs: vec![0, 1, 1], ..snapshot() };
        let violation = ExactlyOnce.check(&state).unwrap_err();
        assert_eq!(violation.invariant, InvariantKind::ExactlyOnce);
    }

    #[test]
    fn skipped_delivery_is_flagged() {
        let state = LinkSnapshot { delivered_seqs: vec![0, 2], ..snapshot() };
        assert!(ExactlyOnce.check(&state).is_err());
    }

    #[test]
    fn wrapped_delivery_order_is_fine() {
        let state = LinkSnapshot { delivered_seqs: vec![254, 255, 0, 1], ..snapshot() };
        assert!(ExactlyOnce.check(&state).is_ok());
    }

    #[test]
    fn partial_in_order_delivery_is_fine() {
        let state = LinkSnapshot {
            offered: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
            delivered: vec![Bytes::from_static(b"a")],
            ..snapshot()
        };
        assert!(DeliveryPrefix.check(&state).is_ok());
    }
}
