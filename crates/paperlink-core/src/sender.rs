//! Go-Back-N sender state machine.
//!
//! Pure state machine in the action pattern: methods take the current time
//! as input and return [`SenderAction`]s for the driver to execute. No I/O
//! happens here, so every transition is deterministic and testable under
//! virtual time.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐      transmit       ┌──────────────┐  timeout: retransmit
//! │ Filling │────────────────────>│ Awaiting ACK │─────┐ [base, next_seq)
//! └─────────┘<────────────────────└──────────────┘<────┘
//!      │       cumulative ACK
//!      │ input drained AND window empty
//!      ↓
//! ┌─────────┐
//! │  Done   │
//! └─────────┘
//! ```
//!
//! The timer is data, not a callback: a single start instant polled from
//! the driver loop. Expiry means the oldest unacknowledged packet is
//! considered lost and the whole outstanding window goes out again - the
//! Go-Back-N semantic.

use std::{collections::VecDeque, ops::Sub, time::Duration};

use bytes::Bytes;
use paperlink_proto::{DATA_SIZE, Packet, ProtocolError, SEQ_SPACE, WINDOW_SIZE, from_visual};

use crate::seq;

/// Retransmission deadline for the oldest unacknowledged packet.
///
/// The visual channel moves at paper speed - a packet may sit in a printer
/// tray for most of an hour before anyone shows it to the far camera.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6000);

/// Sender tuning.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// How long to wait for a cumulative ACK before retransmitting the
    /// outstanding window.
    pub timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT }
    }
}

/// Actions returned by the sender for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderAction {
    /// Hand this encoded packet to the visual emitter.
    Transmit {
        /// Sequence number of the packet
        seq: u8,
        /// Encoded wire bytes (CRC envelope included)
        packet: Bytes,
        /// True when this emission is a timeout retransmission
        retransmit: bool,
    },
}

/// What a frame payload on the acknowledgement path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Cumulative ACK accepted; window advanced to `base`.
    Advanced {
        /// Acknowledged sequence number
        ack: u8,
        /// New window base (`ack + 1` mod 256)
        base: u8,
    },
    /// Valid ACK referring to a sequence outside `[base, next_seq)`;
    /// discarded silently per protocol.
    OutOfWindow {
        /// The ignored acknowledgement value
        ack: u8,
    },
    /// Valid CRC but a non-empty payload - not an acknowledgement.
    NotAck {
        /// Sequence number the stray packet carried
        seq: u8,
    },
    /// Failed the visual unwrap or the CRC check; state unchanged.
    Corrupt,
}

/// Go-Back-N sender over the one-byte sequence space.
///
/// Owns the retransmission buffer, the window indices, the input queue and
/// the timer exclusively; lives for one session (one byte-stream transfer).
///
/// Generic over the instant type so timeouts run under both real and
/// virtual time.
///
/// # Invariants
///
/// - `distance(base, next_seq) <= WINDOW_SIZE` (254) at every step
/// - every sequence in `[base, next_seq)` has its encoded packet buffered
/// - `timer` is `Some` exactly while packets are outstanding
#[derive(Debug, Clone)]
pub struct Sender<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Lowest unacknowledged sequence number
    base: u8,
    /// Next sequence number to assign
    next_seq: u8,
    /// Encoded packets by sequence number; fixed 256 slots reused on wrap
    buffer: Box<[Option<Bytes>; SEQ_SPACE]>,
    /// Chunks waiting for a window slot, each at most DATA_SIZE bytes
    input: VecDeque<Bytes>,
    /// Instant the current timer was started; `None` when nothing is
    /// outstanding
    timer: Option<I>,
    config: SenderConfig,
}

impl<I> Sender<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// New sender with an empty window.
    #[must_use]
    pub fn new(config: SenderConfig) -> Self {
        Self {
            base: 0,
            next_seq: 0,
            buffer: Box::new([const { None }; SEQ_SPACE]),
            input: VecDeque::new(),
            timer: None,
            config,
        }
    }

    /// Queue one outgoing chunk.
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the chunk exceeds
    /// [`DATA_SIZE`](paperlink_proto::DATA_SIZE); chunking is the caller's
    /// job and silent truncation would corrupt the stream.
    pub fn enqueue(&mut self, chunk: Bytes) -> Result<(), ProtocolError> {
        if chunk.len() > DATA_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: chunk.len(), max: DATA_SIZE });
        }
        self.input.push_back(chunk);
        Ok(())
    }

    /// Split an arbitrary byte message into maximal chunks and queue them.
    pub fn enqueue_message(&mut self, data: &[u8]) {
        for chunk in data.chunks(DATA_SIZE) {
            self.input.push_back(Bytes::copy_from_slice(chunk));
        }
    }

    /// Lowest unacknowledged sequence number.
    #[must_use]
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Next sequence number to assign.
    #[must_use]
    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    /// Number of transmitted-but-unacknowledged packets.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        seq::window_len(self.base, self.next_seq)
    }

    /// Number of chunks queued but not yet assigned a sequence number.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.input.len()
    }

    /// True when nothing is outstanding and no input is queued - the
    /// cooperative termination condition.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.base == self.next_seq && self.input.is_empty()
    }

    /// Move queued chunks into the window while it has room.
    ///
    /// Starts the timer when the window goes from empty to non-empty.
    /// Returns one `Transmit` action per packet sent, in sequence order.
    pub fn fill_window(&mut self, now: I) -> Vec<SenderAction> {
        let mut actions = Vec::new();

        while self.outstanding() < WINDOW_SIZE {
            let Some(chunk) = self.input.pop_front() else {
                break;
            };

            let seq = self.next_seq;
            // Chunk size was validated at enqueue, so the packet is
            // well-formed by construction.
            let packet = Packet { seq, payload: chunk }.encode();
            self.buffer[seq as usize] = Some(packet.clone());

            if self.base == self.next_seq {
                self.timer = Some(now);
            }
            self.next_seq = seq::next(self.next_seq);

            debug_assert!(self.outstanding() <= WINDOW_SIZE);

            tracing::debug!(seq, outstanding = self.outstanding(), "Sent data packet");
            actions.push(SenderAction::Transmit { seq, packet, retransmit: false });
        }

        actions
    }

    /// Process one QR payload from the acknowledgement path.
    ///
    /// Applies the visual unwrap and the CRC check, then the cumulative-ACK
    /// rule: a valid in-window ACK for `k` acknowledges everything from
    /// `base` through `k` and moves `base` to `k + 1`. The timer stops when
    /// the window empties and restarts otherwise. Corrupt and
    /// out-of-window inputs leave the state untouched.
    pub fn handle_visual(&mut self, raw: &[u8], now: I) -> AckOutcome {
        let packet = match from_visual(raw).and_then(|bytes| Packet::decode(&bytes)) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::debug!(%error, "Discarding corrupt acknowledgement");
                return AckOutcome::Corrupt;
            },
        };

        if !packet.is_ack() {
            tracing::warn!(seq = packet.seq, "Ignoring data-shaped packet on the ACK path");
            return AckOutcome::NotAck { seq: packet.seq };
        }

        let ack = packet.seq;
        if !seq::in_window(self.base, self.next_seq, ack) {
            tracing::debug!(
                ack,
                base = self.base,
                next_seq = self.next_seq,
                "Ignoring out-of-window ACK"
            );
            return AckOutcome::OutOfWindow { ack };
        }

        for acknowledged in seq::window(self.base, seq::next(ack)) {
            self.buffer[acknowledged as usize] = None;
        }
        self.base = seq::next(ack);

        if self.base == self.next_seq {
            self.timer = None;
        } else {
            self.timer = Some(now);
        }

        tracing::info!(
            ack,
            base = self.base,
            outstanding = self.outstanding(),
            "ACK received, window advanced"
        );
        AckOutcome::Advanced { ack, base: self.base }
    }

    /// True once the retransmission deadline for the oldest outstanding
    /// packet has passed.
    #[must_use]
    pub fn timer_expired(&self, now: I) -> bool {
        self.timer.is_some_and(|started| now - started >= self.config.timeout)
    }

    /// Time left before the current timer expires; `None` when nothing is
    /// outstanding.
    #[must_use]
    pub fn time_until_timeout(&self, now: I) -> Option<Duration> {
        self.timer.map(|started| self.config.timeout.saturating_sub(now - started))
    }

    /// Handle a possible timeout.
    ///
    /// If the timer has expired, restart it and return retransmissions for
    /// EVERY packet in `[base, next_seq)` in original order - the
    /// Go-Back-N semantic. Otherwise returns nothing.
    pub fn check_timeout(&mut self, now: I) -> Vec<SenderAction> {
        if !self.timer_expired(now) {
            return Vec::new();
        }

        self.timer = Some(now);

        let mut actions = Vec::with_capacity(self.outstanding());
        for seq in seq::window(self.base, self.next_seq) {
            // Every in-window slot was filled at transmission and is only
            // cleared by the ACK that shrinks the window past it.
            if let Some(packet) = &self.buffer[seq as usize] {
                actions.push(SenderAction::Transmit {
                    seq,
                    packet: packet.clone(),
                    retransmit: true,
                });
            } else {
                debug_assert!(false, "in-window sequence {seq} has no buffered packet");
            }
        }

        tracing::warn!(
            base = self.base,
            next_seq = self.next_seq,
            count = actions.len(),
            "ACK timeout, retransmitting outstanding window"
        );
        actions
    }
}
