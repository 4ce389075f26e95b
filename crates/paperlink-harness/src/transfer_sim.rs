//! Lockstep simulation of one sender/receiver pair.
//!
//! Drives both state machines directly - no threads, no real I/O - across
//! two [`LossyDirection`]s, one per half of the visual channel. Each step
//! is one exchange cycle: fill the window, let the camera side see what
//! survived the channel, route acknowledgements back, then advance virtual
//! time and let the timer fire if it must. Invariants are checked after
//! every step.

use bytes::Bytes;
use paperlink_core::{
    ArtifactTag, Environment, FrameSource, LinkError, Receiver, ReceiverAction, RecvOutcome,
    Sender, SenderAction, SenderConfig, VisualEmitter,
};
use std::time::Duration;

use crate::{
    invariants::{InvariantRegistry, LinkSnapshot, Violation},
    sim_env::{SimEnv, SimInstant},
    sim_link::{FaultPlan, LossyDirection},
};

/// Virtual time consumed by one exchange cycle.
const STEP_INTERVAL: Duration = Duration::from_secs(1);

/// Why a simulated transfer failed.
#[derive(Debug)]
pub enum SimFailure {
    /// A protocol invariant broke mid-transfer.
    Invariant(Violation),
    /// The simulated channel itself failed; it never should.
    Link(LinkError),
    /// The transfer made no further progress within the step budget.
    Stalled {
        /// Steps executed before giving up
        steps: u32,
        /// Chunks delivered so far
        delivered: usize,
        /// Chunks offered in total
        offered: usize,
    },
}

impl std::fmt::Display for SimFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invariant(violation) => write!(f, "invariant violated: {violation}"),
            Self::Link(error) => write!(f, "simulated link failed: {error}"),
            Self::Stalled { steps, delivered, offered } => write!(
                f,
                "transfer stalled after {steps} steps: {delivered} of {offered} chunks delivered"
            ),
        }
    }
}

impl From<Violation> for SimFailure {
    fn from(violation: Violation) -> Self {
        Self::Invariant(violation)
    }
}

impl From<LinkError> for SimFailure {
    fn from(error: LinkError) -> Self {
        Self::Link(error)
    }
}

/// A sender and receiver joined by a simulated lossy visual channel.
pub struct TransferSim {
    env: SimEnv,
    /// Sender under test
    pub sender: Sender<SimInstant>,
    /// Receiver under test
    pub receiver: Receiver,
    data: LossyDirection,
    acks: LossyDirection,
    offered: Vec<Bytes>,
    /// Payloads delivered in order by the receiver
    pub delivered: Vec<Bytes>,
    delivered_seqs: Vec<u8>,
    /// Timeout retransmissions observed
    pub retransmissions: u64,
    invariants: InvariantRegistry,
}

impl TransferSim {
    /// New simulation with independent fault plans for the data and ACK
    /// directions. The seed feeds both directions' chaos RNGs (offset so
    /// they diverge).
    #[must_use]
    pub fn new(
        config: SenderConfig,
        data_plan: FaultPlan,
        ack_plan: FaultPlan,
        seed: u64,
    ) -> Self {
        Self {
            env: SimEnv::new(),
            sender: Sender::new(config),
            receiver: Receiver::new(),
            data: LossyDirection::new("data", data_plan, seed),
            acks: LossyDirection::new("ack", ack_plan, seed.wrapping_add(1)),
            offered: Vec::new(),
            delivered: Vec::new(),
            delivered_seqs: Vec::new(),
            retransmissions: 0,
            invariants: InvariantRegistry::standard(),
        }
    }

    /// Simulation with a short retransmission timeout suited to
    /// one-second steps.
    #[must_use]
    pub fn with_plans(data_plan: FaultPlan, ack_plan: FaultPlan, seed: u64) -> Self {
        Self::new(SenderConfig { timeout: Duration::from_secs(3) }, data_plan, ack_plan, seed)
    }

    /// Queue one chunk on the sender and record it for the delivery
    /// invariant.
    ///
    /// # Panics
    ///
    /// Panics if the chunk exceeds the wire limit; tests construct their
    /// own chunks.
    pub fn offer_chunk(&mut self, chunk: &[u8]) {
        let chunk = Bytes::copy_from_slice(chunk);
        self.offered.push(chunk.clone());
        #[allow(clippy::expect_used)]
        self.sender.enqueue(chunk).expect("test chunk within DATA_SIZE");
    }

    /// Split a byte message into maximal chunks and queue them all.
    pub fn offer_message(&mut self, data: &[u8]) {
        for chunk in data.chunks(paperlink_proto::DATA_SIZE) {
            self.offer_chunk(chunk);
        }
    }

    /// Shared virtual clock.
    #[must_use]
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Packets the data direction has seen.
    #[must_use]
    pub fn data_emissions(&self) -> u64 {
        self.data.emitted()
    }

    /// Acknowledgements the ACK direction has seen.
    #[must_use]
    pub fn ack_emissions(&self) -> u64 {
        self.acks.emitted()
    }

    /// True once the sender has nothing outstanding and nothing queued.
    #[must_use]
    pub fn sender_idle(&self) -> bool {
        self.sender.is_idle()
    }

    /// Run one exchange cycle through the same `VisualEmitter` /
    /// `FrameSource` surface the blocking drivers use.
    ///
    /// # Errors
    ///
    /// The first invariant violation, if this step broke one.
    pub fn step(&mut self) -> Result<(), SimFailure> {
        let now = self.env.now();

        for action in self.sender.fill_window(now) {
            let SenderAction::Transmit { seq, packet, .. } = action;
            self.data.emit(&packet, ArtifactTag::Data(seq))?;
        }

        // Receiver consumes one frame carrying everything currently in
        // flight, exactly as a camera sweeping over freshly printed codes.
        let frame = self.data.next_frame()?;
        for raw in &frame.payloads {
            let (outcome, actions) = self.receiver.handle_visual(raw);
            if let RecvOutcome::Delivered { seq } = outcome {
                self.delivered_seqs.push(seq);
            }
            for action in actions {
                match action {
                    ReceiverAction::EmitAck { ack, packet } => {
                        self.acks.emit(&packet, ArtifactTag::Ack(ack))?;
                    },
                    ReceiverAction::Deliver { payload } => self.delivered.push(payload),
                }
            }
        }

        // Sender consumes the acknowledgements that made it back.
        let frame = self.acks.next_frame()?;
        for raw in &frame.payloads {
            self.sender.handle_visual(raw, self.env.now());
        }

        self.env.advance(STEP_INTERVAL);

        let retrans = self.sender.check_timeout(self.env.now());
        for action in retrans {
            let SenderAction::Transmit { seq, packet, retransmit } = action;
            debug_assert!(retransmit);
            self.retransmissions += 1;
            self.data.emit(&packet, ArtifactTag::Data(seq))?;
        }

        self.check_invariants()?;
        Ok(())
    }

    /// Step until the sender goes idle or `max_steps` elapse.
    ///
    /// # Errors
    ///
    /// An invariant violation, or [`SimFailure::Stalled`] if the transfer
    /// did not complete within the step budget.
    pub fn run_to_completion(&mut self, max_steps: u32) -> Result<(), SimFailure> {
        for _ in 0..max_steps {
            self.step()?;
            if self.sender.is_idle() {
                return Ok(());
            }
        }
        Err(SimFailure::Stalled {
            steps: max_steps,
            delivered: self.delivered.len(),
            offered: self.offered.len(),
        })
    }

    /// Delivered payloads flattened back into one byte stream.
    #[must_use]
    pub fn delivered_bytes(&self) -> Vec<u8> {
        self.delivered.iter().flat_map(|chunk| chunk.iter().copied()).collect()
    }

    fn check_invariants(&self) -> Result<(), Violation> {
        let snapshot = LinkSnapshot::capture(
            &self.sender,
            &self.receiver,
            &self.offered,
            &self.delivered,
            &self.delivered_seqs,
        );
        self.invariants.check_all(&snapshot)
    }
}
