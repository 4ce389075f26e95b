//! Blocking drivers wiring the state machines to a physical channel.
//!
//! The machines are pure; these loops do the I/O. Each endpoint is one
//! cooperative thread that alternates between emitting and receiving,
//! suspending only inside `next_frame()` and timed sleeps. Timeouts are
//! detected by polling the environment clock between frames - a camera
//! yields frames continuously, so the poll granularity is one frame.

use std::time::Duration;

use crate::{
    env::Environment,
    error::{DriverError, LinkError},
    link::{ArtifactTag, ChunkSource, DeliverySink, FrameSource, VisualEmitter},
    receiver::{Receiver, ReceiverAction, RecvOutcome},
    sender::{AckOutcome, Sender, SenderAction},
};

/// How a driver loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Sender: input drained and window empty. Clean halt.
    Completed,
    /// User cancelled mid-session; channel state is indeterminate.
    Interrupted,
}

/// Sender driver tuning.
#[derive(Debug, Clone)]
pub struct SenderDriverConfig {
    /// Pause between filling the window and scanning for acknowledgements,
    /// giving the physical side a moment to surface fresh artifacts.
    pub recv_delay: Duration,
    /// Consecutive transient frame-source failures tolerated before the
    /// camera is declared dead.
    pub max_frame_failures: u32,
}

impl Default for SenderDriverConfig {
    fn default() -> Self {
        Self { recv_delay: Duration::from_millis(300), max_frame_failures: 30 }
    }
}

/// Receiver driver tuning.
#[derive(Debug, Clone)]
pub struct ReceiverDriverConfig {
    /// Pause between camera polls; roughly one frame interval.
    pub poll_delay: Duration,
    /// Consecutive transient frame-source failures tolerated before the
    /// camera is declared dead.
    pub max_frame_failures: u32,
}

impl Default for ReceiverDriverConfig {
    fn default() -> Self {
        Self { poll_delay: Duration::from_millis(30), max_frame_failures: 30 }
    }
}

/// Counters and outcome of one sender session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderReport {
    /// First transmissions emitted
    pub packets_sent: u64,
    /// Timeout retransmissions emitted
    pub retransmissions: u64,
    /// Cumulative ACKs that advanced the window
    pub acks_accepted: u64,
    /// Frame payloads that failed decode on the ACK path
    pub corrupt_frames: u64,
    /// How the session ended; `None` only while the loop is running
    pub outcome: Option<TransferOutcome>,
}

/// Counters and outcome of one receiver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    /// In-order packets delivered to the sink
    pub delivered: u64,
    /// Payload bytes handed to the sink
    pub bytes_delivered: u64,
    /// Valid packets suppressed as duplicate or out-of-order
    pub duplicates: u64,
    /// Frame payloads that failed decode
    pub corrupt_frames: u64,
    /// How the run ended; receivers only stop on cancellation
    pub outcome: Option<TransferOutcome>,
}

/// Drive one sender session to completion.
///
/// Main loop per the protocol design: poll the chunk source (a fresh
/// dequeue before every send cycle), fill the window and emit, then
/// consume frames until a cumulative ACK advances the window or the timer
/// expires and the outstanding window is retransmitted. Halts cleanly once
/// the input is drained and the window is empty.
///
/// # Errors
///
/// Non-transient link failures, or a frame source that failed
/// `max_frame_failures` times in a row.
pub fn run_sender<E, C, F, V>(
    env: &E,
    sender: &mut Sender<E::Instant>,
    chunks: &mut C,
    frames: &mut F,
    emitter: &mut V,
    config: &SenderDriverConfig,
) -> Result<SenderReport, DriverError>
where
    E: Environment,
    C: ChunkSource,
    F: FrameSource,
    V: VisualEmitter,
{
    let mut report = SenderReport::default();
    let mut failures: u32 = 0;

    loop {
        for chunk in chunks.poll_chunks()? {
            sender.enqueue(chunk)?;
        }

        for action in sender.fill_window(env.now()) {
            transmit(emitter, &mut report, action)?;
        }

        if sender.is_idle() {
            // One more poll so input that landed during the last exchange
            // still gets this session.
            let late = chunks.poll_chunks()?;
            if late.is_empty() {
                report.outcome = Some(TransferOutcome::Completed);
                tracing::info!(
                    packets = report.packets_sent,
                    retransmissions = report.retransmissions,
                    "Transfer complete"
                );
                return Ok(report);
            }
            for chunk in late {
                sender.enqueue(chunk)?;
            }
            continue;
        }

        env.sleep(config.recv_delay);

        // Await ACK: leave this loop when the window moves or the timer
        // fires.
        'await_ack: loop {
            let now = env.now();
            if sender.timer_expired(now) {
                for action in sender.check_timeout(now) {
                    transmit(emitter, &mut report, action)?;
                }
                break 'await_ack;
            }

            let frame = match frames.next_frame() {
                Ok(frame) => {
                    failures = 0;
                    frame
                },
                Err(LinkError::Cancelled) => {
                    report.outcome = Some(TransferOutcome::Interrupted);
                    tracing::warn!(outstanding = sender.outstanding(), "Transfer cancelled");
                    return Ok(report);
                },
                Err(error) if error.is_transient() => {
                    failures += 1;
                    tracing::warn!(%error, failures, "Frame source failure");
                    if failures >= config.max_frame_failures {
                        return Err(DriverError::FrameSourceFailed {
                            failures,
                            last: error.to_string(),
                        });
                    }
                    continue 'await_ack;
                },
                Err(error) => return Err(error.into()),
            };

            for payload in &frame.payloads {
                match sender.handle_visual(payload, env.now()) {
                    AckOutcome::Advanced { .. } => {
                        report.acks_accepted += 1;
                        break 'await_ack;
                    },
                    AckOutcome::Corrupt => report.corrupt_frames += 1,
                    AckOutcome::OutOfWindow { .. } | AckOutcome::NotAck { .. } => {},
                }
            }
        }
    }
}

/// Run the receiver until cancelled.
///
/// Endless pull-decode-act loop: every detected QR payload goes through the
/// state machine, ACKs go back out through the emitter, in-order payloads
/// go to the sink. The receiver has no terminal state; `Ok` is returned
/// only on user cancellation.
///
/// # Errors
///
/// Non-transient link failures, or a frame source that failed
/// `max_frame_failures` times in a row.
pub fn run_receiver<E, F, V, D>(
    env: &E,
    receiver: &mut Receiver,
    frames: &mut F,
    emitter: &mut V,
    sink: &mut D,
    config: &ReceiverDriverConfig,
) -> Result<ReceiverReport, DriverError>
where
    E: Environment,
    F: FrameSource,
    V: VisualEmitter,
    D: DeliverySink,
{
    let mut report = ReceiverReport::default();
    let mut failures: u32 = 0;

    loop {
        let frame = match frames.next_frame() {
            Ok(frame) => {
                failures = 0;
                frame
            },
            Err(LinkError::Cancelled) => {
                report.outcome = Some(TransferOutcome::Interrupted);
                tracing::info!(
                    delivered = report.delivered,
                    bytes = report.bytes_delivered,
                    "Receiver stopped"
                );
                return Ok(report);
            },
            Err(error) if error.is_transient() => {
                failures += 1;
                tracing::warn!(%error, failures, "Frame source failure");
                if failures >= config.max_frame_failures {
                    return Err(DriverError::FrameSourceFailed {
                        failures,
                        last: error.to_string(),
                    });
                }
                continue;
            },
            Err(error) => return Err(error.into()),
        };

        for payload in &frame.payloads {
            let (outcome, actions) = receiver.handle_visual(payload);
            match outcome {
                RecvOutcome::Delivered { .. } => {},
                RecvOutcome::OutOfOrder { .. } => report.duplicates += 1,
                RecvOutcome::Corrupt => report.corrupt_frames += 1,
            }

            for action in actions {
                match action {
                    ReceiverAction::EmitAck { ack, packet } => {
                        emitter.emit(&packet, ArtifactTag::Ack(ack))?;
                    },
                    ReceiverAction::Deliver { payload } => {
                        sink.deliver(&payload)?;
                        report.delivered += 1;
                        report.bytes_delivered += payload.len() as u64;
                    },
                }
            }
        }

        env.sleep(config.poll_delay);
    }
}

fn transmit<V: VisualEmitter>(
    emitter: &mut V,
    report: &mut SenderReport,
    action: SenderAction,
) -> Result<(), DriverError> {
    let SenderAction::Transmit { seq, packet, retransmit } = action;
    emitter.emit(&packet, ArtifactTag::Data(seq))?;

    if retransmit {
        report.retransmissions += 1;
    } else {
        report.packets_sent += 1;
    }
    Ok(())
}
