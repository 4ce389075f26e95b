//! The blocking drivers, end to end over an in-memory wire.
//!
//! Two real threads, real time, mpsc channels standing in for the printed
//! page and the camera: the sender driver must terminate cleanly once
//! everything is acknowledged, and the receiver driver must deliver the
//! exact byte stream and stop on cancellation.

use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;
use paperlink_core::{
    ArtifactId, ArtifactTag, CameraFrame, CancelFlag, ChunkSource, DeliverySink, Environment,
    FrameSource, LinkError, Receiver, ReceiverDriverConfig, Sender, SenderConfig,
    SenderDriverConfig, TransferOutcome, VisualEmitter, run_receiver, run_sender,
};
use paperlink_proto::to_visual;

#[derive(Clone)]
struct RealTimeEnv;

impl Environment for RealTimeEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Emitter end of the wire: wraps packets exactly like a QR emitter.
struct WireEmitter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl VisualEmitter for WireEmitter {
    fn emit(&mut self, packet: &[u8], tag: ArtifactTag) -> Result<ArtifactId, LinkError> {
        self.tx
            .send(to_visual(packet).into_bytes())
            .map_err(|e| LinkError::Emit(e.to_string()))?;
        Ok(ArtifactId(tag.to_string()))
    }
}

/// Camera end of the wire: one payload per frame, empty frames while the
/// wire is quiet, cancellation via the shared flag.
struct WireSource {
    rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancelFlag,
}

impl FrameSource for WireSource {
    fn next_frame(&mut self) -> Result<CameraFrame, LinkError> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }
        match self.rx.recv_timeout(Duration::from_millis(10)) {
            Ok(payload) => Ok(CameraFrame { payloads: vec![Bytes::from(payload)] }),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(CameraFrame::empty()),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(LinkError::Cancelled),
        }
    }
}

/// Chunk source handing out a fixed set once.
struct FixedChunks {
    chunks: Vec<Bytes>,
}

impl ChunkSource for FixedChunks {
    fn poll_chunks(&mut self) -> Result<Vec<Bytes>, LinkError> {
        Ok(std::mem::take(&mut self.chunks))
    }
}

struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl DeliverySink for SharedSink {
    fn deliver(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.0.lock().map_err(|e| LinkError::Emit(e.to_string()))?.extend_from_slice(payload);
        Ok(())
    }
}

#[test]
fn drivers_complete_a_transfer_over_an_in_memory_wire() {
    let message = b"the quick brown fox jumps over the lazy dog".to_vec();

    let (to_receiver_tx, to_receiver_rx) = mpsc::channel();
    let (to_sender_tx, to_sender_rx) = mpsc::channel();
    let cancel = CancelFlag::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    let receiver_handle = {
        let cancel = cancel.clone();
        let received = Arc::clone(&received);
        thread::spawn(move || {
            let mut receiver = Receiver::new();
            let mut frames = WireSource { rx: to_receiver_rx, cancel };
            let mut emitter = WireEmitter { tx: to_sender_tx };
            let mut sink = SharedSink(received);
            run_receiver(
                &RealTimeEnv,
                &mut receiver,
                &mut frames,
                &mut emitter,
                &mut sink,
                &ReceiverDriverConfig {
                    poll_delay: Duration::from_millis(1),
                    max_frame_failures: 30,
                },
            )
        })
    };

    let mut sender = Sender::new(SenderConfig { timeout: Duration::from_secs(5) });
    let mut chunks = FixedChunks {
        chunks: message.chunks(8).map(Bytes::copy_from_slice).collect(),
    };
    let mut frames = WireSource { rx: to_sender_rx, cancel: CancelFlag::new() };
    let mut emitter = WireEmitter { tx: to_receiver_tx };

    let report = run_sender(
        &RealTimeEnv,
        &mut sender,
        &mut chunks,
        &mut frames,
        &mut emitter,
        &SenderDriverConfig { recv_delay: Duration::from_millis(5), max_frame_failures: 30 },
    )
    .expect("sender driver");

    assert_eq!(report.outcome, Some(TransferOutcome::Completed));
    assert_eq!(report.packets_sent, message.chunks(8).count() as u64);
    assert_eq!(report.retransmissions, 0, "clean wire needs no retransmissions");

    // Stop the receiver and collect its view of the stream.
    cancel.cancel();
    let receiver_report = receiver_handle
        .join()
        .expect("receiver thread")
        .expect("receiver driver");

    assert_eq!(receiver_report.outcome, Some(TransferOutcome::Interrupted));
    assert_eq!(*received.lock().expect("sink"), message);
}

#[test]
fn sender_reports_interruption_when_cancelled_waiting_for_acks() {
    // Acks never come; the user gives up mid-window.
    let (to_receiver_tx, _keep_wire_open) = mpsc::channel::<Vec<u8>>();
    let (_no_acks_tx, to_sender_rx) = mpsc::channel::<Vec<u8>>();
    drop(_no_acks_tx);

    let cancel = CancelFlag::new();
    cancel.cancel();

    let mut sender = Sender::new(SenderConfig { timeout: Duration::from_secs(60) });
    let mut chunks = FixedChunks { chunks: vec![Bytes::from_static(b"stranded")] };
    let mut frames = WireSource { rx: to_sender_rx, cancel };
    let mut emitter = WireEmitter { tx: to_receiver_tx };

    let report = run_sender(
        &RealTimeEnv,
        &mut sender,
        &mut chunks,
        &mut frames,
        &mut emitter,
        &SenderDriverConfig { recv_delay: Duration::from_millis(1), max_frame_failures: 30 },
    )
    .expect("cancellation is a clean outcome, not an error");

    assert_eq!(report.outcome, Some(TransferOutcome::Interrupted));
    assert_eq!(report.packets_sent, 1, "the packet went out before the cancel was observed");
}

#[test]
fn repeated_camera_failures_escalate_to_fatal() {
    struct DeadCamera;

    impl FrameSource for DeadCamera {
        fn next_frame(&mut self) -> Result<CameraFrame, LinkError> {
            Err(LinkError::FrameSource("no signal".to_string()))
        }
    }

    let (to_receiver_tx, _keep_wire_open) = mpsc::channel::<Vec<u8>>();

    let mut sender = Sender::new(SenderConfig { timeout: Duration::from_secs(60) });
    let mut chunks = FixedChunks { chunks: vec![Bytes::from_static(b"doomed")] };
    let mut emitter = WireEmitter { tx: to_receiver_tx };

    let error = run_sender(
        &RealTimeEnv,
        &mut sender,
        &mut chunks,
        &mut DeadCamera,
        &mut emitter,
        &SenderDriverConfig { recv_delay: Duration::from_millis(1), max_frame_failures: 5 },
    )
    .expect_err("a dead camera must be fatal");

    assert!(matches!(
        error,
        paperlink_core::DriverError::FrameSourceFailed { failures: 5, .. }
    ));
}
