//! The blocking drivers driven through the lossy simulated channel.
//!
//! Where the loopback test gives the drivers a perfect wire, this one
//! gives them the same fault-injecting `LossyDirection` the lockstep
//! simulator uses, shared across threads: seeded drops, corruption and
//! duplication on both halves of the channel, with the drivers' own
//! timeout and retransmission machinery doing the recovering.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;
use paperlink_core::{
    CancelFlag, ChunkSource, DeliverySink, Environment, LinkError, Receiver,
    ReceiverDriverConfig, Sender, SenderConfig, SenderDriverConfig, TransferOutcome,
    run_receiver, run_sender,
};
use paperlink_harness::{ChaosConfig, FaultPlan, LossyDirection, SharedDirection};

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
fn drivers_converge_across_a_lossy_channel() {
    let message: Vec<u8> = (0..200u32).map(|i| (i * 13) as u8).collect();
    let chaos = ChaosConfig { drop_prob: 0.20, corrupt_prob: 0.10, duplicate_prob: 0.10 };

    let data =
        SharedDirection::new(LossyDirection::new("data", FaultPlan::perfect().with_chaos(chaos), 11));
    let acks =
        SharedDirection::new(LossyDirection::new("ack", FaultPlan::perfect().with_chaos(chaos), 12));

    let cancel = CancelFlag::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    let receiver_handle = {
        let mut frames = data.clone().with_cancel(cancel.clone());
        let mut emitter = acks.clone();
        let received = Arc::clone(&received);
        thread::spawn(move || {
            let mut receiver = Receiver::new();
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

    // A paper-channel timeout scaled down to test speed.
    let mut sender = Sender::new(SenderConfig { timeout: Duration::from_millis(200) });
    let mut chunks = FixedChunks {
        chunks: message.chunks(8).map(Bytes::copy_from_slice).collect(),
    };
    let mut frames = acks.clone();
    let mut emitter = data.clone();

    let report = run_sender(
        &RealTimeEnv,
        &mut sender,
        &mut chunks,
        &mut frames,
        &mut emitter,
        &SenderDriverConfig { recv_delay: Duration::from_millis(2), max_frame_failures: 30 },
    )
    .expect("sender driver");

    assert_eq!(report.outcome, Some(TransferOutcome::Completed));

    cancel.cancel();
    let receiver_report = receiver_handle
        .join()
        .expect("receiver thread")
        .expect("receiver driver");

    assert_eq!(receiver_report.outcome, Some(TransferOutcome::Interrupted));
    assert_eq!(*received.lock().expect("sink"), message);

    // Every chunk crossed the channel at least once; faults only ever add
    // emissions on top of that.
    let data_emitted = data.with_direction(|dir| dir.emitted()).expect("direction");
    assert!(data_emitted >= message.chunks(8).count() as u64);
    assert_eq!(
        report.packets_sent,
        message.chunks(8).count() as u64,
        "each chunk gets exactly one first transmission"
    );
}
