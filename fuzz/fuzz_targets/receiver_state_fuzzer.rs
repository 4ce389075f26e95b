//! Fuzz target for the receiver state machine
//!
//! Feeds the receiver arbitrary "QR payloads" - mostly garbage, sometimes
//! valid-looking packets - and checks the core invariant after every step:
//! once running, the ACK counter trails the expected sequence by exactly
//! one, and delivery only ever happens for the expected sequence.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paperlink_core::{Receiver, ReceiverAction, RecvOutcome};

fuzz_target!(|data: &[u8]| {
    let mut receiver = Receiver::new();

    // Interpret the input as length-prefixed payload slices.
    let mut rest = data;
    while let [len, tail @ ..] = rest {
        let take = (*len as usize).min(tail.len());
        let (payload, remaining) = tail.split_at(take);
        rest = remaining;

        let expected_before = receiver.expected_seq();
        let (outcome, actions) = receiver.handle_visual(payload);

        match outcome {
            RecvOutcome::Delivered { seq } => {
                assert_eq!(seq, expected_before);
                assert!(actions.iter().any(|a| matches!(a, ReceiverAction::Deliver { .. })));
            },
            RecvOutcome::OutOfOrder { .. } | RecvOutcome::Corrupt => {
                assert!(!actions.iter().any(|a| matches!(a, ReceiverAction::Deliver { .. })));
            },
        }

        if let Some(last_ack) = receiver.last_ack() {
            assert_eq!(last_ack.wrapping_add(1), receiver.expected_seq());
        }
    }
});
