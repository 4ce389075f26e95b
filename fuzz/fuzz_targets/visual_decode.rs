//! Fuzz target for the visual unwrap
//!
//! Scanned QR contents are attacker-ish input: whatever a camera claims to
//! have seen, `from_visual` must never panic, and the full unwrap-decode
//! pipeline must only ever fail cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paperlink_proto::{Packet, from_visual, to_visual};

fuzz_target!(|data: &[u8]| {
    if let Ok(bytes) = from_visual(data) {
        // Anything that unwraps must re-wrap to an equivalent payload.
        let rewrapped = to_visual(&bytes);
        assert_eq!(from_visual(rewrapped.as_bytes()).unwrap(), bytes);

        let _ = Packet::decode(&bytes);
    }
});
