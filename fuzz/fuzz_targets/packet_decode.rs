//! Fuzz target for Packet::decode
//!
//! Arbitrary byte sequences must never panic the decoder: too-short
//! buffers, checksum garbage and oversized payload claims all return Err.
//! When a buffer does decode, re-encoding it must reproduce the input
//! exactly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paperlink_proto::Packet;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = Packet::decode(data) {
        // Round-trip: anything that decodes must re-encode byte-identical.
        assert_eq!(&packet.encode()[..], data);
    }
});
