//! Property-based tests for the packet and visual codecs.
//!
//! These verify the codec contracts for ALL valid inputs, not just specific
//! examples: encode/decode round-trips, corruption detection at every byte
//! position, and identity of the visual wrap.

use paperlink_proto::{DATA_SIZE, HEADER_SIZE, Packet, ProtocolError, from_visual, to_visual};
use proptest::prelude::*;

/// Strategy for arbitrary in-range payloads.
///
/// Full DATA_SIZE payloads make the mutation sweep below quadratic, so most
/// cases stay small with a few near the limit.
fn arbitrary_payload() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..256),
        1 => prop::collection::vec(any::<u8>(), (DATA_SIZE - 8)..=DATA_SIZE),
    ]
}

#[test]
fn prop_packet_roundtrip() {
    proptest!(|(seq in any::<u8>(), payload in arbitrary_payload())| {
        let packet = Packet::data(seq, payload).expect("payload within DATA_SIZE");
        let wire = packet.encode();

        let decoded = Packet::decode(&wire).expect("decode of fresh encode");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(decoded, packet);
    });
}

#[test]
fn prop_ack_roundtrip() {
    proptest!(|(seq in any::<u8>())| {
        let wire = Packet::ack(seq).encode();
        prop_assert_eq!(wire.len(), paperlink_proto::ACK_SIZE);

        let decoded = Packet::decode(&wire).expect("decode of fresh encode");
        prop_assert!(decoded.is_ack());
        prop_assert_eq!(decoded.seq, seq);
    });
}

#[test]
fn prop_single_byte_flip_always_detected() {
    proptest!(|(
        seq in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
        flip in any::<u8>().prop_filter("flip must change the byte", |b| *b != 0),
    )| {
        let wire = Packet::data(seq, payload).expect("payload within DATA_SIZE").encode();

        // PROPERTY: a flip at ANY byte position is rejected. Flips in the
        // checksum field break the claimed CRC; flips in the body break the
        // recomputed one.
        for position in 0..wire.len() {
            let mut damaged = wire.to_vec();
            damaged[position] ^= flip;

            prop_assert!(
                matches!(
                    Packet::decode(&damaged),
                    Err(ProtocolError::ChecksumMismatch { .. })
                ),
                "flip {flip:#04x} at byte {position} was not detected"
            );
        }
    });
}

#[test]
fn prop_truncation_always_detected() {
    proptest!(|(seq in any::<u8>(), len in 0..HEADER_SIZE)| {
        let wire = Packet::ack(seq).encode();

        prop_assert!(
            matches!(
                Packet::decode(&wire[..len]),
                Err(ProtocolError::Truncated { .. })
            ),
            "truncation at len {len} was not detected"
        );
    });
}

#[test]
fn prop_visual_wrap_roundtrip() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..=DATA_SIZE))| {
        let wrapped = to_visual(&bytes);

        // PROPERTY: the wrap is pure ASCII and inverts exactly
        prop_assert!(wrapped.is_ascii());
        prop_assert_eq!(from_visual(wrapped.as_bytes()).expect("unwrap of fresh wrap"), bytes);
    });
}

#[test]
fn prop_full_pipeline_roundtrip() {
    proptest!(|(seq in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..512))| {
        let packet = Packet::data(seq, payload).expect("payload within DATA_SIZE");

        // Encode -> wrap -> unwrap -> decode, exactly as the channel does.
        let visual = to_visual(&packet.encode());
        let unwrapped = from_visual(visual.as_bytes()).expect("unwrap of fresh wrap");
        let decoded = Packet::decode(&unwrapped).expect("decode of fresh encode");

        prop_assert_eq!(decoded, packet);
    });
}
