//! Property tests for the rewrite invariants.

use bytes::BytesMut;
use proptest::prelude::*;

use cqlproxy_rewrite::protocol::{query_flags, Header, HEADER_SIZE};
use cqlproxy_rewrite::rewrite::{inject_timestamp, qualify_keyspace};

fn frame(opcode: u8, lead: Vec<u8>, flags: u8, client_ts: u64) -> Vec<u8> {
    let mut body = lead;
    body.extend_from_slice(&[0x00, 0x01, flags]);
    if flags & query_flags::DEFAULT_TIMESTAMP != 0 {
        body.extend_from_slice(&client_ts.to_be_bytes());
    }
    let mut bytes = Header::new(0x04, 0, 1, opcode, body.len() as u32)
        .encode()
        .to_vec();
    bytes.extend(body);
    bytes
}

fn query_frame(text: &str, flags: u8, client_ts: u64) -> Vec<u8> {
    let mut lead = (text.len() as i32).to_be_bytes().to_vec();
    lead.extend_from_slice(text.as_bytes());
    frame(0x07, lead, flags, client_ts)
}

fn execute_frame(id: &[u8], flags: u8, client_ts: u64) -> Vec<u8> {
    let mut lead = (id.len() as u16).to_be_bytes().to_vec();
    lead.extend_from_slice(id);
    frame(0x0a, lead, flags, client_ts)
}

fn length_holds(bytes: &[u8]) -> bool {
    Header::decode(bytes).unwrap().length as usize == bytes.len() - HEADER_SIZE
}

fn statement() -> impl Strategy<Value = String> {
    ("[a-zA-Z_ ,()=']{0,24}", "[a-zA-Z_ ,()=']{0,24}")
        .prop_map(|(before, after)| format!("{}tasks{}", before, after))
}

fn any_frame() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        (statement(), any::<u8>(), any::<u64>())
            .prop_map(|(text, flags, ts)| query_frame(&text, flags, ts)),
        (prop::collection::vec(any::<u8>(), 0..32), any::<u8>(), any::<u64>())
            .prop_map(|(id, flags, ts)| execute_frame(&id, flags, ts)),
    ]
}

proptest! {
    #[test]
    fn prop_length_field_matches_after_rewrites(raw in any_frame(), ts in any::<u64>()) {
        let bytes = match inject_timestamp(BytesMut::from(&raw[..]), ts) {
            Ok(out) => out.bytes,
            Err(rejected) => rejected.bytes,
        };
        prop_assert!(length_holds(&bytes));

        let bytes = match qualify_keyspace(bytes, "tasks", "codebase") {
            Ok(out) => out.bytes,
            Err(rejected) => rejected.bytes,
        };
        prop_assert!(length_holds(&bytes));
    }

    #[test]
    fn prop_timestamp_injection_is_idempotent(raw in any_frame(), ts in any::<u64>()) {
        let once = inject_timestamp(BytesMut::from(&raw[..]), ts).unwrap().bytes;
        let twice = inject_timestamp(once.clone(), ts.wrapping_add(1)).unwrap();
        prop_assert!(!twice.changed);
        prop_assert_eq!(once, twice.bytes);
    }

    #[test]
    fn prop_client_timestamp_untouched(
        text in statement(),
        flags in any::<u8>(),
        client_ts in any::<u64>(),
        ts in any::<u64>(),
    ) {
        let raw = query_frame(&text, flags | query_flags::DEFAULT_TIMESTAMP, client_ts);
        let out = inject_timestamp(BytesMut::from(&raw[..]), ts).unwrap();
        prop_assert!(!out.changed);
        prop_assert_eq!(&out.bytes[..], &raw[..]);
    }

    #[test]
    fn prop_qualifier_grows_by_prefix(text in statement(), keyspace in "[a-z_]{1,16}") {
        let raw = query_frame(&text, 0, 0);
        let out = qualify_keyspace(BytesMut::from(&raw[..]), "tasks", &keyspace).unwrap();
        prop_assert_eq!(out.bytes.len(), raw.len() + keyspace.len() + 1);
        prop_assert!(length_holds(&out.bytes));

        let text_len = i32::from_be_bytes(out.bytes[9..13].try_into().unwrap());
        prop_assert_eq!(text_len as usize, text.len() + keyspace.len() + 1);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(
        raw in prop::collection::vec(any::<u8>(), 0..64),
        ts in any::<u64>(),
    ) {
        if let Err(rejected) = inject_timestamp(BytesMut::from(&raw[..]), ts) {
            prop_assert_eq!(&rejected.bytes[..], &raw[..]);
        }
        if let Err(rejected) = qualify_keyspace(BytesMut::from(&raw[..]), "tasks", "ks") {
            prop_assert_eq!(&rejected.bytes[..], &raw[..]);
        }
    }
}
