#![no_main]

use libfuzzer_sys::fuzz_target;
use mr_store::{decode_payload, encode_payload};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = decode_payload(data) else {
        return;
    };
    let encoded = encode_payload(&value).expect("decoded values re-encode");
    let decoded = decode_payload(&encoded).expect("fresh payload decodes");
    assert_eq!(decoded, value);
});
