//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes must never panic the frame parser. Every invalid input
//! returns an error; every accepted frame re-encodes to its own prefix.

#![no_main]

use interlock_proto::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        let mut encoded = Vec::new();
        frame.encode(&mut encoded).unwrap();
        assert_eq!(encoded.as_slice(), &data[..encoded.len()]);
    }
});
