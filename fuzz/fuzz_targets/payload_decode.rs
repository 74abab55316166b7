//! Fuzz target for Payload::from_frame
//!
//! Feeds arbitrary CBOR bodies under every opcode: malformed CBOR, the wrong
//! structure for the opcode, oversized byte strings. Decoding must return an
//! error rather than panic.

#![no_main]

use bytes::Bytes;
use interlock_proto::{Frame, FrameHeader, Opcode, Payload};
use libfuzzer_sys::fuzz_target;

const OPCODES: [Opcode; 9] = [
    Opcode::Ping,
    Opcode::Pong,
    Opcode::KeysetGenerate,
    Opcode::KeysetGenerated,
    Opcode::DaeadEncrypt,
    Opcode::DaeadEncrypted,
    Opcode::DaeadDecrypt,
    Opcode::DaeadDecrypted,
    Opcode::Error,
];

fuzz_target!(|data: &[u8]| {
    for opcode in OPCODES {
        let frame = Frame::new(FrameHeader::new(opcode), Bytes::copy_from_slice(data));

        if let Ok(payload) = Payload::from_frame(&frame) {
            assert_eq!(payload.opcode(), opcode);
        }
    }
});
