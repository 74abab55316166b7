//! Fuzz target for frame header boundary conditions
//!
//! # Strategy
//!
//! - Magic bytes: valid, off-by-one, all-zeros, all-ones, random
//! - Version and reserved byte: valid, zero, max, random
//! - Payload size: zero, small, at-max, just-over-max, u32::MAX, random
//!
//! # Invariants
//!
//! - `payload_size > MAX_PAYLOAD_SIZE` MUST fail with `PayloadTooLarge`
//! - Invalid magic MUST fail with `InvalidMagic`
//! - A non-zero reserved byte MUST fail
//! - Encoded size MUST equal 16 + payload length

#![no_main]

use arbitrary::Arbitrary;
use interlock_proto::{Frame, FrameHeader, Opcode, ProtocolError};
use libfuzzer_sys::fuzz_target;

const MAX_PAYLOAD_SIZE: u32 = FrameHeader::MAX_PAYLOAD_SIZE;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    magic: MagicBytes,
    version: ByteValue,
    reserved: ByteValue,
    opcode: u16,
    request_id: u32,
    payload_size: PayloadSize,
}

#[derive(Debug, Clone, Arbitrary)]
enum MagicBytes {
    Valid,
    OffByOne(u8),
    AllZeros,
    AllOnes,
    Random([u8; 4]),
}

#[derive(Debug, Clone, Arbitrary)]
enum ByteValue {
    Valid,
    Max,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadSize {
    Zero,
    Small(u8),
    AtMaxBoundary,
    JustOverMax,
    MaxU32,
    Random(u32),
}

fuzz_target!(|boundary: BoundaryFrame| {
    let payload_size = match boundary.payload_size {
        PayloadSize::Zero => 0,
        PayloadSize::Small(s) => u32::from(s),
        PayloadSize::AtMaxBoundary => MAX_PAYLOAD_SIZE,
        PayloadSize::JustOverMax => MAX_PAYLOAD_SIZE + 1,
        PayloadSize::MaxU32 => u32::MAX,
        PayloadSize::Random(r) => r,
    };

    let body_len = payload_size.min(100_000) as usize;
    let mut buffer = vec![0u8; FrameHeader::SIZE + body_len];

    let magic = FrameHeader::MAGIC.to_be_bytes();
    match boundary.magic {
        MagicBytes::Valid => buffer[0..4].copy_from_slice(&magic),
        MagicBytes::OffByOne(offset) => {
            buffer[0..4].copy_from_slice(&magic);
            let idx = (offset % 4) as usize;
            buffer[idx] = buffer[idx].wrapping_add(1);
        },
        MagicBytes::AllZeros => buffer[0..4].fill(0),
        MagicBytes::AllOnes => buffer[0..4].fill(0xFF),
        MagicBytes::Random(bytes) => buffer[0..4].copy_from_slice(&bytes),
    }

    buffer[4] = match boundary.version {
        ByteValue::Valid => FrameHeader::VERSION,
        ByteValue::Max => u8::MAX,
        ByteValue::Random(v) => v,
    };
    buffer[5] = match boundary.reserved {
        ByteValue::Valid => 0,
        ByteValue::Max => u8::MAX,
        ByteValue::Random(v) => v,
    };
    buffer[6..8].copy_from_slice(&boundary.opcode.to_be_bytes());
    buffer[8..12].copy_from_slice(&boundary.request_id.to_be_bytes());
    buffer[12..16].copy_from_slice(&payload_size.to_be_bytes());

    match Frame::decode(&buffer) {
        Ok(frame) => {
            assert_eq!(buffer[0..4], magic);
            assert_eq!(buffer[4], FrameHeader::VERSION);
            assert_eq!(buffer[5], 0);
            assert!(payload_size <= MAX_PAYLOAD_SIZE);
            assert_eq!(frame.header.request_id(), boundary.request_id);
            assert_eq!(frame.payload.len(), payload_size as usize);
        },
        Err(ProtocolError::PayloadTooLarge { .. }) => assert!(payload_size > MAX_PAYLOAD_SIZE),
        Err(ProtocolError::InvalidMagic) => assert_ne!(buffer[0..4], magic),
        Err(_) => {},
    }

    if let Some(opcode) = Opcode::from_u16(boundary.opcode) {
        let mut header = FrameHeader::new(opcode);
        header.set_request_id(boundary.request_id);
        let frame = Frame::new(header, vec![0xAA; body_len.min(1000)]);

        let mut encoded = Vec::new();
        frame.encode(&mut encoded).unwrap();
        assert_eq!(encoded.len(), FrameHeader::SIZE + frame.payload.len());

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.header.request_id(), boundary.request_id);
        assert_eq!(decoded.header.opcode_enum(), Some(opcode));
        assert_eq!(decoded.payload, frame.payload);
    }
});
