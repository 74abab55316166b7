//! Frame type combining header and payload.
//!
//! A `Frame` is a pure data holder: header plus raw payload bytes. Typed
//! access goes through [`Payload::into_frame`](crate::Payload::into_frame) and
//! [`Payload::from_frame`](crate::Payload::from_frame).

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame.
///
/// Layout on the wire: `[FrameHeader: 16 bytes] + [payload: variable]`.
///
/// # Invariants
///
/// - `payload.len()` matches `header.payload_size()`. Enforced by
///   [`Frame::new`] and checked by [`Frame::decode`].
/// - `payload.len()` does not exceed [`FrameHeader::MAX_PAYLOAD_SIZE`]. Checked
///   by [`Frame::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Raw payload bytes (CBOR-encoded)
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, setting `payload_size` from the payload length.
    ///
    /// Does not enforce the size limit so oversized frames can be built in
    /// tests. They are rejected by [`Frame::encode`]. Lengths beyond `u32`
    /// saturate, which `encode` also rejects.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let payload_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = payload_len.to_be_bytes();
        Self { header, payload }
    }

    /// Total encoded length.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` if the payload exceeds the protocol limit
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a frame from wire bytes. Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// - Any header validation error from [`FrameHeader::from_bytes`]
    /// - `FrameTruncated` if fewer payload bytes are present than claimed
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_size = header.payload_size() as usize;
        let total_size = FrameHeader::SIZE + payload_size;

        let Some(payload) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Opcode;

    proptest! {
        #[test]
        fn frame_round_trip(
            request_id in any::<u32>(),
            payload in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let mut header = FrameHeader::new(Opcode::DaeadEncrypt);
            header.set_request_id(request_id);
            let frame = Frame::new(header, payload);

            let mut wire = Vec::new();
            frame.encode(&mut wire).expect("should encode");
            prop_assert_eq!(wire.len(), frame.encoded_len());

            let parsed = Frame::decode(&wire).expect("should decode");
            prop_assert_eq!(parsed, frame);
        }
    }

    #[test]
    fn payload_size_set_automatically() {
        let frame = Frame::new(FrameHeader::new(Opcode::Ping), vec![1, 2, 3, 4]);
        assert_eq!(frame.header.payload_size(), 4);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(FrameHeader::new(Opcode::Ping), vec![0u8; 100]);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let result = Frame::decode(&wire[..FrameHeader::SIZE + 10]);
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 10 }));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let frame = Frame::new(FrameHeader::new(Opcode::Ping), vec![9, 9]);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        wire.extend_from_slice(&[0xAA; 8]);

        assert_eq!(Frame::decode(&wire).unwrap(), frame);
    }
}
