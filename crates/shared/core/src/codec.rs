//! Wire framing
//!
//! Frame = 4-byte big-endian body length, then the JSON-serialized
//! [`Message`]. No compression, no checksum.

use crate::entities::Message;
use crate::error::{CodecError, CodecResult};

/// Length of the frame header
pub const HEADER_LEN: usize = 4;

/// Default upper bound on a frame body
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Largest body a 4-byte header can declare
pub const MAX_HEADER_LEN_VALUE: usize = u32::MAX as usize;

/// Encodes messages into frames and decodes frame bodies back
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Serialize a message and prepend its length
    ///
    /// The result is a whole frame, meant to be written in a single call.
    pub fn encode(&self, message: &Message) -> CodecResult<Vec<u8>> {
        let body = serde_json::to_vec(message).map_err(CodecError::Encode)?;
        self.check_len(body.len())?;
        let declared = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
            size: body.len(),
            max: MAX_HEADER_LEN_VALUE,
        })?;

        let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
        frame.extend_from_slice(&declared.to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Body length declared by a frame header
    pub fn body_len(header: [u8; HEADER_LEN]) -> usize {
        u32::from_be_bytes(header) as usize
    }

    /// Reject declared lengths above the configured maximum
    pub fn check_len(&self, len: usize) -> CodecResult<()> {
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_frame_len,
            });
        }
        Ok(())
    }

    /// Decode a frame body (header already stripped)
    pub fn decode_body(&self, body: &[u8]) -> CodecResult<Message> {
        serde_json::from_slice(body).map_err(CodecError::Decode)
    }

    /// Decode a complete frame, header included
    pub fn decode_frame(&self, frame: &[u8]) -> CodecResult<Message> {
        if frame.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                expected: HEADER_LEN,
                actual: frame.len(),
            });
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        let len = Self::body_len(header);
        self.check_len(len)?;

        let body = &frame[HEADER_LEN..];
        if body.len() != len {
            return Err(CodecError::Truncated {
                expected: len,
                actual: body.len(),
            });
        }
        self.decode_body(body)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale() -> Message {
        Message {
            mti: "0200".to_string(),
            request_id: Some("7f0c".to_string()),
            f2: "4111111111111111".to_string(),
            f3: "2812".to_string(),
            f4: "100.00".to_string(),
            f12: "101500".to_string(),
            f13: "0314".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = FrameCodec::default();
        let msg = sale();

        let frame = codec.encode(&msg).unwrap();
        let decoded = codec.decode_frame(&frame).unwrap();

        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_header_is_big_endian_body_length() {
        let codec = FrameCodec::default();
        let frame = codec.encode(&Message::sign_on()).unwrap();

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        assert_eq!(FrameCodec::body_len(header), frame.len() - HEADER_LEN);
        assert_eq!(FrameCodec::body_len([0, 0, 1, 2]), 258);
    }

    #[test]
    fn test_body_uses_stable_field_names() {
        let codec = FrameCodec::default();
        let frame = codec.encode(&sale()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&frame[HEADER_LEN..]).unwrap();

        assert_eq!(body["mti"], "0200");
        assert_eq!(body["f4"], "100.00");
        assert_eq!(body["request_id"], "7f0c");
        assert_eq!(body["f39"], "");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let codec = FrameCodec::new(16);
        assert!(matches!(
            codec.encode(&sale()),
            Err(CodecError::FrameTooLarge { max: 16, .. })
        ));
        assert!(codec.check_len(17).is_err());
        assert!(codec.check_len(16).is_ok());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = FrameCodec::default();
        assert!(matches!(
            codec.decode_body(b"not json"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            codec.decode_frame(&[0, 0]),
            Err(CodecError::Truncated { .. })
        ));
    }
}
