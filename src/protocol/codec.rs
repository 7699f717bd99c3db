//! Protocol codec for encoding/decoding messages
//!
//! Handles framing of JSON payloads.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;

use super::MAGIC_BYTES;

/// Maximum payload size (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Header size: magic(4) + length(4) + sequence(4) = 12 bytes
const HEADER_SIZE: usize = 12;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Message frame with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    /// Sequence number; a response echoes its request's
    pub sequence: u32,
    /// The actual message
    pub message: T,
}

impl<T> Frame<T> {
    pub fn new(sequence: u32, message: T) -> Self {
        Self { sequence, message }
    }
}

/// Encodes messages into the wire format
pub struct Encoder {
    sequence: u32,
}

impl Encoder {
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    /// Encode a message with the next sequence number; returns that number
    pub fn encode<T: Serialize>(&mut self, message: &T, buf: &mut BytesMut) -> Result<u32, CodecError> {
        let sequence = self.sequence;
        self.encode_frame(sequence, message, buf)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(sequence)
    }

    /// Encode a message with an explicit sequence number
    pub fn encode_frame<T: Serialize>(
        &mut self,
        sequence: u32,
        message: &T,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(message)?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::MessageTooLarge(payload.len(), MAX_MESSAGE_SIZE));
        }

        buf.reserve(HEADER_SIZE + payload.len());
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32(payload.len() as u32);
        buf.put_u32(sequence);
        buf.put_slice(&payload);
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes messages from the wire format
pub struct Decoder {
    state: DecodeState,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        length: usize,
        sequence: u32,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
        }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode<T: DeserializeOwned>(&mut self, buf: &mut BytesMut) -> Result<Option<Frame<T>>, CodecError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    if buf[0..4] != MAGIC_BYTES {
                        return Err(CodecError::InvalidMagic);
                    }

                    let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
                    let sequence = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

                    if length > MAX_MESSAGE_SIZE {
                        return Err(CodecError::MessageTooLarge(length, MAX_MESSAGE_SIZE));
                    }

                    buf.advance(HEADER_SIZE);
                    self.state = DecodeState::Payload { length, sequence };
                }
                DecodeState::Payload { length, sequence } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length);
                    self.state = DecodeState::Header;

                    let message: T = serde_json::from_slice(&payload)?;
                    return Ok(Some(Frame::new(sequence, message)));
                }
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MethodCall, MethodResponse};

    #[test]
    fn test_sequence_numbers_increase() {
        let mut encoder = Encoder::new();
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        let calls = vec![
            MethodCall::move_cursor(10, 0),
            MethodCall::perform_click(),
            MethodCall::open_accessibility_settings(),
        ];
        for call in &calls {
            encoder.encode(call, &mut buf).unwrap();
        }

        for (i, original) in calls.iter().enumerate() {
            let frame: Frame<MethodCall> = decoder.decode(&mut buf).unwrap().unwrap();
            assert_eq!(frame.sequence, i as u32);
            assert_eq!(&frame.message, original);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frames_wait_for_more_data() {
        let mut encoder = Encoder::new();
        let mut wire = BytesMut::new();
        encoder
            .encode_frame(7, &MethodResponse::Success, &mut wire)
            .unwrap();

        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();

        // Feed the frame one byte at a time
        let bytes = wire.to_vec();
        let (last, head) = bytes.split_last().unwrap();
        for byte in head {
            buf.put_u8(*byte);
            let frame: Option<Frame<MethodResponse>> = decoder.decode(&mut buf).unwrap();
            assert!(frame.is_none());
        }
        buf.put_u8(*last);

        let frame: Frame<MethodResponse> = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::new(7, MethodResponse::Success));
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n"[..]);
        let result: Result<Option<Frame<MethodCall>>, _> = decoder.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidMagic)));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = Decoder::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC_BYTES);
        buf.put_u32((MAX_MESSAGE_SIZE + 1) as u32);
        buf.put_u32(0);

        let result: Result<Option<Frame<MethodCall>>, _> = decoder.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::MessageTooLarge(_, _))));
    }
}
