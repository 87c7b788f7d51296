use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Frame, TERMINATOR};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("frame size exceeds limit of {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("outgoing payload contains the frame terminator at byte {position}")]
    EmbeddedTerminator { position: usize },
}

/// Splits a byte stream on NUL terminators.
///
/// Bytes that arrive after a terminator stay in the buffer and become the start of the next
/// frame, so a client may write several commands at once.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    // Bytes already scanned for a terminator. Saves rescanning the whole buffer every time a
    // small chunk arrives.
    scanned: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            scanned: 0,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let position = src[self.scanned..]
            .iter()
            .position(|byte| *byte == TERMINATOR)
            .map(|index| self.scanned + index);

        let Some(position) = position else {
            // Check if the pending frame exceeds the limit to avoid buffering forever.
            if src.len() > self.max_frame_size {
                return Err(Error::FrameTooLarge {
                    limit: self.max_frame_size,
                });
            }
            self.scanned = src.len();
            return Ok(None); // Not enough data to complete a frame.
        };

        let payload = src.split_to(position).freeze();
        src.advance(1); // Drop the terminator itself.
        self.scanned = 0;

        Ok(Some(Frame::new(payload)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // The peer went away mid-frame. A partial command is never handed out.
                if !src.is_empty() {
                    tracing::debug!("Discarding {} unterminated bytes at end of stream", src.len());
                    src.clear();
                }
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if let Some(position) = frame.payload().iter().position(|b| *b == TERMINATOR) {
            return Err(Error::EmbeddedTerminator { position });
        }

        dst.reserve(frame.payload().len() + 1);
        dst.put_slice(frame.payload());
        dst.put_u8(TERMINATOR);
        Ok(())
    }
}

impl Encoder<String> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, text: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<Frame>::encode(self, Frame::from(text), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut FrameCodec, src: &mut BytesMut) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(src).unwrap() {
            out.push(frame.to_text());
        }
        out
    }

    #[test]
    fn decode_single_frame() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&b"SELECT 1\0"[..]);

        let frame = codec.decode(&mut src).unwrap();

        assert_eq!(frame, Some(Frame::from("SELECT 1")));
        assert!(src.is_empty());
    }

    #[test]
    fn decode_waits_for_terminator() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&b"SELECT"[..]);

        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(&src[..], b"SELECT");
    }

    #[test]
    fn decode_byte_by_byte() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::new();
        let mut frames = Vec::new();

        for byte in b"INSERT INTO t VALUES (1)\0" {
            src.put_u8(*byte);
            if let Some(frame) = codec.decode(&mut src).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames, vec![Frame::from("INSERT INTO t VALUES (1)")]);
    }

    #[test]
    fn decode_keeps_bytes_after_terminator() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&b"first\0second\0thi"[..]);

        assert_eq!(decode_all(&mut codec, &mut src), vec!["first", "second"]);
        assert_eq!(&src[..], b"thi");

        src.put_slice(b"rd\0");
        assert_eq!(decode_all(&mut codec, &mut src), vec!["third"]);
    }

    #[test]
    fn decode_empty_frame() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&b"\0"[..]);

        let frame = codec.decode(&mut src).unwrap().unwrap();

        assert!(frame.is_empty());
    }

    #[test]
    fn decode_eof_discards_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&b"SELECT * FROM us"[..]);

        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
        assert!(src.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_size(4);
        let mut src = BytesMut::from(&b"SELECT"[..]);

        let err = codec.decode(&mut src).unwrap_err();

        assert!(matches!(err, Error::FrameTooLarge { limit: 4 }));
    }

    #[test]
    fn encode_appends_terminator() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();

        codec.encode("SUCCESS |".to_string(), &mut dst).unwrap();

        assert_eq!(&dst[..], b"SUCCESS |\0");
    }

    #[test]
    fn encode_rejects_embedded_terminator() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();

        let err = codec.encode("do\0ne".to_string(), &mut dst).unwrap_err();

        assert!(matches!(err, Error::EmbeddedTerminator { position: 2 }));
        assert!(dst.is_empty());
    }

    #[test]
    fn encode_then_decode_yields_same_text() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let responses = ["done", "SUCCESS |('alice',)|('bob',)", "", "ünïcødé"];

        for response in responses {
            codec.encode(response.to_string(), &mut buf).unwrap();
        }

        assert_eq!(decode_all(&mut codec, &mut buf), responses);
    }
}
