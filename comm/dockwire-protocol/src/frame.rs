//! Multiplexed stdout/stderr framing.
//!
//! Every frame is an 8-byte header followed by the payload:
//! byte 0 is the stream selector, bytes 1-3 are reserved (ignored on read,
//! zero on write), bytes 4-7 are the big-endian payload length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dockwire_constants::wire::{FRAME_HEADER_SIZE, FRAME_LENGTH_OFFSET, StreamSelector};
use dockwire_error::{Error, FramingError, Result};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound on a single buffer reservation while waiting for a payload.
const MAX_RESERVE: usize = 64 * 1024;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream: StreamSelector,
    pub payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn new(stream: StreamSelector, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }
}

/// Codec for the 8-byte-header stream format.
///
/// A stream that ends cleanly between frames terminates the sequence. A
/// stream that ends inside a header or a payload is a [`FramingError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn declared_len(header: &[u8]) -> u32 {
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[FRAME_LENGTH_OFFSET..FRAME_HEADER_SIZE]);
    u32::from_be_bytes(len)
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < FRAME_HEADER_SIZE {
            src.reserve(FRAME_HEADER_SIZE - src.len());
            return Ok(None);
        }

        let selector = src[0];
        let stream =
            StreamSelector::from_u8(selector).ok_or(FramingError::UnknownStream(selector))?;
        let len = declared_len(src) as usize;

        let total = FRAME_HEADER_SIZE + len;
        if src.len() < total {
            src.reserve((total - src.len()).min(MAX_RESERVE));
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { stream, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() < FRAME_HEADER_SIZE {
            return Err(FramingError::TruncatedHeader { read: src.len() }.into());
        }
        Err(FramingError::TruncatedPayload {
            expected: declared_len(src),
            read: src.len() - FRAME_HEADER_SIZE,
        }
        .into())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let len = u32::try_from(frame.payload.len()).map_err(|_| {
            Error::invalid_request(format!(
                "frame payload of {} bytes exceeds the 32-bit length field",
                frame.payload.len()
            ))
        })?;

        dst.reserve(FRAME_HEADER_SIZE + frame.payload.len());
        dst.put_u8(frame.stream.as_u8());
        dst.put_slice(&[0, 0, 0]);
        dst.put_u32(len);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn encode_all(frames: &[Frame]) -> BytesMut {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for frame in frames {
            codec.encode(frame.clone(), &mut buf).unwrap();
        }
        buf
    }

    async fn decode_all(bytes: &[u8]) -> Vec<Result<Frame>> {
        FramedRead::new(bytes, FrameCodec::new()).collect().await
    }

    #[test]
    fn header_layout() {
        let buf = encode_all(&[Frame::new(StreamSelector::Stderr, &b"ab"[..])]);
        assert_eq!(&buf[..], &[2, 0, 0, 0, 0, 0, 0, 2, b'a', b'b']);
    }

    #[tokio::test]
    async fn hello_on_stdout() {
        let raw = b"\x01\x00\x00\x00\x00\x00\x00\x05hello";
        let frames = decode_all(raw).await;

        assert_eq!(frames.len(), 1);
        let frame = frames.into_iter().next().unwrap().unwrap();
        assert_eq!(frame.stream, StreamSelector::Stdout);
        assert_eq!(&frame.payload[..], b"hello");
    }

    #[tokio::test]
    async fn roundtrip_preserves_order_and_empty_payloads() {
        let big = vec![0xAB; 0x0100_0001];
        let frames = vec![
            Frame::new(StreamSelector::Stdout, &b"first"[..]),
            Frame::new(StreamSelector::Stderr, Bytes::new()),
            Frame::new(StreamSelector::Stderr, big),
            Frame::new(StreamSelector::Stdout, Bytes::new()),
            Frame::new(StreamSelector::Stdout, &b"last"[..]),
        ];
        let encoded = encode_all(&frames);

        let decoded: Vec<Frame> = decode_all(&encoded)
            .await
            .into_iter()
            .map(|frame| frame.unwrap())
            .collect();
        assert_eq!(decoded, frames);
    }

    #[tokio::test]
    async fn reserved_bytes_are_ignored() {
        let raw = b"\x02\xFF\xEE\xDD\x00\x00\x00\x03err";
        let frame = decode_all(raw).await.remove(0).unwrap();
        assert_eq!(frame, Frame::new(StreamSelector::Stderr, &b"err"[..]));
    }

    #[tokio::test]
    async fn truncated_payload_is_framing_error() {
        let raw = b"\x01\x00\x00\x00\x00\x00\x00\x0Ahello";
        let mut frames = decode_all(raw).await;

        assert_eq!(frames.len(), 1);
        match frames.remove(0) {
            Err(Error::Framing(FramingError::TruncatedPayload { expected, read })) => {
                assert_eq!(expected, 10);
                assert_eq!(read, 5);
            }
            other => panic!("expected truncated payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn max_declared_length_is_read_as_unsigned() {
        let raw = b"\x01\x00\x00\x00\xFF\xFF\xFF\xFFabc";
        let mut frames = decode_all(raw).await;

        assert_eq!(frames.len(), 1);
        match frames.remove(0) {
            Err(Error::Framing(FramingError::TruncatedPayload { expected, read })) => {
                assert_eq!(expected, u32::MAX);
                assert_eq!(read, 3);
            }
            other => panic!("expected truncated payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_header_is_framing_error() {
        let mut raw = encode_all(&[Frame::new(StreamSelector::Stdout, &b"ok"[..])]);
        raw.extend_from_slice(&[1, 0, 0]);
        let frames = decode_all(&raw).await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(matches!(
            frames[1],
            Err(Error::Framing(FramingError::TruncatedHeader { read: 3 }))
        ));
    }

    #[tokio::test]
    async fn empty_input_ends_cleanly() {
        assert!(decode_all(b"").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_selector_is_rejected() {
        let raw = b"\x07\x00\x00\x00\x00\x00\x00\x01x";
        let mut frames = decode_all(raw).await;
        assert!(matches!(
            frames.remove(0),
            Err(Error::Framing(FramingError::UnknownStream(7)))
        ));
    }

    #[tokio::test]
    async fn frames_split_across_reads() {
        let encoded = encode_all(&[
            Frame::new(StreamSelector::Stdout, &b"split"[..]),
            Frame::new(StreamSelector::Stderr, &b"me"[..]),
        ]);
        // Feed one byte at a time.
        let chunks: Vec<std::io::Result<Bytes>> = encoded
            .iter()
            .map(|b| Ok(Bytes::copy_from_slice(&[*b])))
            .collect();
        let reader = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));

        let decoded: Vec<Frame> = FramedRead::new(reader, FrameCodec::new())
            .map(|frame| frame.unwrap())
            .collect()
            .await;
        assert_eq!(decoded.len(), 2);
        assert_eq!(&decoded[0].payload[..], b"split");
        assert_eq!(decoded[1].stream, StreamSelector::Stderr);
    }
}
