//! Length-prefixed frame codec for `tokio_util::codec::Framed`.
//!
//! Decoding returns `Ok(None)` until a complete frame has arrived —
//! a partial frame is never surfaced. A declared length above
//! [`MAX_PAYLOAD_SIZE`] fails immediately with
//! [`HelmError::OversizedFrame`] without waiting for (or reading) the
//! body; the caller must drop the connection. EOF mid-frame produces
//! [`HelmError::ShortHeader`] or [`HelmError::ShortBody`].

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::HelmError;
use crate::frame::{Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::message::MessageType;

/// Codec for the `type | length | payload` wire format.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = HelmError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, HelmError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let raw_type = u32::from_be_bytes(src[0..4].try_into().expect("4-byte slice"));
        let length = u32::from_be_bytes(src[4..8].try_into().expect("4-byte slice")) as usize;

        if length > MAX_PAYLOAD_SIZE {
            return Err(HelmError::OversizedFrame {
                length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < HEADER_SIZE + length {
            src.reserve(HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        // Consume the whole frame before interpreting the type, so an
        // unknown type costs one frame rather than desyncing the
        // stream.
        src.advance(HEADER_SIZE);
        let payload = src.split_to(length).freeze();
        let msg_type = MessageType::try_from(raw_type)?;

        Ok(Some(Frame::new(msg_type, payload)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, HelmError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None if src.len() < HEADER_SIZE => Err(HelmError::ShortHeader { got: src.len() }),
            None => {
                let expected =
                    u32::from_be_bytes(src[4..8].try_into().expect("4-byte slice")) as usize;
                Err(HelmError::ShortBody {
                    expected,
                    got: src.len() - HEADER_SIZE,
                })
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = HelmError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), HelmError> {
        let msg_type = frame.msg_type();
        let payload = frame.into_payload();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(HelmError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_u32(msg_type as u32);
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Result<Option<Frame>, HelmError>> {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(f)) => out.push(Ok(Some(f))),
                other => {
                    out.push(other);
                    break;
                }
            }
        }
        out
    }

    #[test]
    fn roundtrip_through_codec() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        let frame = Frame::new(MessageType::KeyEvent, &b"{\"key\":\"a\"}"[..]).unwrap();
        codec.encode(frame.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_header_yields_none() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_body_yields_none() {
        let mut codec = FrameCodec;
        // KeyEvent, declared length 10, only 3 payload bytes present.
        let mut bytes = vec![0, 0, 0, 4, 0, 0, 0, 10];
        bytes.extend_from_slice(b"abc");
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        // Nothing consumed.
        assert_eq!(buf.len(), bytes.len());
    }

    #[test]
    fn oversized_declared_length_errors_without_body() {
        let mut codec = FrameCodec;
        let declared = (MAX_PAYLOAD_SIZE + 1) as u32;
        let mut bytes = vec![0, 0, 0, 5];
        bytes.extend_from_slice(&declared.to_be_bytes());
        let mut buf = BytesMut::from(&bytes[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, HelmError::OversizedFrame { .. }));
        assert!(err.is_connection_fatal());
    }

    #[test]
    fn unknown_type_consumes_frame_and_errors() {
        // Type 99, length 2, payload "hi", then a valid ping.
        let mut bytes = vec![0, 0, 0, 99, 0, 0, 0, 2];
        bytes.extend_from_slice(b"hi");
        bytes.extend_from_slice(&Frame::ping().to_bytes());

        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&bytes[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, HelmError::UnknownMessageType(99)));
        assert!(!err.is_connection_fatal());

        // The stream stays in sync: the next frame decodes cleanly.
        let next = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(next.msg_type(), MessageType::Ping);
    }

    #[test]
    fn eof_mid_header_is_short_header() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[0u8, 0, 0, 13, 0][..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, HelmError::ShortHeader { got: 5 }));
    }

    #[test]
    fn eof_mid_body_is_short_body() {
        let mut codec = FrameCodec;
        let mut bytes = vec![0, 0, 0, 4, 0, 0, 0, 8];
        bytes.extend_from_slice(b"abc");
        let mut buf = BytesMut::from(&bytes[..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            HelmError::ShortBody {
                expected: 8,
                got: 3
            }
        ));
    }

    #[test]
    fn eof_on_clean_boundary_is_none() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut bytes = Frame::ping().to_bytes();
        bytes.extend_from_slice(&Frame::error("boom").to_bytes());
        bytes.extend_from_slice(&Frame::pong().to_bytes());

        let results = decode_all(&bytes);
        let types: Vec<MessageType> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().and_then(|o| o.as_ref()))
            .map(|f| f.msg_type())
            .collect();
        assert_eq!(
            types,
            vec![MessageType::Ping, MessageType::Error, MessageType::Pong]
        );
    }
}
