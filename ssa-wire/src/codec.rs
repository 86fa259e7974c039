//! A [`tokio_util::codec`] `Encoder`/`Decoder` pair for streaming-protocol
//! frames, used to turn a raw byte stream into a stream of `(MsgHeader,
//! payload)` frames and back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ssa_errors::SsaError;
use tokio_util::codec::{Decoder, Encoder};

use crate::header::{MsgHeader, HEADER_LEN};

/// One decoded frame: its header plus whatever payload bytes followed it,
/// per `header.length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame's header.
    pub header: MsgHeader,
    /// The payload, if `header.length` exceeded the header size.
    pub payload: Bytes,
}

/// Length-delimited codec keyed off [`MsgHeader::length`], the async
/// equivalent of the original's two-chunk (header, body) `sbuf`/`sbuf2`
/// send/receive discipline: a frame is only handed to the caller once both
/// the header and its full payload have arrived.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = SsaError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, SsaError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let header = MsgHeader::decode(&src[..HEADER_LEN])?;
        let total_len = header.length as usize;
        if total_len < HEADER_LEN {
            return Err(SsaError::FramingError(format!(
                "frame length {total_len} shorter than header"
            )));
        }
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(total_len - HEADER_LEN).freeze();
        Ok(Some(Frame { header, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = SsaError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), SsaError> {
        dst.reserve(HEADER_LEN + frame.payload.len());
        frame.header.encode(dst);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::header::{Flags, Op};

    use super::*;

    #[test]
    fn decode_waits_for_full_payload() {
        let header = MsgHeader::request(Op::QueryDbDef, 7, (HEADER_LEN + 4) as u32);
        let frame = Frame {
            header,
            payload: Bytes::from_static(b"abcd"),
        };
        let mut encoded = BytesMut::new();
        FrameCodec.encode(frame.clone(), &mut encoded).unwrap();

        let mut partial = BytesMut::from(&encoded[..HEADER_LEN + 2]);
        assert_eq!(FrameCodec.decode(&mut partial).unwrap(), None);

        let mut full = encoded.clone();
        let decoded = FrameCodec.decode(&mut full).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(full.is_empty());
    }

    #[test]
    fn end_of_sequence_header_only() {
        let header = MsgHeader::end_of_sequence(Op::QueryFieldDefDataset, 3);
        assert!(header.flags.contains(Flags::END));
        let mut encoded = BytesMut::new();
        FrameCodec
            .encode(
                Frame {
                    header,
                    payload: Bytes::new(),
                },
                &mut encoded,
            )
            .unwrap();
        let decoded = FrameCodec.decode(&mut encoded).unwrap().unwrap();
        assert!(decoded.payload.is_empty());
    }
}
