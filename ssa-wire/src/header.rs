//! The fixed-size message header every frame in the streaming protocol
//! begins with, and its big-endian wire encoding.

use bytes::{Buf, BufMut};
use ssa_errors::SsaError;

/// Protocol version this implementation speaks. Any other value on the wire
/// is a framing error.
pub const PROTOCOL_VERSION: u8 = 1;

/// The single message class this protocol defines. Any other value on the
/// wire is a framing error.
pub const PROTOCOL_CLASS: u8 = 1;

/// Byte length of an encoded [`MsgHeader`].
pub const HEADER_LEN: usize = 32;

bitflags::bitflags! {
    /// Bits carried in [`MsgHeader::flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u16 {
        /// No further payload follows for this op/phase; the current
        /// multi-response sequence is complete.
        const END = 0b001;
        /// This frame is a response to an earlier request.
        const RESP = 0b010;
        /// Reserved RDMA hint bit; carried but not interpreted by this
        /// implementation.
        const RDMA_HINT = 0b100;
    }
}

/// The six wire operations. The last is reserved for a publish-side push
/// of epoch buffers and is currently rejected with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Op {
    /// Request/response carrying the top-level database descriptor.
    QueryDbDef = 1,
    /// Request/response carrying one table's descriptor.
    QueryTblDef = 2,
    /// Request/response carrying the full table-descriptor dataset.
    QueryTblDefDataset = 3,
    /// Request/response carrying the field-descriptor dataset, one table
    /// per response, terminated by an `END`-flagged header-only frame.
    QueryFieldDefDataset = 4,
    /// Request/response carrying the data dataset, one table per response,
    /// terminated by an `END`-flagged header-only frame.
    QueryDataDataset = 5,
    /// Reserved: publish a database update out of band. Rejected with a
    /// `ProtocolWarning` until implemented.
    PublishEpochBuf = 6,
}

impl Op {
    fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => Op::QueryDbDef,
            2 => Op::QueryTblDef,
            3 => Op::QueryTblDefDataset,
            4 => Op::QueryFieldDefDataset,
            5 => Op::QueryDataDataset,
            6 => Op::PublishEpochBuf,
            _ => return None,
        })
    }
}

/// The fixed header every frame begins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total frame length in bytes, including this header.
    pub length: u32,
    /// The operation this frame performs or responds to.
    pub op: Op,
    /// END/RESP/RDMA-hint bits.
    pub flags: Flags,
    /// Response status; zero for requests.
    pub status: u16,
    /// Request correlator, echoed by the responder.
    pub id: u32,
    /// Reserved for future use; round-tripped but not interpreted.
    pub reserved: u32,
    /// Byte length of an out-of-band RDMA payload, if any.
    pub rdma_length: u32,
    /// Address of an out-of-band RDMA payload, if any.
    pub rdma_address: u64,
}

impl MsgHeader {
    /// Build a request header with the given op, id, and total frame
    /// length (header plus payload).
    pub fn request(op: Op, id: u32, length: u32) -> Self {
        MsgHeader {
            length,
            op,
            flags: Flags::empty(),
            status: 0,
            id,
            reserved: 0,
            rdma_length: 0,
            rdma_address: 0,
        }
    }

    /// Build a header-only `END`-flagged response echoing `id`.
    pub fn end_of_sequence(op: Op, id: u32) -> Self {
        MsgHeader {
            length: HEADER_LEN as u32,
            op,
            flags: Flags::END | Flags::RESP,
            status: 0,
            id,
            reserved: 0,
            rdma_length: 0,
            rdma_address: 0,
        }
    }

    /// Serialize this header to its 32-byte big-endian wire form.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(PROTOCOL_CLASS);
        buf.put_u16(self.op as u16);
        buf.put_u32(self.length);
        buf.put_u16(self.flags.bits());
        buf.put_u16(self.status);
        buf.put_u32(self.id);
        buf.put_u32(self.reserved);
        buf.put_u32(self.rdma_length);
        buf.put_u64(self.rdma_address);
    }

    /// Parse a 32-byte big-endian buffer into a header, validating version,
    /// class and op. Any other combination is a [`SsaError::FramingError`].
    pub fn decode(mut buf: impl Buf) -> Result<Self, SsaError> {
        if buf.remaining() < HEADER_LEN {
            return Err(SsaError::FramingError("short header".into()));
        }
        let version = buf.get_u8();
        let class = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(SsaError::FramingError(format!(
                "unsupported version {version}"
            )));
        }
        if class != PROTOCOL_CLASS {
            return Err(SsaError::FramingError(format!("unsupported class {class}")));
        }
        let op_raw = buf.get_u16();
        let op = Op::from_u16(op_raw)
            .ok_or_else(|| SsaError::FramingError(format!("unknown op {op_raw}")))?;
        let length = buf.get_u32();
        let flags = Flags::from_bits_truncate(buf.get_u16());
        let status = buf.get_u16();
        let id = buf.get_u32();
        let reserved = buf.get_u32();
        let rdma_length = buf.get_u32();
        let rdma_address = buf.get_u64();
        Ok(MsgHeader {
            length,
            op,
            flags,
            status,
            id,
            reserved,
            rdma_length,
            rdma_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use proptest::prelude::*;

    use super::*;

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::QueryDbDef),
            Just(Op::QueryTblDef),
            Just(Op::QueryTblDefDataset),
            Just(Op::QueryFieldDefDataset),
            Just(Op::QueryDataDataset),
            Just(Op::PublishEpochBuf),
        ]
    }

    proptest! {
        /// P5: parse(serialise(h)) == h for every well-formed header.
        #[test]
        fn header_round_trips(
            op in arb_op(),
            length in any::<u32>(),
            flags_bits in any::<u16>(),
            status in any::<u16>(),
            id in any::<u32>(),
            reserved in any::<u32>(),
            rdma_length in any::<u32>(),
            rdma_address in any::<u64>(),
        ) {
            let h = MsgHeader {
                length,
                op,
                flags: Flags::from_bits_truncate(flags_bits),
                status,
                id,
                reserved,
                rdma_length,
                rdma_address,
            };
            let mut buf = BytesMut::new();
            h.encode(&mut buf);
            prop_assert_eq!(buf.len(), HEADER_LEN);
            let decoded = MsgHeader::decode(buf.freeze()).unwrap();
            prop_assert_eq!(decoded, h);
        }
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = BytesMut::new();
        buf.put_u8(99);
        buf.put_bytes(0, HEADER_LEN - 1);
        assert!(matches!(
            MsgHeader::decode(buf.freeze()),
            Err(SsaError::FramingError(_))
        ));
    }

    #[test]
    fn rejects_unknown_op() {
        let mut buf = BytesMut::new();
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(PROTOCOL_CLASS);
        buf.put_u16(99);
        buf.put_bytes(0, HEADER_LEN - 4);
        assert!(matches!(
            MsgHeader::decode(buf.freeze()),
            Err(SsaError::FramingError(_))
        ));
    }
}
