//! The client (upstream) side of the streaming protocol: issues queries in
//! the fixed phase order and checks every response's correlator id against
//! the in-flight request.
//!
//! Grounded in `ssa_upstream_update_conn`/`ssa_upstream_handle_query_*`: the
//! non-blocking `poll`-driven request/response loop there becomes a plain
//! `.await` here, but the data-level discipline — one request in flight per
//! phase step, id echoed back, an `END`-flagged frame closing a per-table
//! sequence — is unchanged.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use ssa_errors::SsaError;
use ssa_wire::{Flags, Frame, FrameCodec, MsgHeader, Op, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::phase::Phase;

/// Drives the client side of one streaming session over a connected
/// transport.
pub struct UpstreamClient<T> {
    framed: Framed<T, FrameCodec>,
    phase: Phase,
    next_id: u32,
}

impl<T: AsyncRead + AsyncWrite + Unpin> UpstreamClient<T> {
    /// Wrap a connected transport. The session starts in [`Phase::Idle`].
    pub fn new(io: T) -> Self {
        UpstreamClient {
            framed: Framed::new(io, FrameCodec),
            phase: Phase::Idle,
            next_id: 1,
        }
    }

    /// The session's current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn next_correlator(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    async fn request(&mut self, op: Op, payload: Bytes) -> Result<Frame, SsaError> {
        let id = self.next_correlator();
        let header = MsgHeader::request(op, id, (HEADER_LEN + payload.len()) as u32);
        self.framed.send(Frame { header, payload }).await?;
        let resp = self.framed.next().await.ok_or(SsaError::PeerGone)??;
        if resp.header.id != id {
            tracing::warn!(expected = id, got = resp.header.id, ?op, "correlator mismatch on response");
            return Err(SsaError::ProtocolWarning(format!(
                "correlator mismatch on {op:?}: expected {id}, got {}",
                resp.header.id
            )));
        }
        Ok(resp)
    }

    /// Step 1: `IDLE -> DEFS`. Issues `QUERY_DB_DEF` and returns the
    /// top-level descriptor payload.
    pub async fn query_db_def(&mut self) -> Result<Bytes, SsaError> {
        let resp = self.request(Op::QueryDbDef, Bytes::new()).await?;
        self.phase = Phase::Defs;
        Ok(resp.payload)
    }

    /// Step 2 (internal sub-step, phase stays `DEFS`): `QUERY_TBL_DEF`.
    pub async fn query_tbl_def(&mut self) -> Result<Bytes, SsaError> {
        self.require_phase(Phase::Defs)?;
        let resp = self.request(Op::QueryTblDef, Bytes::new()).await?;
        Ok(resp.payload)
    }

    /// Step 2: `DEFS -> TBL_DEFS`. Issues `QUERY_TBL_DEF_DATASET`.
    pub async fn query_tbl_def_dataset(&mut self) -> Result<Bytes, SsaError> {
        self.require_phase(Phase::Defs)?;
        let resp = self.request(Op::QueryTblDefDataset, Bytes::new()).await?;
        self.phase = Phase::TblDefs;
        Ok(resp.payload)
    }

    /// Step 3: `TBL_DEFS -> FIELD_DEFS -> DATA`. Repeats
    /// `QUERY_FIELD_DEF_DATASET` until the server signals completion with an
    /// `END`-flagged header-only frame, returning one payload per table.
    pub async fn query_field_def_datasets(&mut self) -> Result<Vec<Bytes>, SsaError> {
        self.require_phase(Phase::TblDefs)?;
        let mut datasets = Vec::new();
        loop {
            let resp = self.request(Op::QueryFieldDefDataset, Bytes::new()).await?;
            if datasets.is_empty() && !resp.header.flags.contains(Flags::END) {
                self.phase = Phase::FieldDefs;
            }
            if resp.header.flags.contains(Flags::END) {
                self.phase = Phase::Data;
                break;
            }
            datasets.push(resp.payload);
        }
        Ok(datasets)
    }

    /// Step 4: `DATA -> IDLE`. Repeats `QUERY_DATA_DATASET` until `END`,
    /// returning one payload per table. The caller is responsible for
    /// publishing the assembled database once this returns.
    pub async fn query_data_datasets(&mut self) -> Result<Vec<Bytes>, SsaError> {
        self.require_phase(Phase::Data)?;
        let mut datasets = Vec::new();
        loop {
            let resp = self.request(Op::QueryDataDataset, Bytes::new()).await?;
            if resp.header.flags.contains(Flags::END) {
                self.phase = Phase::Idle;
                break;
            }
            datasets.push(resp.payload);
        }
        Ok(datasets)
    }

    fn require_phase(&self, expected: Phase) -> Result<(), SsaError> {
        if self.phase != expected {
            return Err(SsaError::ProtocolWarning(format!(
                "expected phase {expected:?}, got {:?}",
                self.phase
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ssa_wire::PROTOCOL_VERSION;
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn correlator_mismatch_is_reported() {
        // A peer that always replies with id+1 should trip the correlator check.
        let (client_io, mut server_io) = duplex(4096);
        let mut client = UpstreamClient::new(client_io);

        let server = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut req = [0u8; HEADER_LEN];
            server_io.read_exact(&mut req).await.unwrap();
            let bad_id: u32 = 0xBAD;
            let header = MsgHeader {
                length: HEADER_LEN as u32,
                op: Op::QueryDbDef,
                flags: Flags::RESP,
                status: 0,
                id: bad_id,
                reserved: 0,
                rdma_length: 0,
                rdma_address: 0,
            };
            let mut buf = bytes::BytesMut::new();
            header.encode(&mut buf);
            assert_eq!(buf[0], PROTOCOL_VERSION);
            server_io.write_all(&buf).await.unwrap();
        });

        let result = client.query_db_def().await;
        assert!(matches!(result, Err(SsaError::ProtocolWarning(_))));
        server.await.unwrap();
    }
}
