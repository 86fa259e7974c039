//! The server (downstream) side of the streaming protocol: validates each
//! incoming query against the expected phase and answers from a
//! [`DatabaseSource`], tracking a per-connection send-index the way the
//! original tracks "which per-table payload to transmit next".

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use ssa_errors::SsaError;
use ssa_wire::{Flags, Frame, FrameCodec, MsgHeader, Op, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::phase::{Phase, METRIC_PHASE_TRANSITIONS};

/// Supplies the payloads a [`DownstreamServer`] streams to a client. One
/// implementation serves the locally-loaded parent database; the access
/// worker implements another over a per-consumer derived database.
pub trait DatabaseSource {
    /// The top-level database descriptor.
    fn db_def(&self) -> Bytes;
    /// A single table's descriptor.
    fn tbl_def(&self) -> Bytes;
    /// The full table-descriptor dataset.
    fn tbl_def_dataset(&self) -> Bytes;
    /// One field-descriptor dataset per table, in table order.
    fn field_def_datasets(&self) -> &[Bytes];
    /// One data dataset per table, in table order.
    fn data_datasets(&self) -> &[Bytes];
}

/// Drives the server side of one streaming session over an accepted
/// connection.
pub struct DownstreamServer<T> {
    framed: Framed<T, FrameCodec>,
    phase: Phase,
    send_index: usize,
}

impl<T: AsyncRead + AsyncWrite + Unpin> DownstreamServer<T> {
    /// Wrap an accepted transport. The session starts in [`Phase::Idle`].
    pub fn new(io: T) -> Self {
        DownstreamServer {
            framed: Framed::new(io, FrameCodec),
            phase: Phase::Idle,
            send_index: 0,
        }
    }

    /// The session's current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read one request and answer it against `source`, or reply empty
    /// (`END`-flagged, header-only) when no database is available yet.
    pub async fn serve_one<S: DatabaseSource>(
        &mut self,
        source: Option<&S>,
    ) -> Result<(), SsaError> {
        let req = self.framed.next().await.ok_or(SsaError::PeerGone)??;
        self.handle(req, source).await
    }

    async fn reply(&mut self, id: u32, op: Op, payload: Bytes) -> Result<(), SsaError> {
        let header = MsgHeader {
            length: (HEADER_LEN + payload.len()) as u32,
            op,
            flags: Flags::RESP,
            status: 0,
            id,
            reserved: 0,
            rdma_length: 0,
            rdma_address: 0,
        };
        self.framed.send(Frame { header, payload }).await
    }

    async fn reply_end(&mut self, id: u32, op: Op) -> Result<(), SsaError> {
        let mut header = MsgHeader::end_of_sequence(op, id);
        header.length = HEADER_LEN as u32;
        self.framed
            .send(Frame {
                header,
                payload: Bytes::new(),
            })
            .await
    }

    async fn handle<S: DatabaseSource>(
        &mut self,
        req: Frame,
        source: Option<&S>,
    ) -> Result<(), SsaError> {
        let op = req.header.op;
        let id = req.header.id;

        if op == Op::PublishEpochBuf {
            tracing::warn!("PUBLISH_EPOCH_BUF is reserved and not currently supported");
            return self.reply_end(id, op).await;
        }

        let in_phase = match op {
            Op::QueryDbDef => self.phase == Phase::Idle,
            Op::QueryTblDef | Op::QueryTblDefDataset => self.phase == Phase::Defs,
            Op::QueryFieldDefDataset => matches!(self.phase, Phase::TblDefs | Phase::FieldDefs),
            Op::QueryDataDataset => self.phase == Phase::Data,
            Op::PublishEpochBuf => unreachable!(),
        };
        if !in_phase {
            tracing::warn!(?op, phase = ?self.phase, "query received out of phase");
            return self.reply_end(id, op).await;
        }

        let Some(source) = source else {
            return self.reply_end(id, op).await;
        };

        match op {
            Op::QueryDbDef => {
                self.reply(id, op, source.db_def()).await?;
                self.phase = Phase::Defs;
                metrics::counter!(METRIC_PHASE_TRANSITIONS, "phase" => "defs").increment(1);
            }
            Op::QueryTblDef => {
                self.reply(id, op, source.tbl_def()).await?;
            }
            Op::QueryTblDefDataset => {
                self.reply(id, op, source.tbl_def_dataset()).await?;
                self.phase = Phase::TblDefs;
                self.send_index = 0;
                metrics::counter!(METRIC_PHASE_TRANSITIONS, "phase" => "tbl_defs").increment(1);
            }
            Op::QueryFieldDefDataset => {
                let items = source.field_def_datasets();
                if self.send_index < items.len() {
                    self.reply(id, op, items[self.send_index].clone()).await?;
                    self.send_index += 1;
                    self.phase = Phase::FieldDefs;
                    metrics::counter!(METRIC_PHASE_TRANSITIONS, "phase" => "field_defs")
                        .increment(1);
                } else {
                    self.reply_end(id, op).await?;
                    self.phase = Phase::Data;
                    self.send_index = 0;
                    metrics::counter!(METRIC_PHASE_TRANSITIONS, "phase" => "data").increment(1);
                }
            }
            Op::QueryDataDataset => {
                let items = source.data_datasets();
                if self.send_index < items.len() {
                    self.reply(id, op, items[self.send_index].clone()).await?;
                    self.send_index += 1;
                } else {
                    self.reply_end(id, op).await?;
                    self.phase = Phase::Idle;
                    self.send_index = 0;
                    metrics::counter!(METRIC_PHASE_TRANSITIONS, "phase" => "idle").increment(1);
                }
            }
            Op::PublishEpochBuf => unreachable!(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ssa_wire::PROTOCOL_VERSION;
    use tokio::io::duplex;

    use super::*;

    struct EmptySource;
    impl DatabaseSource for EmptySource {
        fn db_def(&self) -> Bytes {
            Bytes::new()
        }
        fn tbl_def(&self) -> Bytes {
            Bytes::new()
        }
        fn tbl_def_dataset(&self) -> Bytes {
            Bytes::new()
        }
        fn field_def_datasets(&self) -> &[Bytes] {
            &[]
        }
        fn data_datasets(&self) -> &[Bytes] {
            &[]
        }
    }

    #[tokio::test]
    async fn s2_out_of_phase_query_gets_end_and_warning() {
        let (mut client_io, server_io) = duplex(4096);
        let mut server = DownstreamServer::new(server_io);

        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for (op, id) in [(Op::QueryDbDef, 1u32), (Op::QueryFieldDefDataset, 42)] {
                let header = MsgHeader::request(op, id, HEADER_LEN as u32);
                let mut buf = bytes::BytesMut::new();
                header.encode(&mut buf);
                assert_eq!(buf[0], PROTOCOL_VERSION);
                client_io.write_all(&buf).await.unwrap();
            }
            client_io
        });

        let source = EmptySource;
        // QUERY_DB_DEF: IDLE -> DEFS.
        server.serve_one(Some(&source)).await.unwrap();
        assert_eq!(server.phase(), Phase::Defs);
        // QUERY_FIELD_DEF_DATASET while still in DEFS: rejected, phase unchanged (S2).
        server.serve_one(Some(&source)).await.unwrap();
        assert_eq!(server.phase(), Phase::Defs);

        let _client_io = writer.await.unwrap();
    }
}
