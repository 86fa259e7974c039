//! The downstream worker (§4.3 server side, §4.6): accepts inbound
//! connections once ctrl signals `LISTEN`, and serves each one from
//! whichever database applies to that connection's peer — the parent
//! database on a plain distribution node, or an access node's derived
//! database for that specific consumer's GID once one becomes available.
//!
//! Grounded in `ssa_downstream_accept_conn`'s accept loop and
//! `ssa_downstream_handle_query_*`'s table-source lookup, re-expressed as
//! one `tokio::task` per accepted connection rather than the original's
//! single-threaded multiplexed poll loop.

use std::sync::Arc;

use bytes::Bytes;
use ssa_errors::SsaError;
use ssa_protocol::{DatabaseSource, DownstreamServer};
use ssa_smdb::{wire, Database};
use ssa_types::Gid;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channels::{ConnDone, CtrlChannel, CtrlMsg};
use crate::metrics::METRIC_CONNECTIONS_ACCEPTED;
use crate::transport::StreamTransport;
use crate::{DerivedDbMap, PublishedDb};

/// sock_accessdown, shared across every accepted connection's task so each
/// can report its own `CONN_DONE` to the access worker.
pub type AccessChannel = Arc<Mutex<CtrlChannel>>;

/// A [`DatabaseSource`] computed once from a [`Database`] snapshot, so the
/// per-table byte encoding is shared across every connection serving the
/// same epoch rather than redone per connection.
pub struct InMemorySource {
    db_def: Bytes,
    data_datasets: Vec<Bytes>,
}

impl InMemorySource {
    /// Encode a [`Database`] snapshot into its wire-ready descriptor and
    /// data-table payloads.
    pub fn from_database(db: &Database) -> Self {
        InMemorySource {
            db_def: wire::encode_db_def(db),
            data_datasets: wire::encode_data_datasets(db),
        }
    }
}

impl DatabaseSource for InMemorySource {
    fn db_def(&self) -> Bytes {
        self.db_def.clone()
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
        &self.data_datasets
    }
}

/// Runs the downstream worker: waits for ctrl's `LISTEN`, then accepts and
/// serves children until `CTRL_EXIT`. `derived` is `Some` only on
/// access-role nodes; when present, a connection is served from its own
/// entry in the map rather than from `published` once one exists.
pub async fn run_downstream<T>(
    transport: Arc<T>,
    port: u16,
    mut ctrl_ch: CtrlChannel,
    published: PublishedDb,
    derived: Option<DerivedDbMap>,
    access_ch: Option<AccessChannel>,
) -> Result<(), SsaError>
where
    T: StreamTransport + 'static,
{
    ctrl_ch.send(&CtrlMsg::CtrlAck).await?;
    let mut accept_task: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        match ctrl_ch.recv().await? {
            None | Some(CtrlMsg::CtrlExit) => {
                if let Some(task) = accept_task.take() {
                    task.abort();
                }
                return Ok(());
            }
            Some(CtrlMsg::Listen) => {
                if accept_task.is_some() {
                    continue;
                }
                let listener = transport.listen(port).await?;
                let transport = transport.clone();
                let published = published.clone();
                let derived = derived.clone();
                let access_ch = access_ch.clone();
                accept_task = Some(tokio::spawn(async move {
                    if let Err(e) =
                        accept_loop(transport, listener, published, derived, access_ch).await
                    {
                        warn!(?e, "downstream accept loop exited");
                    }
                }));
            }
            Some(_) => {}
        }
    }
}

async fn accept_loop<T>(
    transport: Arc<T>,
    listener: T::Listener,
    published: PublishedDb,
    derived: Option<DerivedDbMap>,
    access_ch: Option<AccessChannel>,
) -> Result<(), SsaError>
where
    T: StreamTransport + 'static,
{
    loop {
        let (stream, peer_gid) = transport.accept(&listener).await?;
        debug!(?peer_gid, "accepted child connection");
        metrics::counter!(METRIC_CONNECTIONS_ACCEPTED).increment(1);
        if let Some(access_ch) = access_ch.as_ref() {
            let access_ch = access_ch.clone();
            let done = ConnDone { peer_gid: peer_gid.0 };
            access_ch
                .lock()
                .await
                .send(&CtrlMsg::ConnDone(done))
                .await?;
        }
        let published = published.clone();
        let derived = derived.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, peer_gid, published, derived).await {
                if !matches!(e, SsaError::PeerGone) {
                    warn!(?e, "downstream connection ended with an error");
                }
            }
        });
    }
}

async fn serve_connection<S>(
    stream: S,
    peer_gid: Gid,
    published: PublishedDb,
    derived: Option<DerivedDbMap>,
) -> Result<(), SsaError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut server = DownstreamServer::new(stream);
    loop {
        let db = if let Some(derived) = derived.as_ref() {
            derived.read().await.get(&peer_gid).cloned()
        } else {
            None
        };
        let source = match db {
            Some(db) => Some(InMemorySource::from_database(&db)),
            None => {
                let guard = published.read().await;
                guard.as_deref().map(InMemorySource::from_database)
            }
        };
        server.serve_one(source.as_ref()).await?;
    }
}

#[cfg(test)]
mod tests {
    use ssa_types::Epoch;

    use super::*;

    #[test]
    fn in_memory_source_exposes_eight_core_datasets() {
        let db = Database::new(Epoch(3));
        let source = InMemorySource::from_database(&db);
        assert_eq!(source.data_datasets().len(), wire::CORE_TABLE_COUNT);
    }
}
