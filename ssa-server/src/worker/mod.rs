//! Service composition (§4.5): wires the ctrl/upstream/downstream/access
//! worker tasks together over their socketpairs, starting them in the
//! ACK-gated order the original enforces (ctrl, then upstream, then
//! downstream if this node's role serves children, then access if this
//! node computes derived databases) and tearing them down in the reverse
//! order on shutdown.

mod access;
mod ctrl;
mod downstream;
mod upstream;

use std::sync::Arc;

use ssa_errors::SsaError;
use ssa_types::{Lid, NodeRole};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::channels::{CtrlChannel, CtrlMsg};
use crate::derived::DerivedDatabaseBuilder;
use crate::mad::{FabricDeviceEvents, ManagementDatagramChannel};
use crate::transport::StreamTransport;
use crate::{new_derived_db_map, new_published_db, PARENT_CHILD_STREAM_PORT};

pub use access::run_access;
pub use ctrl::run_ctrl;
pub use downstream::{run_downstream, AccessChannel, InMemorySource};
pub use upstream::{JoinState, UpstreamWorker, JOIN_RETRY_CAP, JOIN_RETRY_INITIAL};

/// Everything [`start_service`] needs to bring up one node's worker set.
pub struct ServiceConfig<T, M, E, B> {
    /// The byte-stream transport children and the parent are reached over.
    pub transport: Arc<T>,
    /// The management-datagram channel the join protocol and ctrl run over.
    pub mad: Arc<M>,
    /// The fabric-device event source ctrl polls.
    pub events: E,
    /// Computes per-consumer derived databases; required when `role`
    /// includes [`NodeRole::ACCESS`].
    pub derived_builder: Option<Arc<B>>,
    /// This node's own LID, used in the join protocol's `MemberRecord`.
    pub own_lid: Lid,
    /// The role bitmask controlling which optional workers start.
    pub role: NodeRole,
}

/// A running service: the spawned worker tasks plus the handles used to
/// shut them all down in reverse startup order.
pub struct ServiceHandle {
    exit_tx: CtrlChannel,
    access_exit_tx: Option<CtrlChannel>,
    upstream: JoinHandle<Result<(), SsaError>>,
    downstream: Option<JoinHandle<Result<(), SsaError>>>,
    access: Option<JoinHandle<Result<(), SsaError>>>,
    ctrl: JoinHandle<Result<(), SsaError>>,
}

impl ServiceHandle {
    /// Send `CTRL_EXIT` and join every worker task in the reverse order
    /// they were started: access, downstream, upstream, ctrl.
    pub async fn shutdown(mut self) -> Result<(), SsaError> {
        if let Some(mut access_exit_tx) = self.access_exit_tx.take() {
            access_exit_tx.send(&CtrlMsg::CtrlExit).await?;
        }
        if let Some(access) = self.access.take() {
            access.await.map_err(join_err)??;
        }
        self.exit_tx.send(&CtrlMsg::CtrlExit).await?;
        if let Some(downstream) = self.downstream.take() {
            downstream.await.map_err(join_err)??;
        }
        self.upstream.await.map_err(join_err)??;
        self.ctrl.await.map_err(join_err)??;
        Ok(())
    }
}

fn join_err(e: tokio::task::JoinError) -> SsaError {
    SsaError::ProtocolWarning(format!("worker task panicked: {e}"))
}

/// Waits for a `CtrlAck` on `ch`, discarding any other message that
/// arrives first (the original's start-up sequencing only ever sends the
/// ack at this point, but discarding keeps this gate robust to ordering
/// changes in the workers it waits on).
async fn await_ack(ch: &mut CtrlChannel) -> Result<(), SsaError> {
    loop {
        match ch.recv().await? {
            Some(CtrlMsg::CtrlAck) => return Ok(()),
            None => return Err(SsaError::PeerGone),
            Some(_) => {}
        }
    }
}

/// Starts ctrl, then upstream, then (if `role.runs_downstream()`)
/// downstream, then (if `role` contains `ACCESS`) access, each gated on
/// the previous worker's `CtrlAck` (§4.5).
pub async fn start_service<T, M, E, B>(
    config: ServiceConfig<T, M, E, B>,
) -> Result<ServiceHandle, SsaError>
where
    T: StreamTransport + 'static,
    M: ManagementDatagramChannel + 'static,
    E: FabricDeviceEvents + Send + 'static,
    B: DerivedDatabaseBuilder + 'static,
{
    let ServiceConfig {
        transport,
        mad,
        events,
        derived_builder,
        own_lid,
        role,
    } = config;

    let parent_db = new_published_db();
    let runs_downstream = role.runs_downstream();
    let runs_access = role.contains(NodeRole::ACCESS) && derived_builder.is_some();
    let derived_db = if runs_access {
        Some(new_derived_db_map())
    } else {
        None
    };

    // Start upstream, gated on its ack.
    let (mut ctrl_upstream_ack, ctrl_upstream_worker_end) =
        CtrlChannel::pair().map_err(SsaError::TransportError)?;
    let upstream_worker = UpstreamWorker::new(
        transport.clone(),
        mad.clone(),
        ctrl_upstream_worker_end,
        parent_db.clone(),
        own_lid,
    );
    let upstream = tokio::spawn(upstream_worker.run());
    await_ack(&mut ctrl_upstream_ack).await?;

    // sock_accessdown: wired up before downstream starts, so its accept
    // loop can report CONN_DONE from the first connection onward. One end
    // is shared across every connection task (hence the mutex), the other
    // is handed to the access worker below.
    let mut access_recv_end = None;
    let access_down_channel: Option<AccessChannel> = if runs_access {
        let (for_downstream, for_access) = CtrlChannel::pair().map_err(SsaError::TransportError)?;
        access_recv_end = Some(for_access);
        Some(Arc::new(Mutex::new(for_downstream)))
    } else {
        None
    };

    // Start downstream, gated on its ack, when this role serves children.
    let mut ctrl_downstream_for_ctrl = None;
    let mut downstream = None;
    if runs_downstream {
        let (mut ctrl_downstream_ack, ctrl_downstream_worker_end) =
            CtrlChannel::pair().map_err(SsaError::TransportError)?;
        let handle = tokio::spawn(run_downstream(
            transport.clone(),
            PARENT_CHILD_STREAM_PORT,
            ctrl_downstream_worker_end,
            parent_db.clone(),
            derived_db.clone(),
            access_down_channel.clone(),
        ));
        await_ack(&mut ctrl_downstream_ack).await?;
        ctrl_downstream_for_ctrl = Some(ctrl_downstream_ack);
        downstream = Some(handle);
    }

    // Start access, gated on its ack, when this role computes derived
    // databases. Reuses the access side of sock_accessdown created above.
    let mut access_exit_tx = None;
    let mut access = None;
    if runs_access {
        let builder = derived_builder.expect("runs_access implies a builder was supplied");
        let (mut access_ack, access_worker_ctrl_end) =
            CtrlChannel::pair().map_err(SsaError::TransportError)?;
        let access_recv_end = access_recv_end.expect("wired above when runs_access");
        let derived_db = derived_db.clone().expect("runs_access implies derived_db was created");
        let handle = tokio::spawn(run_access(
            builder,
            access_worker_ctrl_end,
            parent_db.clone(),
            derived_db,
            access_recv_end,
        ));
        await_ack(&mut access_ack).await?;
        access_exit_tx = Some(access_ack);
        access = Some(handle);
    }

    let (exit_tx, exit_rx) = CtrlChannel::pair().map_err(SsaError::TransportError)?;
    let ctrl_handle = tokio::spawn(run_ctrl(
        events,
        mad,
        exit_rx,
        ctrl_upstream_ack,
        ctrl_downstream_for_ctrl,
        None,
    ));

    Ok(ServiceHandle {
        exit_tx,
        access_exit_tx,
        upstream,
        downstream,
        access,
        ctrl: ctrl_handle,
    })
}
