//! The upstream worker (§4.4 join protocol, §4.3 client side): owns the one
//! outbound connection to the parent, drives the fabric-level join state
//! machine, and, once joined, pulls the parent database and publishes it
//! onward.
//!
//! Grounded in `ssa_upstream_update_conn`'s phase switch and
//! `ssa_upstream_initiate_conn`'s join sequence; the join retry backoff
//! (start 1s, double on failure, cap 120s) is `ssa.c`'s literal constants.

use std::sync::Arc;
use std::time::Duration;

use ssa_errors::SsaError;
use ssa_types::{Gid, Lid};
use tracing::{info, warn};

use crate::channels::{CtrlChannel, CtrlMsg, DbUpdate, DevEvent};
use crate::mad::{Mad, MadMethod, ManagementDatagramChannel};
use crate::transport::StreamTransport;
use crate::{PublishedDb, PARENT_CHILD_STREAM_PORT};

/// Fabric-level join state, mirroring the original's `ssa_svc_state` for
/// the subset this worker drives through directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// No join attempt in progress.
    Idle,
    /// A `SET MemberRecord` is in flight.
    Joining,
    /// Joined the fabric but no parent path record has arrived yet.
    Orphan,
    /// A parent path record has been received and acknowledged.
    HaveParent,
    /// A stream connection attempt to the parent is in flight.
    Connecting,
    /// The stream connection to the parent is established.
    Connected,
}

/// The initial retry timeout for the fabric-level join (§5).
pub const JOIN_RETRY_INITIAL: Duration = Duration::from_secs(1);
/// The retry timeout cap for the fabric-level join (§5: "120x the default").
pub const JOIN_RETRY_CAP: Duration = Duration::from_secs(120);

fn member_record_set(own_lid: Lid) -> Mad {
    Mad {
        method: MadMethod::Set,
        dlid: own_lid,
        sl: 0,
        qkey: 0,
        trans_id: 0,
        payload: own_lid.0.to_be_bytes().to_vec(),
    }
}

fn info_record_ack(info: &Mad) -> Mad {
    Mad {
        method: MadMethod::GetResp,
        dlid: info.dlid,
        sl: info.sl,
        qkey: info.qkey,
        trans_id: info.trans_id,
        payload: Vec::new(),
    }
}

fn parent_gid_from_info(info: &Mad) -> Option<Gid> {
    let bytes: [u8; 16] = info.payload.get(..16)?.try_into().ok()?;
    Some(Gid(bytes))
}

/// Drives the upstream worker's event loop: the fabric-level join state
/// machine followed by the streaming protocol client.
pub struct UpstreamWorker<T, M> {
    transport: Arc<T>,
    mad: Arc<M>,
    ctrl_ch: CtrlChannel,
    /// sock_accessup: present on access-role nodes, carries the parent
    /// database onward to the access worker.
    pub access_ch: Option<CtrlChannel>,
    /// sock_updown: present on distribution-role nodes with no access
    /// stage, forwards the parent database directly to downstream.
    pub downstream_ch: Option<CtrlChannel>,
    /// The process-wide "currently published database" pointer (Design
    /// Notes: global published DB pointers), shared with whichever worker
    /// serves this node's children.
    published: PublishedDb,
    own_lid: Lid,
    state: JoinState,
    parent_gid: Option<Gid>,
}

impl<T, M> UpstreamWorker<T, M>
where
    T: StreamTransport,
    M: ManagementDatagramChannel,
{
    /// Construct a new upstream worker bound to `own_lid`.
    pub fn new(
        transport: Arc<T>,
        mad: Arc<M>,
        ctrl_ch: CtrlChannel,
        published: PublishedDb,
        own_lid: Lid,
    ) -> Self {
        UpstreamWorker {
            transport,
            mad,
            ctrl_ch,
            access_ch: None,
            downstream_ch: None,
            published,
            own_lid,
            state: JoinState::Idle,
            parent_gid: None,
        }
    }

    /// Current join state, exposed for tests and observability.
    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Run until `CTRL_EXIT`.
    pub async fn run(mut self) -> Result<(), SsaError> {
        self.ctrl_ch.send(&CtrlMsg::CtrlAck).await?;
        loop {
            match self.ctrl_ch.recv().await? {
                None | Some(CtrlMsg::CtrlExit) => return Ok(()),
                Some(CtrlMsg::CtrlDevEvent(DevEvent::PortActive)) => {
                    self.join().await?;
                }
                Some(CtrlMsg::ParentInfo(info)) => {
                    if self.state == JoinState::Orphan {
                        self.have_parent(info).await?;
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// `IDLE -> JOINING -> ORPHAN`, per §4.4. The transition out of
    /// `ORPHAN` happens in [`Self::have_parent`], driven by ctrl forwarding
    /// the solicited InfoRecord — this worker never calls
    /// `ManagementDatagramChannel::recv` itself, since ctrl is the shared
    /// channel's sole reader.
    async fn join(&mut self) -> Result<(), SsaError> {
        self.state = JoinState::Joining;
        let mut timeout = JOIN_RETRY_INITIAL;
        loop {
            match self
                .mad
                .send_request(member_record_set(self.own_lid), timeout)
                .await
            {
                Ok(_ack) => break,
                Err(e) => {
                    warn!(?e, ?timeout, "join SET failed, retrying with doubled timeout");
                    timeout = (timeout * 2).min(JOIN_RETRY_CAP);
                }
            }
        }
        self.state = JoinState::Orphan;
        Ok(())
    }

    /// `ORPHAN -> HAVE_PARENT`: acks the InfoRecord ctrl forwarded and
    /// immediately starts the streaming pull from the new parent.
    async fn have_parent(&mut self, info: Mad) -> Result<(), SsaError> {
        self.parent_gid = parent_gid_from_info(&info);
        self.state = JoinState::HaveParent;
        self.mad
            .send_request(info_record_ack(&info), JOIN_RETRY_INITIAL)
            .await?;
        info!(lid = ?self.own_lid, "joined fabric, parent path record received");
        self.pull_and_publish().await
    }

    /// Step 1-4 of §4.3's client sequence, followed by publication of the
    /// resulting dataset to whichever downstream stage this node's role
    /// wires up.
    async fn pull_and_publish(&mut self) -> Result<(), SsaError> {
        let parent_gid = self
            .parent_gid
            .ok_or_else(|| SsaError::ProtocolWarning("pull requested with no parent".into()))?;
        self.state = JoinState::Connecting;
        let stream = self
            .transport
            .connect(parent_gid, PARENT_CHILD_STREAM_PORT)
            .await?;
        self.state = JoinState::Connected;

        let mut client = ssa_protocol::UpstreamClient::new(stream);
        let db_def = client.query_db_def().await?;
        let _tbl_def = client.query_tbl_def().await?;
        let _tbl_def_dataset = client.query_tbl_def_dataset().await?;
        let _field_defs = client.query_field_def_datasets().await?;
        let data = client.query_data_datasets().await?;

        let (epoch, _table_count) = ssa_smdb::wire::decode_db_def(db_def)?;
        let db = ssa_smdb::wire::decode_data_datasets(ssa_types::Epoch(epoch), &data)?;
        *self.published.write().await = Some(Arc::new(db));

        // I4: rebuilding from this publication is the receiving worker's
        // job, triggered by the epoch carried below, not this worker's.
        let update = DbUpdate { epoch, target: None };
        if let Some(access_ch) = self.access_ch.as_mut() {
            access_ch.send(&CtrlMsg::DbUpdate(update)).await?;
        }
        if let Some(downstream_ch) = self.downstream_ch.as_mut() {
            downstream_ch.send(&CtrlMsg::DbUpdate(update)).await?;
        }

        self.state = JoinState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_retry_backoff_doubles_and_caps() {
        let mut timeout = JOIN_RETRY_INITIAL;
        for _ in 0..10 {
            timeout = (timeout * 2).min(JOIN_RETRY_CAP);
        }
        assert_eq!(timeout, JOIN_RETRY_CAP);
    }
}
