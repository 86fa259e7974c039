//! The ctrl worker (§4.6): owns fabric-port state, drains device and
//! management-datagram events, and dispatches the lifecycle messages that
//! drive the rest of the service.
//!
//! Grounded in `ssa_ctrl_run`'s poll loop over (process-wide control
//! socketpair, device event fds, per-port MAD fds), re-expressed as a
//! biased `tokio::select!` over the same three sources in the same
//! priority order — control socket first, so an exit request is never
//! starved by a steady stream of device/MAD traffic.

use std::sync::Arc;

use ssa_errors::SsaError;
use tracing::debug;

use crate::channels::{CtrlChannel, CtrlMsg, DevEvent};
use crate::mad::{FabricDeviceEvents, MadMethod, ManagementDatagramChannel};

/// Runs the ctrl worker until it receives `CTRL_EXIT`, at which point it
/// relays the exit to every downstream worker it owns and returns.
pub async fn run_ctrl<E, M>(
    events: E,
    mad: Arc<M>,
    mut exit_rx: CtrlChannel,
    mut upstream_ch: CtrlChannel,
    mut downstream_ch: Option<CtrlChannel>,
    mut access_ch: Option<CtrlChannel>,
) -> Result<(), SsaError>
where
    E: FabricDeviceEvents,
    M: ManagementDatagramChannel,
{
    upstream_ch.send(&CtrlMsg::CtrlAck).await?;

    loop {
        tokio::select! {
            biased;

            msg = exit_rx.recv() => {
                match msg? {
                    None | Some(CtrlMsg::CtrlExit) => {
                        upstream_ch.send(&CtrlMsg::CtrlExit).await?;
                        if let Some(ds) = downstream_ch.as_mut() {
                            ds.send(&CtrlMsg::CtrlExit).await?;
                        }
                        if let Some(ac) = access_ch.as_mut() {
                            ac.send(&CtrlMsg::CtrlExit).await?;
                        }
                        return Ok(());
                    }
                    Some(_) => {}
                }
            }

            event = events.next_event() => {
                let (lid, dev_event) = event?;
                debug!(?lid, ?dev_event, "fabric device event");
                upstream_ch.send(&CtrlMsg::CtrlDevEvent(dev_event)).await?;
                if let Some(ds) = downstream_ch.as_mut() {
                    ds.send(&CtrlMsg::CtrlDevEvent(dev_event)).await?;
                }
            }

            datagram = mad.recv() => {
                let datagram = datagram?;
                if matches!(datagram.method, MadMethod::GetResp) {
                    // A solicited InfoRecord: forward it whole so upstream
                    // never has to call `mad.recv()` itself — this worker is
                    // the channel's sole reader. Servers should also start
                    // accepting children before any of them connect.
                    upstream_ch.send(&CtrlMsg::ParentInfo(datagram)).await?;
                    if let Some(ds) = downstream_ch.as_mut() {
                        ds.send(&CtrlMsg::Listen).await?;
                    }
                } else {
                    upstream_ch.send(&CtrlMsg::CtrlMad(datagram.payload)).await?;
                }
            }
        }
    }
}
