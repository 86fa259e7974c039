//! The access worker (§4.6, S5): present only on access-role nodes.
//! Computes a per-consumer derived database once a child finishes its
//! connection handshake and publishes it, keyed by that consumer's GID, so
//! downstream serves each consumer its own derived database in place of
//! the parent database.
//!
//! Grounded in `ssa_access_svc_run`'s connection-done callback, which
//! triggers `ssa_access_db_build` against the locally-loaded parent
//! database; [`crate::derived::DerivedDatabaseBuilder`] stands in for the
//! original's path-record computation, whose algorithm is out of scope
//! here.

use std::sync::Arc;

use ssa_errors::SsaError;
use ssa_types::Gid;
use tracing::warn;

use crate::channels::{CtrlChannel, CtrlMsg, DbUpdate};
use crate::derived::{ConsumerIdentity, DerivedDatabaseBuilder};
use crate::{DerivedDbMap, PublishedDb};

/// Runs the access worker until `CTRL_EXIT`: for each `CONN_DONE` arriving
/// on `downstream_ch`, builds a derived database from whatever parent
/// database is currently published and inserts it into `derived_db` under
/// that connection's consumer GID, leaving every other consumer's entry
/// untouched (S5).
pub async fn run_access<B>(
    builder: Arc<B>,
    mut ctrl_ch: CtrlChannel,
    parent_db: PublishedDb,
    derived_db: DerivedDbMap,
    mut downstream_ch: CtrlChannel,
) -> Result<(), SsaError>
where
    B: DerivedDatabaseBuilder,
{
    ctrl_ch.send(&CtrlMsg::CtrlAck).await?;

    loop {
        tokio::select! {
            biased;

            msg = ctrl_ch.recv() => {
                match msg? {
                    None | Some(CtrlMsg::CtrlExit) => return Ok(()),
                    Some(_) => {}
                }
            }

            msg = downstream_ch.recv() => {
                match msg? {
                    None => return Ok(()),
                    Some(CtrlMsg::ConnDone(done)) => {
                        let parent = parent_db.read().await.clone();
                        let Some(parent) = parent else {
                            warn!("connection done but no parent database published yet");
                            continue;
                        };
                        let gid = Gid(done.peer_gid);
                        let consumer = ConsumerIdentity { gid };
                        let derived = builder.build(&parent, consumer)?;
                        let epoch = derived.epoch.0;
                        derived_db.write().await.insert(gid, Arc::new(derived));
                        downstream_ch
                            .send(&CtrlMsg::DbUpdate(DbUpdate { epoch, target: None }))
                            .await?;
                    }
                    Some(_) => {}
                }
            }
        }
    }
}
