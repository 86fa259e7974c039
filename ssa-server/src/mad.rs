//! The management-datagram transport boundary (§6): a request/response
//! channel addressable by (port LID, SL, QKEY), used by the join protocol
//! and the ctrl worker. Also the fabric-device event source ctrl's poll
//! loop drains.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ssa_errors::SsaError;
use ssa_types::Lid;

use crate::channels::DevEvent;

/// Method codes for the node-to-node and subnet-administrator management
/// classes used by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MadMethod {
    /// Register or refresh a membership record.
    Set,
    /// Request a record (e.g. a PathRecord).
    Get,
    /// A solicited response to an earlier `Get`/`Set`.
    GetResp,
}

/// One management datagram, addressed and routed by the ctrl worker before
/// the owning worker ever sees it. Carried whole across the ctrl/upstream
/// socketpair (rather than re-fetched with a second `recv` on the shared
/// MAD channel) so only ctrl ever calls [`ManagementDatagramChannel::recv`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mad {
    /// The method this datagram carries.
    pub method: MadMethod,
    /// Destination LID, service level and queue key identifying the target
    /// agent.
    pub dlid: Lid,
    /// Service level.
    pub sl: u8,
    /// Queue key.
    pub qkey: u32,
    /// Transaction id; the ctrl worker's upper 16 bits encode the owning
    /// service index within the port (§4.6).
    pub trans_id: u64,
    /// Opaque attribute payload (e.g. an encoded MemberRecord/InfoRecord).
    pub payload: Vec<u8>,
}

/// A request/response channel over management datagrams.
#[async_trait]
pub trait ManagementDatagramChannel: Send + Sync {
    /// Send a datagram and wait for its solicited response, or time out.
    async fn send_request(&self, mad: Mad, timeout: std::time::Duration) -> Result<Mad, SsaError>;

    /// Receive the next unsolicited or routed-in datagram.
    async fn recv(&self) -> Result<Mad, SsaError>;
}

/// The fabric-device event source ctrl's poll loop drains: port
/// active/err/reregister notifications.
#[async_trait]
pub trait FabricDeviceEvents: Send + Sync {
    /// Block until the next device event.
    async fn next_event(&self) -> Result<(Lid, DevEvent), SsaError>;
}
