//! The inter-worker message bus: a single sum type over every message that
//! crosses a worker socketpair, and a length-delimited, `bincode`-encoded
//! channel carrying it.
//!
//! Grounded in §4.5's socketpair topology and message-type list; realized
//! with `tokio::net::UnixStream::pair()` plus `tokio_util`'s length-delimited
//! codec rather than the original's raw `AF_UNIX` socketpair and
//! hand-rolled length prefix, since the crate already depends on
//! `tokio-util` for the streaming-protocol framing in `ssa-wire`.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use ssa_errors::SsaError;
use tokio::io;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::mad::Mad;

/// A fabric port transitioning into or out of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevEvent {
    /// The port came up and is ready to join.
    PortActive,
    /// The port reported an error.
    PortErr,
    /// A client on this port re-registered with the management-datagram
    /// subsystem.
    ClientReregister,
}

/// Carried by `CONN_DONE`: a peer connection finished its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnDone {
    /// The peer's fabric-wide address.
    pub peer_gid: [u8; 16],
}

/// Carried by `DB_UPDATE`: a newly published database is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbUpdate {
    /// Epoch of the published database.
    pub epoch: u64,
    /// Identifies which connection slot this update targets, when the
    /// update is a per-consumer derived database rather than the parent
    /// database broadcast to every connection.
    pub target: Option<u64>,
}

/// Every message that can cross a worker-to-worker socketpair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CtrlMsg {
    /// A worker acknowledging that it has finished starting up.
    CtrlAck,
    /// Instructs a worker to drain and return from its event loop.
    CtrlExit,
    /// A fabric-port lifecycle event, ctrl -> upstream/downstream.
    CtrlDevEvent(DevEvent),
    /// An inbound management datagram on the node-to-node class.
    CtrlMad(Vec<u8>),
    /// An inbound management datagram on the subnet-administrator class.
    SaMad(Vec<u8>),
    /// ctrl -> upstream: the solicited InfoRecord naming this port's parent.
    /// Carries the full datagram so upstream never needs to call
    /// `ManagementDatagramChannel::recv` itself, which would otherwise race
    /// ctrl's own `recv` on the same shared channel.
    ParentInfo(Mad),
    /// A peer connection finished its handshake.
    ConnDone(ConnDone),
    /// ctrl -> downstream: begin accepting inbound connections.
    Listen,
    /// A newly published database is available downstream.
    DbUpdate(DbUpdate),
}

/// One end of a worker-to-worker socketpair, carrying length-delimited,
/// `bincode`-encoded [`CtrlMsg`] frames.
pub struct CtrlChannel {
    framed: Framed<UnixStream, LengthDelimitedCodec>,
}

impl CtrlChannel {
    /// Wrap one end of an already-connected `UnixStream`.
    pub fn new(stream: UnixStream) -> Self {
        CtrlChannel {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Create a connected pair of channels, the Rust equivalent of the
    /// original's `socketpair(AF_UNIX, SOCK_STREAM, 0, fds)`.
    pub fn pair() -> io::Result<(CtrlChannel, CtrlChannel)> {
        let (a, b) = UnixStream::pair()?;
        Ok((CtrlChannel::new(a), CtrlChannel::new(b)))
    }

    /// Send one message.
    pub async fn send(&mut self, msg: &CtrlMsg) -> Result<(), SsaError> {
        let encoded =
            bincode::serialize(msg).map_err(|e| SsaError::FramingError(e.to_string()))?;
        self.framed
            .send(Bytes::from(encoded))
            .await
            .map_err(SsaError::TransportError)
    }

    /// Receive the next message, or `None` if the peer closed the channel.
    pub async fn recv(&mut self) -> Result<Option<CtrlMsg>, SsaError> {
        match self.framed.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(SsaError::TransportError(e)),
            Some(Ok(bytes)) => {
                let msg = bincode::deserialize(&bytes)
                    .map_err(|e| SsaError::FramingError(e.to_string()))?;
                Ok(Some(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_message() {
        let (mut a, mut b) = CtrlChannel::pair().unwrap();
        a.send(&CtrlMsg::CtrlAck).await.unwrap();
        let got = b.recv().await.unwrap().unwrap();
        assert!(matches!(got, CtrlMsg::CtrlAck));
    }

    #[tokio::test]
    async fn recv_returns_none_on_close() {
        let (a, mut b) = CtrlChannel::pair().unwrap();
        drop(a);
        assert!(b.recv().await.unwrap().is_none());
    }
}
