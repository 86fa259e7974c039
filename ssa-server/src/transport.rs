//! The byte-stream transport boundary (§6): a reliable, connection-oriented,
//! non-blocking stream addressable by (fabric GID, port). The production
//! collaborator is an RDMA-capable socket API (`rsocket`); this crate only
//! needs the same shape tokio's TCP stack already provides, so the default
//! implementation is a thin wrapper over it.

use async_trait::async_trait;
use ssa_errors::SsaError;
use ssa_types::Gid;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// A reliable, connection-oriented byte stream, addressable by fabric GID
/// and a well-known port. `ssa-protocol`'s client/server drivers run
/// directly on top of any `T: AsyncRead + AsyncWrite + Unpin` this trait
/// hands back.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// The connected/accepted stream type this transport produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connect to a peer at the given address and well-known port.
    async fn connect(&self, peer: Gid, port: u16) -> Result<Self::Stream, SsaError>;

    /// Start listening on the given well-known port.
    async fn listen(&self, port: u16) -> Result<Self::Listener, SsaError>;

    /// The listening-socket type this transport produces.
    type Listener: Send + Sync;

    /// Accept the next inbound connection, returning the stream and the
    /// peer's fabric address.
    async fn accept(&self, listener: &Self::Listener) -> Result<(Self::Stream, Gid), SsaError>;
}

/// A `StreamTransport` backed by ordinary TCP, standing in for the
/// RDMA-capable socket API the original targets: the abstraction boundary
/// (non-blocking, connection-oriented byte stream keyed by address+port) is
/// identical, only the concrete medium differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

#[async_trait]
impl StreamTransport for TcpTransport {
    type Stream = TcpStream;
    type Listener = TcpListener;

    async fn connect(&self, peer: Gid, port: u16) -> Result<TcpStream, SsaError> {
        let addr = gid_to_socket_addr(peer, port);
        TcpStream::connect(addr).await.map_err(SsaError::TransportError)
    }

    async fn listen(&self, port: u16) -> Result<TcpListener, SsaError> {
        TcpListener::bind(("::", port))
            .await
            .map_err(SsaError::TransportError)
    }

    async fn accept(&self, listener: &TcpListener) -> Result<(TcpStream, Gid), SsaError> {
        let (stream, addr) = listener.accept().await.map_err(SsaError::TransportError)?;
        let gid = match addr.ip() {
            std::net::IpAddr::V6(v6) => Gid(v6.octets()),
            std::net::IpAddr::V4(v4) => {
                let mut octets = [0u8; 16];
                octets[12..].copy_from_slice(&v4.octets());
                Gid(octets)
            }
        };
        Ok((stream, gid))
    }
}

fn gid_to_socket_addr(gid: Gid, port: u16) -> (std::net::Ipv6Addr, u16) {
    (std::net::Ipv6Addr::from(gid.0), port)
}
