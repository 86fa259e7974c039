//! The error type shared by every crate in the distribution-node workspace.
#![deny(missing_docs, rustdoc::missing_crate_level_docs)]

use std::io;

use thiserror::Error;

/// Every error a distribution node can encounter, from wire parsing up through
/// worker-loop transport failures.
///
/// This is the single error type threaded through the workspace, the way a
/// service built on top of a streaming protocol and a local database needs
/// exactly one currency for `?` to convert into at every boundary.
#[derive(Debug, Error)]
pub enum SsaError {
    /// A message header failed to validate: bad version, bad class, or an
    /// opcode outside the enumerated set.
    #[error("framing error: {0}")]
    FramingError(String),

    /// The peer closed its end of a connection (EOF on a `recv`, or a reset).
    #[error("peer gone")]
    PeerGone,

    /// An index build step found a backing table with zero records when at
    /// least one was required (for example, an empty GUID-to-LID table).
    #[error("table {0} is empty")]
    EmptyTable(&'static str),

    /// Forwarding-table lookup failed: the destination LID is out of range,
    /// or the block/slot it maps to has no entry.
    #[error("no route to LID {0}")]
    RouteError(u16),

    /// A lookup (by GUID, by LID, by port) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying byte-stream transport failed.
    #[error("transport error: {0}")]
    TransportError(#[from] io::Error),

    /// A condition worth logging but not fatal to the connection or worker
    /// (for example, a correlator-id mismatch on a response).
    #[error("protocol warning: {0}")]
    ProtocolWarning(String),
}

/// Convenience alias used throughout the workspace.
pub type SsaResult<T> = Result<T, SsaError>;
