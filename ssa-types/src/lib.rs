//! Primitive fabric-address and identity types shared across the workspace:
//! LIDs, GUIDs, GIDs, node roles and table identifiers.
#![deny(missing_docs, rustdoc::missing_crate_level_docs)]

use std::fmt;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// A 16-bit fabric-local address. Zero is never a valid destination or
/// source; callers are expected to reject it at the entry point (see
/// [`Lid::is_valid`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into, Serialize, Deserialize)]
pub struct Lid(pub u16);

impl Lid {
    /// `true` unless this LID is the reserved zero value.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The LFT block this LID's forwarding entry lives in (`lid >> 6`).
    pub fn block_number(self) -> u16 {
        self.0 >> 6
    }

    /// The slot within that block (`lid mod 64`).
    pub fn slot(self) -> u16 {
        self.0 % 64
    }
}

/// A 64-bit fabric-wide port identity, carried in the GUID-to-LID table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct Guid(pub u64);

/// A 128-bit fabric-wide address, analogous to an IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From)]
pub struct Gid(pub [u8; 16]);

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chunk) in self.0.chunks(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}{:02x}", chunk[0], chunk[1])?;
        }
        Ok(())
    }
}

/// Monotonic database version. `Epoch::INVALID` marks an index that has
/// never been built or has been explicitly destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct Epoch(pub u64);

impl Epoch {
    /// Sentinel epoch for an index with no backing database yet.
    pub const INVALID: Epoch = Epoch(0);
}

bitflags::bitflags! {
    /// The roles a node may carry, combinable in any way except that a pure
    /// [`NodeRole::CONSUMER`] node does not run a downstream worker.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeRole: u8 {
        /// Runs the ctrl/upstream pair only, with no children of its own.
        const CONSUMER = 0b0001;
        /// Accepts children and forwards the parent database unchanged.
        const DISTRIBUTION = 0b0010;
        /// Computes and serves per-consumer derived databases.
        const ACCESS = 0b0100;
        /// Loads a parent database locally rather than pulling one upstream.
        const CORE = 0b1000;
    }
}

impl NodeRole {
    /// Whether this role combination runs a downstream worker at all
    /// (anything other than a bare consumer).
    pub fn runs_downstream(self) -> bool {
        self != NodeRole::CONSUMER
    }
}

/// A node's port/link partner type, as recorded in the node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A channel adaptor (host-side port).
    Ca,
    /// A fabric switch.
    Switch,
    /// A router between fabrics.
    Router,
}

/// Identifiers for the fixed set of tables a subnet-management database
/// carries, plus the optional IP-address extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TableId {
    /// Subnet-wide options, one record.
    SubnetOpts = 0,
    /// GUID → LID mapping, one record per port.
    GuidToLid = 1,
    /// Node identity and type, one record per node.
    Node = 2,
    /// Physical link endpoints, one record per link.
    Link = 3,
    /// Port attributes, one record per port.
    Port = 4,
    /// Partition-key table, variable-size.
    Pkey = 5,
    /// Per-switch LFT top, one record per switch.
    LftTop = 6,
    /// LFT blocks of 64 entries, one record per (switch, block).
    LftBlock = 7,
    /// Optional IPv4 address extension.
    Ipv4 = 8,
    /// Optional IPv6 address extension.
    Ipv6 = 9,
    /// Optional hostname extension.
    Name = 10,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lid_block_and_slot_split() {
        let lid = Lid(130);
        assert_eq!(lid.block_number(), 2);
        assert_eq!(lid.slot(), 2);
    }

    #[test]
    fn zero_lid_is_invalid() {
        assert!(!Lid(0).is_valid());
        assert!(Lid(1).is_valid());
    }

    #[test]
    fn consumer_role_has_no_downstream() {
        assert!(!NodeRole::CONSUMER.runs_downstream());
        assert!(NodeRole::DISTRIBUTION.runs_downstream());
        assert!((NodeRole::CONSUMER | NodeRole::ACCESS).runs_downstream());
    }
}
