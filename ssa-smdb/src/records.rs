//! Fixed-shape records carried by each table in a subnet-management
//! database. Field layouts mirror the wire form byte-for-byte; these types
//! are the already-decoded in-memory shape the index and routing code work
//! against.

use ssa_types::{Guid, Lid, NodeType};

/// Subnet-wide options. At most one record per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetOptsRecord {
    /// Bitmask of which fields in this record changed since the last
    /// report; carried verbatim, not interpreted here.
    pub change_mask: u64,
    /// The subnet prefix shared by every GID on this fabric.
    pub subnet_prefix: u64,
    /// The subnet manager's current state.
    pub sm_state: u8,
    /// LID mask control in effect subnet-wide.
    pub lmc: u8,
    /// Subnet timeout exponent, as carried on the wire.
    pub subnet_timeout: u8,
    /// Whether both pkey tables are allowed to be in use at once.
    pub allow_both_pkeys: u8,
}

/// Maps a port's 64-bit GUID to its assigned LID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidToLidRecord {
    /// The port's fabric-wide identity.
    pub guid: Guid,
    /// The port's fabric-local address.
    pub lid: Lid,
    /// LID mask control; determines how many LIDs this port consumes.
    pub lmc: u8,
    /// Whether this port belongs to a switch rather than a host adaptor.
    pub is_switch: bool,
}

/// Node identity, one record per node in the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// The node's fabric-wide identity.
    pub node_guid: Guid,
    /// Whether switch port 0 is enhanced (supports per-port LID routing).
    pub is_enhanced_sp0: bool,
    /// Channel adaptor, switch, or router.
    pub node_type: NodeType,
    /// Free-text node description, as advertised by the node itself.
    pub description: String,
}

/// One physical link between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    /// LID of the link's local endpoint.
    pub from_lid: Lid,
    /// LID of the link's remote endpoint.
    pub to_lid: Lid,
    /// Port number of the local endpoint (0 for host adaptors).
    pub from_port_num: u8,
    /// Port number of the remote endpoint.
    pub to_port_num: u8,
}

/// Bit carried in [`PortRecord::rate`] marking the owning node as a switch.
pub const PORT_RATE_IS_SWITCH_MASK: u8 = 0b1000_0000;
/// Bit carried in [`PortRecord::rate`] marking FDR10 support.
pub const PORT_RATE_FDR10_MASK: u8 = 0b0100_0000;

/// Port attributes, one record per port in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRecord {
    /// Byte offset of this port's partition-key slice within the pkey blob.
    pub pkey_tbl_offset: u64,
    /// Byte length of this port's partition-key slice.
    pub pkey_tbl_size: u16,
    /// The port's fabric-local address.
    pub port_lid: Lid,
    /// Port number within its owning node (0 for host adaptors).
    pub port_num: u8,
    /// Maximum transfer unit this port supports.
    pub mtu_cap: u8,
    /// Link rate, with [`PORT_RATE_IS_SWITCH_MASK`] / [`PORT_RATE_FDR10_MASK`]
    /// packed into the high bits the way the wire layout does.
    pub rate: u8,
    /// Per-VL arbitration enforcement flags.
    pub vl_enforce: u8,
}

impl PortRecord {
    /// Whether the owning node is a switch, per the packed rate byte.
    pub fn is_switch(&self) -> bool {
        self.rate & PORT_RATE_IS_SWITCH_MASK != 0
    }
}

/// A switch's highest valid destination LID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LftTopRecord {
    /// The switch's own LID.
    pub lid: Lid,
    /// Highest LID this switch can forward to.
    pub lft_top: Lid,
}

/// One 64-entry block of a switch's linear forwarding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LftBlockRecord {
    /// The switch's own LID.
    pub lid: Lid,
    /// Which block of 64 this record covers (`dest_lid >> 6`).
    pub block_num: u16,
    /// Outbound port number for each of the 64 LIDs in this block.
    pub block: [u8; 64],
}

/// Optional IPv4 address extension record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Record {
    /// LID of the port this address belongs to.
    pub lid: Lid,
    /// The address itself.
    pub addr: [u8; 4],
}

/// Optional IPv6 address extension record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Record {
    /// LID of the port this address belongs to.
    pub lid: Lid,
    /// The address itself.
    pub addr: [u8; 16],
}

/// Optional hostname extension record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    /// LID of the port this hostname belongs to.
    pub lid: Lid,
    /// The advertised hostname.
    pub name: String,
}

/// The optional IP-address extension block (`smdb_attach_ipdb` in the
/// original), spliced onto the core table set when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpExtension {
    /// IPv4 addresses by port.
    pub ipv4: Vec<Ipv4Record>,
    /// IPv6 addresses by port.
    pub ipv6: Vec<Ipv6Record>,
    /// Hostnames by port.
    pub name: Vec<NameRecord>,
}
