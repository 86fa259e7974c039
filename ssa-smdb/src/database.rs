//! The immutable, versioned subnet-management database (SMDB): the bundle
//! of tables a distribution node receives from its parent, transports
//! verbatim, and serves routing/lookup queries against.

use ssa_types::Epoch;

use crate::records::{
    GuidToLidRecord, IpExtension, LftBlockRecord, LftTopRecord, LinkRecord, NodeRecord,
    PortRecord, SubnetOptsRecord,
};

/// An immutable, versioned bundle of subnet-management tables.
///
/// Equivalent to `ssa_db_smdb_init`'s allocation plus the per-table
/// `smdb_*_init` population steps in the original, collapsed into plain
/// owned `Vec`s since the Rust in-memory form has no need for the
/// original's flat record-size/field-count side arrays (field layout lives
/// in [`crate::field_layout`] instead, derived, not stored, from the record
/// types themselves).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Database {
    /// Monotonic version of this snapshot.
    pub epoch: Epoch,
    /// Subnet-wide options (zero or one record: I1 counts it as a DATA
    /// table entry regardless of whether it is populated).
    pub subnet_opts: Vec<SubnetOptsRecord>,
    /// GUID → LID mapping, one entry per port in the fabric.
    pub guid_to_lid: Vec<GuidToLidRecord>,
    /// Node identity, one entry per node.
    pub node: Vec<NodeRecord>,
    /// Physical links, one entry per link.
    pub link: Vec<LinkRecord>,
    /// Port attributes, one entry per port.
    pub port: Vec<PortRecord>,
    /// Partition-key table. Variable-size: callers slice it using the
    /// `pkey_tbl_offset`/`pkey_tbl_size` fields on the owning [`PortRecord`].
    pub pkey: Vec<u8>,
    /// Per-switch LFT top, one entry per switch.
    pub lft_top: Vec<LftTopRecord>,
    /// LFT blocks of 64 entries, one entry per (switch, block).
    pub lft_block: Vec<LftBlockRecord>,
    /// Optional IP-address extension tables.
    pub ip_ext: Option<IpExtension>,
}

impl Database {
    /// Start a fresh, empty database at the given epoch.
    pub fn new(epoch: Epoch) -> Self {
        Database {
            epoch,
            ..Default::default()
        }
    }

    /// Number of DATA-type table entries this database carries (I1): the
    /// eight core tables plus the three extension tables when present.
    pub fn data_table_count(&self) -> usize {
        8 + if self.ip_ext.is_some() { 3 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_table_count_without_extension() {
        let db = Database::new(Epoch(1));
        assert_eq!(db.data_table_count(), 8);
    }

    #[test]
    fn data_table_count_with_extension() {
        let mut db = Database::new(Epoch(1));
        db.ip_ext = Some(IpExtension::default());
        assert_eq!(db.data_table_count(), 11);
    }
}
