//! O(1) topology lookups built from a [`Database`], and the LID-routing
//! computation that depends on them.
//!
//! Grounded directly in `ssa_pr_build_indexes` and `find_destination_port`:
//! five flat, LID-indexed lookups built in a fixed order (is-switch, port,
//! lft-top, lft-block, link), each entry defaulting to a sentinel one past
//! the valid range of its backing table rather than an `Option`, so a stale
//! or missing lookup reads as "no route" instead of panicking.

use ssa_errors::SsaError;
use ssa_types::{Epoch, Guid, Lid};

use crate::database::Database;
use crate::records::{GuidToLidRecord, PortRecord};

/// Metric name recording an index rebuild (labeled `result=rebuilt|noop`).
pub const METRIC_INDEX_REBUILDS: &str = "ssa_index_rebuilds_total";
/// Metric name recording a forwarding-table lookup (labeled `result`).
pub const METRIC_ROUTE_LOOKUPS: &str = "ssa_route_lookups_total";

/// Per-switch lookup keyed by port number, growing lazily as records are
/// observed (mirrors the original's on-demand `malloc` of the per-switch
/// port/link/LFT-block arrays).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SwitchTable {
    entries: Vec<Option<usize>>,
}

impl SwitchTable {
    fn set(&mut self, key: usize, value: usize) {
        if self.entries.len() <= key {
            self.entries.resize(key + 1, None);
        }
        self.entries[key] = Some(value);
    }

    fn get(&self, key: usize) -> Option<usize> {
        self.entries.get(key).copied().flatten()
    }
}

/// The five-lookup routing index derived from a [`Database`].
///
/// All lookups are indexed by LID as `usize`; the index is sized to one
/// past the highest LID observed in the backing GUID-to-LID table, per
/// [`Lid`] being 16 bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingIndex {
    epoch: Epoch,
    is_switch: Vec<bool>,
    lft_top: Vec<Option<Lid>>,
    port_ca: Vec<Option<usize>>,
    port_switch: Vec<SwitchTable>,
    lft_block: Vec<SwitchTable>,
    link_ca: Vec<Option<usize>>,
    link_switch: Vec<SwitchTable>,
}

fn lid_space(db: &Database) -> usize {
    db.guid_to_lid
        .iter()
        .map(|r| r.lid.0 as usize)
        .max()
        .map(|m| m + 1)
        .unwrap_or(0)
}

impl RoutingIndex {
    /// The epoch this index was built from, or [`Epoch::INVALID`] if it has
    /// never been built.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Build a fresh index from `db`. Fails with `EmptyTable` if any table
    /// required by the five lookups (guid-to-lid, port, lft-top, lft-block,
    /// link) is empty, matching `build_is_switch_lookup` et al. returning an
    /// error on a zero-record table.
    pub fn build(db: &Database) -> Result<Self, SsaError> {
        if db.guid_to_lid.is_empty() {
            return Err(SsaError::EmptyTable("guid-to-lid"));
        }
        if db.port.is_empty() {
            return Err(SsaError::EmptyTable("port"));
        }
        if db.lft_top.is_empty() {
            return Err(SsaError::EmptyTable("lft-top"));
        }
        if db.lft_block.is_empty() {
            return Err(SsaError::EmptyTable("lft-block"));
        }
        if db.link.is_empty() {
            return Err(SsaError::EmptyTable("link"));
        }

        let space = lid_space(db);
        let mut index = RoutingIndex {
            epoch: db.epoch,
            is_switch: vec![false; space],
            lft_top: vec![None; space],
            port_ca: vec![None; space],
            port_switch: vec![SwitchTable::default(); space],
            lft_block: vec![SwitchTable::default(); space],
            link_ca: vec![None; space],
            link_switch: vec![SwitchTable::default(); space],
        };

        index.build_is_switch(db);
        index.build_port(db);
        index.build_lft_top(db);
        index.build_lft_block(db);
        index.build_link(db)?;

        Ok(index)
    }

    /// No-op when `self.epoch == db.epoch`; otherwise replaces `self` with a
    /// freshly built index (P6).
    pub fn rebuild(&mut self, db: &Database) -> Result<(), SsaError> {
        if self.epoch == db.epoch {
            metrics::counter!(METRIC_INDEX_REBUILDS, "result" => "noop").increment(1);
            return Ok(());
        }
        *self = Self::build(db)?;
        metrics::counter!(METRIC_INDEX_REBUILDS, "result" => "rebuilt").increment(1);
        Ok(())
    }

    fn build_is_switch(&mut self, db: &Database) {
        for rec in &db.guid_to_lid {
            self.is_switch[rec.lid.0 as usize] = rec.is_switch;
        }
    }

    fn build_port(&mut self, db: &Database) {
        for (i, rec) in db.port.iter().enumerate() {
            let lid = rec.port_lid.0 as usize;
            if rec.is_switch() {
                self.port_switch[lid].set(rec.port_num as usize, i);
            } else {
                self.port_ca[lid] = Some(i);
            }
        }
    }

    fn build_lft_top(&mut self, db: &Database) {
        for rec in &db.lft_top {
            self.lft_top[rec.lid.0 as usize] = Some(rec.lft_top);
        }
    }

    fn build_lft_block(&mut self, db: &Database) {
        for (i, rec) in db.lft_block.iter().enumerate() {
            self.lft_block[rec.lid.0 as usize].set(rec.block_num as usize, i);
        }
    }

    fn build_link(&mut self, db: &Database) -> Result<(), SsaError> {
        for link in &db.link {
            let from_idx = self.find_port_index(link.from_lid, link.from_port_num);
            let to_idx = self.find_port_index(link.to_lid, link.to_port_num);
            let (Some(from_idx), Some(to_idx)) = (from_idx, to_idx) else {
                return Err(SsaError::NotFound(format!(
                    "link endpoint for {:?}<->{:?}",
                    link.from_lid, link.to_lid
                )));
            };
            self.set_link(link.from_lid, link.from_port_num, to_idx);
            self.set_link(link.to_lid, link.to_port_num, from_idx);
        }
        Ok(())
    }

    fn set_link(&mut self, lid: Lid, port_num: u8, remote_port_idx: usize) {
        let lid = lid.0 as usize;
        if self.is_switch[lid] {
            self.link_switch[lid].set(port_num as usize, remote_port_idx);
        } else {
            self.link_ca[lid] = Some(remote_port_idx);
        }
    }

    fn find_port_index(&self, lid: Lid, port_num: u8) -> Option<usize> {
        let lid_idx = lid.0 as usize;
        if *self.is_switch.get(lid_idx)? {
            self.port_switch.get(lid_idx)?.get(port_num as usize)
        } else {
            *self.port_ca.get(lid_idx)?
        }
    }

    /// `lookup-port`: the record index of `(lid, port_num)` in the port
    /// table, or `NotFound`.
    pub fn lookup_port<'db>(
        &self,
        db: &'db Database,
        lid: Lid,
        port_num: u8,
    ) -> Result<&'db PortRecord, SsaError> {
        let idx = self
            .find_port_index(lid, port_num)
            .ok_or_else(|| SsaError::NotFound(format!("port at LID {lid}")))?;
        db.port
            .get(idx)
            .ok_or_else(|| SsaError::NotFound(format!("port at LID {lid}")))
    }

    /// `lookup-linked-port`: the record of the port at the *remote* end of
    /// the physical link from `(lid, port_num)`, or `NotFound`.
    pub fn lookup_linked_port<'db>(
        &self,
        db: &'db Database,
        lid: Lid,
        port_num: u8,
    ) -> Result<&'db PortRecord, SsaError> {
        let lid_idx = lid.0 as usize;
        let idx = if *self.is_switch.get(lid_idx).unwrap_or(&false) {
            self.link_switch
                .get(lid_idx)
                .and_then(|t| t.get(port_num as usize))
        } else {
            self.link_ca.get(lid_idx).copied().flatten()
        };
        let idx = idx.ok_or_else(|| SsaError::NotFound(format!("link at LID {lid}")))?;
        db.port
            .get(idx)
            .ok_or_else(|| SsaError::NotFound(format!("link at LID {lid}")))
    }

    /// `lookup-forwarding`: the routing computation fixed by the protocol —
    /// `block_number = dest_lid >> 6`, `slot = dest_lid mod 64` — checked
    /// against `lft-top(source)` and the block-lookup sentinel before
    /// indexing into the block's 64-entry table.
    pub fn lookup_forwarding(
        &self,
        db: &Database,
        source: Lid,
        dest: Lid,
    ) -> Result<u8, SsaError> {
        let result = self.lookup_forwarding_inner(db, source, dest);
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(METRIC_ROUTE_LOOKUPS, "result" => outcome).increment(1);
        result
    }

    fn lookup_forwarding_inner(
        &self,
        db: &Database,
        source: Lid,
        dest: Lid,
    ) -> Result<u8, SsaError> {
        let top = self
            .lft_top
            .get(source.0 as usize)
            .copied()
            .flatten()
            .ok_or(SsaError::RouteError(dest.0))?;
        if dest.0 > top.0 {
            return Err(SsaError::RouteError(dest.0));
        }
        let block_idx = self
            .lft_block
            .get(source.0 as usize)
            .and_then(|t| t.get(dest.block_number() as usize))
            .ok_or(SsaError::RouteError(dest.0))?;
        let block = db.lft_block.get(block_idx).ok_or(SsaError::RouteError(dest.0))?;
        Ok(block.block[dest.slot() as usize])
    }
}

/// `find-by-guid`: linear scan over the GUID-to-LID table, no index (P2).
pub fn find_by_guid<'db>(db: &'db Database, guid: Guid) -> Result<&'db GuidToLidRecord, SsaError> {
    db.guid_to_lid
        .iter()
        .find(|r| r.guid == guid)
        .ok_or_else(|| SsaError::NotFound(format!("guid {guid}")))
}

#[cfg(test)]
mod tests {
    use ssa_types::NodeType;

    use super::*;
    use crate::records::{GuidToLidRecord, LftBlockRecord, LftTopRecord, LinkRecord, NodeRecord, PortRecord};

    fn minimal_db() -> Database {
        let mut db = Database::new(Epoch(1));
        db.guid_to_lid.push(GuidToLidRecord {
            guid: Guid(1),
            lid: Lid(1),
            lmc: 0,
            is_switch: true,
        });
        db.guid_to_lid.push(GuidToLidRecord {
            guid: Guid(2),
            lid: Lid(2),
            lmc: 0,
            is_switch: false,
        });
        db.node.push(NodeRecord {
            node_guid: Guid(1),
            is_enhanced_sp0: false,
            node_type: NodeType::Switch,
            description: "sw0".into(),
        });
        db.port.push(PortRecord {
            port_lid: Lid(1),
            port_num: 3,
            mtu_cap: 4,
            rate: crate::records::PORT_RATE_IS_SWITCH_MASK,
            pkey_tbl_offset: 0,
            pkey_tbl_size: 0,
            vl_enforce: 0,
        });
        db.port.push(PortRecord {
            port_lid: Lid(2),
            port_num: 0,
            mtu_cap: 4,
            rate: 0,
            pkey_tbl_offset: 0,
            pkey_tbl_size: 0,
            vl_enforce: 0,
        });
        db.link.push(LinkRecord {
            from_lid: Lid(1),
            from_port_num: 3,
            to_lid: Lid(2),
            to_port_num: 0,
        });
        db.lft_top.push(LftTopRecord {
            lid: Lid(1),
            lft_top: Lid(2),
        });
        let mut block = [0u8; 64];
        block[2] = 3;
        db.lft_block.push(LftBlockRecord {
            lid: Lid(1),
            block_num: 0,
            block,
        });
        db
    }

    #[test]
    fn s1_build_and_route() {
        let db = minimal_db();
        let index = RoutingIndex::build(&db).unwrap();
        assert_eq!(index.lookup_forwarding(&db, Lid(1), Lid(2)).unwrap(), 3);
        assert!(matches!(
            index.lookup_forwarding(&db, Lid(1), Lid(3)),
            Err(SsaError::RouteError(3))
        ));
    }

    #[test]
    fn build_fails_on_empty_table() {
        let db = Database::new(Epoch(1));
        assert!(matches!(
            RoutingIndex::build(&db),
            Err(SsaError::EmptyTable("guid-to-lid"))
        ));
    }

    #[test]
    fn rebuild_is_noop_when_epoch_matches() {
        let db = minimal_db();
        let mut index = RoutingIndex::build(&db).unwrap();
        let before = index.clone();
        index.rebuild(&db).unwrap();
        assert_eq!(index, before);
    }

    #[test]
    fn rebuild_replaces_on_epoch_change() {
        let db1 = minimal_db();
        let mut index = RoutingIndex::build(&db1).unwrap();
        let mut db2 = minimal_db();
        db2.epoch = Epoch(2);
        index.rebuild(&db2).unwrap();
        assert_eq!(index.epoch(), Epoch(2));
    }

    #[test]
    fn find_by_guid_linear_scan() {
        let db = minimal_db();
        let rec = find_by_guid(&db, Guid(2)).unwrap();
        assert_eq!(rec.lid, Lid(2));
        assert!(matches!(find_by_guid(&db, Guid(99)), Err(SsaError::NotFound(_))));
    }

    #[test]
    fn lookup_port_and_linked_port() {
        let db = minimal_db();
        let index = RoutingIndex::build(&db).unwrap();
        let port = index.lookup_port(&db, Lid(1), 3).unwrap();
        assert_eq!(port.port_lid, Lid(1));
        let linked = index.lookup_linked_port(&db, Lid(1), 3).unwrap();
        assert_eq!(linked.port_lid, Lid(2));
    }
}
