//! The per-node service: the ctrl/upstream/downstream/access worker set,
//! the socketpair message bus wiring them together, and the transport/
//! management-datagram/derived-database boundaries they run against.
#![deny(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod derived;
pub mod mad;
pub mod metrics;
pub mod persist;
pub mod transport;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use ssa_smdb::Database;
use ssa_types::Gid;
use tokio::sync::RwLock;

/// The well-known destination port a child connects to on its parent to
/// run the streaming protocol against the parent database.
pub const PARENT_CHILD_STREAM_PORT: u16 = 6501;

/// The well-known destination port a consumer connects to on an
/// access-role node to run the streaming protocol against its derived
/// database.
pub const ACCESS_CONSUMER_STREAM_PORT: u16 = 6502;

/// The process-wide "currently published database" pointer (Design
/// Notes: global published DB pointers): upstream publishes into it after
/// each successful pull, downstream/access read from it to serve
/// children.
pub type PublishedDb = Arc<RwLock<Option<Arc<Database>>>>;

/// Construct a fresh, initially-empty published-database pointer.
pub fn new_published_db() -> PublishedDb {
    Arc::new(RwLock::new(None))
}

/// Per-consumer derived databases on an access-role node, keyed by the
/// consumer's GID. Each `CONN_DONE` inserts or replaces only its own
/// consumer's entry, so one consumer's derived database never overwrites
/// another's.
pub type DerivedDbMap = Arc<RwLock<HashMap<Gid, Arc<Database>>>>;

/// Construct a fresh, initially-empty derived-database map.
pub fn new_derived_db_map() -> DerivedDbMap {
    Arc::new(RwLock::new(HashMap::new()))
}
