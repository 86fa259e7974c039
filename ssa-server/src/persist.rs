//! The persistent on-disk database boundary (§6): loading a core node's
//! parent database or an access node's derived database from a fixed
//! filesystem path at startup. The on-disk format is the wire format of the
//! data datasets plus their descriptors, written sequentially; this crate
//! only specifies the load/store interface, not a concrete encoder.

use std::path::Path;

use ssa_errors::SsaError;
use ssa_smdb::Database;

/// Loads and stores a [`Database`] snapshot at a fixed filesystem path.
pub trait DatabaseLoader: Send + Sync {
    /// Load a database previously written by [`DatabaseLoader::store`].
    fn load(&self, path: &Path) -> Result<Database, SsaError>;

    /// Persist a database snapshot.
    fn store(&self, db: &Database, path: &Path) -> Result<(), SsaError>;
}
