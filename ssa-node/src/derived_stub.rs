//! A placeholder [`DerivedDatabaseBuilder`]. The per-consumer path-record
//! computation is domain-specific and out of scope here (§6); this impl
//! exists only so `start_service`'s generic parameters resolve on nodes
//! whose role never actually carries `ACCESS`.

use ssa_errors::SsaError;
use ssa_server::derived::{ConsumerIdentity, DerivedDatabaseBuilder};
use ssa_smdb::Database;

/// A [`DerivedDatabaseBuilder`] that always reports the computation as
/// unimplemented.
#[derive(Debug, Default)]
pub struct UnimplementedDerivedBuilder;

impl DerivedDatabaseBuilder for UnimplementedDerivedBuilder {
    fn build(&self, _parent: &Database, consumer: ConsumerIdentity) -> Result<Database, SsaError> {
        Err(SsaError::NotFound(format!(
            "no derived-database builder configured for consumer {}",
            consumer.gid
        )))
    }
}
