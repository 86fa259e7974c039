//! The derived-database computation boundary (§6): the access worker calls
//! into this interface to turn a parent database plus a consumer identity
//! into that consumer's precomputed path-record database. The computation
//! itself is domain-specific and explicitly out of scope; only its
//! interface is specified here.

use ssa_smdb::Database;
use ssa_types::Gid;

use ssa_errors::SsaError;

/// Identifies the consumer a derived database is being computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerIdentity {
    /// The consumer's fabric-wide address.
    pub gid: Gid,
}

/// Computes a per-consumer derived database from a parent database.
pub trait DerivedDatabaseBuilder: Send + Sync {
    /// Build the derived database for `consumer` from `parent`.
    fn build(&self, parent: &Database, consumer: ConsumerIdentity) -> Result<Database, SsaError>;
}
