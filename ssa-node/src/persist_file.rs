//! A flat-file [`DatabaseLoader`]: the epoch followed by the eight core
//! table datasets, each length-prefixed, written in the fixed order
//! [`ssa_smdb::wire::encode_data_datasets`] produces them in.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use ssa_errors::SsaError;
use ssa_server::persist::DatabaseLoader;
use ssa_smdb::{wire, Database};
use ssa_types::Epoch;

/// Loads and stores a [`Database`] as a single flat file.
#[derive(Debug, Default)]
pub struct FileDatabaseLoader;

fn io_err(e: std::io::Error) -> SsaError {
    SsaError::TransportError(e)
}

impl DatabaseLoader for FileDatabaseLoader {
    fn load(&self, path: &Path) -> Result<Database, SsaError> {
        let mut file = fs::File::open(path).map_err(io_err)?;
        let mut epoch_buf = [0u8; 8];
        file.read_exact(&mut epoch_buf).map_err(io_err)?;
        let epoch = Epoch(u64::from_be_bytes(epoch_buf));

        let mut datasets = Vec::with_capacity(wire::CORE_TABLE_COUNT);
        for _ in 0..wire::CORE_TABLE_COUNT {
            let mut len_buf = [0u8; 4];
            file.read_exact(&mut len_buf).map_err(io_err)?;
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            file.read_exact(&mut payload).map_err(io_err)?;
            datasets.push(bytes::Bytes::from(payload));
        }
        wire::decode_data_datasets(epoch, &datasets)
    }

    fn store(&self, db: &Database, path: &Path) -> Result<(), SsaError> {
        let mut file = fs::File::create(path).map_err(io_err)?;
        file.write_all(&db.epoch.0.to_be_bytes()).map_err(io_err)?;
        for dataset in wire::encode_data_datasets(db) {
            file.write_all(&(dataset.len() as u32).to_be_bytes())
                .map_err(io_err)?;
            file.write_all(&dataset).map_err(io_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssa_smdb::records::GuidToLidRecord;
    use ssa_types::{Guid, Lid};

    #[test]
    fn round_trips_through_a_temp_file() {
        let mut db = Database::new(Epoch(42));
        db.guid_to_lid.push(GuidToLidRecord {
            guid: Guid(9),
            lid: Lid(3),
            lmc: 0,
            is_switch: false,
        });

        let path = std::env::temp_dir().join(format!("ssa-node-test-{:x}.smdb", 0x5eed_u64));
        let loader = FileDatabaseLoader;
        loader.store(&db, &path).unwrap();
        let loaded = loader.load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, db);
    }
}
