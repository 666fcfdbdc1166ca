//! Binary snapshots of a catalog and a configuration.
//!
//! Encoded with `bitcode` behind a versioned header, so a planned
//! configuration can be saved together with the catalog it applies to and
//! reloaded later.

use crate::catalog::{Catalog, CatalogError};
use crate::configuration::{Configuration, ConfigurationError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a planner snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xF10E_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("configuration does not fit the catalog: {0}")]
    Configuration(#[from] ConfigurationError),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("stored catalog is invalid: {0}")]
    Catalog(#[from] CatalogError),
    #[error("stored configuration does not fit the stored catalog: {0}")]
    Configuration(#[from] ConfigurationError),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
        }
    }
}

impl SnapshotHeader {
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanSnapshot {
    header: SnapshotHeader,
    catalog: Catalog,
    configuration: Configuration,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serialize `catalog` and `configuration` to a binary blob. The
/// configuration must fit the catalog.
pub fn save(catalog: &Catalog, configuration: &Configuration) -> Result<Vec<u8>, SerializeError> {
    configuration.validate(catalog)?;
    let snapshot = PlanSnapshot {
        header: SnapshotHeader::default(),
        catalog: catalog.clone(),
        configuration: configuration.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a blob produced by [`save`]. Checks the header before handing
/// back the payload. The catalog goes through the same validation as a
/// freshly built one, and the configuration must fit it.
pub fn load(data: &[u8]) -> Result<(Catalog, Configuration), DeserializeError> {
    let snapshot: PlanSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    let catalog = snapshot.catalog.revalidate()?;
    snapshot.configuration.validate(&catalog)?;
    Ok((catalog, snapshot.configuration))
}

/// Read only the header. bitcode cannot decode partially, so this decodes
/// the whole snapshot.
pub fn read_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: PlanSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn snapshot_round_trip_preserves_catalog_and_levels() {
        let catalog = smelting_chain();
        let mut conf = catalog.initial_configuration();
        conf.upgrade_facility(FURNACE);

        let data = save(&catalog, &conf).unwrap();
        let (restored, restored_conf) = load(&data).unwrap();
        assert_eq!(restored, catalog);
        assert_eq!(restored_conf, conf);
        assert_eq!(read_header(&data).unwrap(), SnapshotHeader::default());
    }

    #[test]
    fn restored_catalog_plans_identically() {
        use crate::search::Planner;

        let catalog = single_line();
        let data = save(&catalog, &catalog.initial_configuration()).unwrap();
        let (restored, conf) = load(&data).unwrap();

        let a = initialized(catalog);
        let b = initialized(restored);
        assert_eq!(
            Planner::new(&a).plan(&conf).unwrap().total_cost(),
            Planner::new(&b).plan(&conf).unwrap().total_cost()
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        match load(&[0u8; 10]) {
            Err(DeserializeError::Decode(_)) => {}
            Err(other) => panic!("expected Decode error, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn load_revalidates_the_stored_catalog() {
        use crate::id::{FacilityId, LineId};

        let mut catalog = smelting_chain();
        catalog.line_mut(LineId(0)).unwrap().to = FacilityId(99);
        let data = save(&catalog, &catalog.initial_configuration()).unwrap();

        match load(&data) {
            Err(DeserializeError::Catalog(CatalogError::FacilityNotFound(id))) => {
                assert_eq!(id, FacilityId(99));
            }
            Err(other) => panic!("expected catalog error, got: {other}"),
            Ok(_) => panic!("corrupt catalog was accepted"),
        }
    }

    #[test]
    fn save_rejects_mismatched_configuration() {
        let catalog = smelting_chain();
        let conf = Configuration {
            facility_levels: vec![0; 3],
            line_levels: vec![],
        };
        assert!(matches!(
            save(&catalog, &conf),
            Err(SerializeError::Configuration(_))
        ));
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::default().validate().is_ok());

        let bad_magic = SnapshotHeader {
            magic: 0xDEAD_BEEF,
            version: FORMAT_VERSION,
        };
        assert!(matches!(
            bad_magic.validate(),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));

        let future = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION + 1,
        };
        assert!(matches!(
            future.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));

        let past = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            version: 0,
        };
        assert!(matches!(
            past.validate(),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
    }
}
