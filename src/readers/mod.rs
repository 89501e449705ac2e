pub mod grid;
pub mod memory_grid;
pub mod metadata_reader;
#[cfg(feature = "netcdf")]
pub mod netcdf_grid;
pub mod sidecar_reader;

pub use grid::{
    AttributeMap, DatasetSummary, GridArray, GridArrays, GridOpener, GridSource, GroupNode,
};
pub use memory_grid::{MemoryGrid, MemoryOpener};
pub use metadata_reader::{MetadataReader, StoredMetadata};
#[cfg(feature = "netcdf")]
pub use netcdf_grid::{NetCdfGrid, NetCdfOpener};
pub use sidecar_reader::SidecarReader;

use crate::error::{IngestError, Result};
use std::path::Path;

/// Opener used by binaries built without the `netcdf` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOpener;

impl GridOpener for UnavailableOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GridSource>> {
        Err(IngestError::DatasetOpen {
            path: path.to_path_buf(),
            message: "built without NetCDF support (enable the `netcdf` feature)".to_string(),
        })
    }
}

/// The dataset opener for this build.
pub fn default_opener() -> Box<dyn GridOpener> {
    #[cfg(feature = "netcdf")]
    {
        Box::new(NetCdfOpener)
    }
    #[cfg(not(feature = "netcdf"))]
    {
        Box::new(UnavailableOpener)
    }
}
