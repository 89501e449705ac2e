use crate::error::{IngestError, Result};
use crate::readers::grid::{
    AttributeMap, DatasetSummary, GridArray, GridOpener, GridSource, GroupNode, VariableSummary,
};
use crate::utils::constants::{LAT_DIM, LAT_VAR, LON_DIM, LON_VAR, METHANE_VAR, TIME_VAR};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-process dataset used by tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    dimensions: BTreeMap<String, usize>,
    variables: BTreeMap<String, (Vec<String>, GridArray)>,
    groups: Vec<GroupNode>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `lat` x `lon` methane grid with coordinate variables and per-cell
    /// `time` and `xch4` values produced by the given closures.
    pub fn methane(
        num_lats: usize,
        num_lons: usize,
        time: impl Fn(usize, usize) -> f64,
        xch4: impl Fn(usize, usize) -> f64,
    ) -> Self {
        let lats: Vec<f64> = (0..num_lats).map(|i| -89.5 + i as f64).collect();
        let lons: Vec<f64> = (0..num_lons).map(|j| -179.5 + j as f64).collect();

        let mut times = Vec::with_capacity(num_lats * num_lons);
        let mut methane = Vec::with_capacity(num_lats * num_lons);
        for lat in 0..num_lats {
            for lon in 0..num_lons {
                times.push(time(lat, lon));
                methane.push(xch4(lat, lon));
            }
        }

        let grid_dims = [LAT_DIM, LON_DIM];
        Self::new()
            .with_dimension(LAT_DIM, num_lats)
            .with_dimension(LON_DIM, num_lons)
            .with_variable(LAT_VAR, &[LAT_DIM], lats)
            .with_variable(LON_VAR, &[LON_DIM], lons)
            .with_variable(TIME_VAR, &grid_dims, times)
            .with_variable(METHANE_VAR, &grid_dims, methane)
    }

    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.insert(name.to_string(), len);
        self
    }

    /// Adds a variable over existing dimensions. Values whose count does not
    /// match the dimensions are truncated or zero-padded.
    pub fn with_variable(mut self, name: &str, dimensions: &[&str], mut values: Vec<f64>) -> Self {
        let shape: Vec<usize> = dimensions
            .iter()
            .map(|d| self.dimensions.get(*d).copied().unwrap_or(0))
            .collect();
        values.resize(shape.iter().product(), 0.0);

        if let Ok(array) = GridArray::new(name, shape, values) {
            let dims = dimensions.iter().map(|d| d.to_string()).collect();
            self.variables.insert(name.to_string(), (dims, array));
        }
        self
    }

    pub fn with_group(mut self, group: GroupNode) -> Self {
        self.groups.push(group);
        self
    }
}

impl GridSource for MemoryGrid {
    fn dimension_len(&self, name: &str) -> Result<usize> {
        self.dimensions
            .get(name)
            .copied()
            .ok_or_else(|| IngestError::MissingData(format!("{} dimension", name)))
    }

    fn variable(&self, name: &str) -> Result<GridArray> {
        self.variables
            .get(name)
            .map(|(_, array)| array.clone())
            .ok_or_else(|| IngestError::MissingData(format!("{} variable", name)))
    }

    fn groups(&self) -> Result<Vec<GroupNode>> {
        Ok(self.groups.clone())
    }

    fn describe(&self) -> Result<DatasetSummary> {
        Ok(DatasetSummary {
            attributes: AttributeMap::new(),
            dimensions: self
                .dimensions
                .iter()
                .map(|(name, len)| (name.clone(), *len))
                .collect(),
            variables: self
                .variables
                .iter()
                .map(|(name, (dims, _))| VariableSummary {
                    name: name.clone(),
                    dimensions: dims.clone(),
                    attributes: AttributeMap::new(),
                })
                .collect(),
            groups: self.groups.clone(),
        })
    }
}

/// Opener serving registered in-memory grids; unknown paths fail to open.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    grids: HashMap<PathBuf, Arc<MemoryGrid>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(mut self, path: impl Into<PathBuf>, grid: MemoryGrid) -> Self {
        self.grids.insert(path.into(), Arc::new(grid));
        self
    }
}

impl GridOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GridSource>> {
        match self.grids.get(path) {
            Some(grid) => Ok(Box::new(grid.as_ref().clone())),
            None => Err(IngestError::DatasetOpen {
                path: path.to_path_buf(),
                message: "not a recognised dataset".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_methane_grid_layout() {
        let grid = MemoryGrid::methane(3, 4, |lat, lon| (lat * 10 + lon) as f64, |_, _| 1850.0);
        assert_eq!(grid.dimension_len(LAT_DIM).unwrap(), 3);
        assert_eq!(grid.dimension_len(LON_DIM).unwrap(), 4);

        let time = grid.variable(TIME_VAR).unwrap();
        assert_eq!(time.shape(), &[3, 4]);
        assert_eq!(time.get(&[2, 1]), Some(21.0));
        assert_eq!(grid.variable(LAT_VAR).unwrap().get(&[0]), Some(-89.5));
        assert_eq!(grid.variable(LON_VAR).unwrap().get(&[3]), Some(-176.5));
    }

    #[test]
    fn test_missing_names() {
        let grid = MemoryGrid::new();
        assert!(matches!(grid.dimension_len("lat"), Err(IngestError::MissingData(_))));
        assert!(matches!(grid.variable("xch4"), Err(IngestError::MissingData(_))));
    }

    #[test]
    fn test_opener_unknown_path() {
        let opener = MemoryOpener::new().with_grid("/data/a.nc", MemoryGrid::new());
        assert!(opener.open(Path::new("/data/a.nc")).is_ok());
        assert!(matches!(
            opener.open(Path::new("/data/b.nc")),
            Err(IngestError::DatasetOpen { .. })
        ));
    }
}
