use crate::error::{IngestError, Result};
use crate::utils::constants::{LAT_VAR, LON_VAR, METHANE_VAR, TIME_VAR};
use std::fmt;
use std::path::Path;

/// Attribute name and stringified value, in file order.
pub type AttributeMap = Vec<(String, String)>;

/// Read access to one opened gridded dataset.
pub trait GridSource {
    /// Length of a named dimension.
    fn dimension_len(&self, name: &str) -> Result<usize>;

    /// Full contents of a named variable, converted to `f64`.
    fn variable(&self, name: &str) -> Result<GridArray>;

    /// Child groups of the root group, each carrying its own children.
    fn groups(&self) -> Result<Vec<GroupNode>>;

    /// Dimensions, root variables and group tree for display.
    fn describe(&self) -> Result<DatasetSummary>;
}

/// Opens datasets by path.
pub trait GridOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GridSource>>;
}

/// A variable's values in row-major order together with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridArray {
    name: String,
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl GridArray {
    pub fn new(name: &str, shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(IngestError::MissingData(format!(
                "variable '{}' has shape {:?} but {} values",
                name,
                shape,
                values.len()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            shape,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Value at a coordinate, `None` when the index is out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }

        let mut offset = 0;
        for (&i, &len) in index.iter().zip(&self.shape) {
            if i >= len {
                return None;
            }
            offset = offset * len + i;
        }
        self.values.get(offset).copied()
    }

    /// Like [`GridArray::get`], reporting an out-of-bounds index as an error.
    pub fn at(&self, index: &[usize]) -> Result<f64> {
        self.get(index).ok_or_else(|| {
            IngestError::MissingData(format!(
                "index {:?} outside variable '{}' with shape {:?}",
                index, self.name, self.shape
            ))
        })
    }
}

/// The per-cell arrays a methane file is decomposed from.
#[derive(Debug, Clone, PartialEq)]
pub struct GridArrays {
    pub time: GridArray,
    pub lats: GridArray,
    pub lons: GridArray,
    pub xch4: GridArray,
}

impl GridArrays {
    /// Read the arrays and check they cover the `num_lats` x `num_lons` grid.
    pub fn read(dataset: &dyn GridSource, num_lats: usize, num_lons: usize) -> Result<Self> {
        let arrays = Self {
            time: dataset.variable(TIME_VAR)?,
            lats: dataset.variable(LAT_VAR)?,
            lons: dataset.variable(LON_VAR)?,
            xch4: dataset.variable(METHANE_VAR)?,
        };

        let grid = [num_lats, num_lons];
        let expected = [
            (&arrays.time, &grid[..]),
            (&arrays.xch4, &grid[..]),
            (&arrays.lats, &grid[..1]),
            (&arrays.lons, &grid[1..]),
        ];
        for (array, shape) in expected {
            if array.shape() != shape {
                return Err(IngestError::MissingData(format!(
                    "variable '{}' has shape {:?}, expected {:?}",
                    array.name(),
                    array.shape(),
                    shape
                )));
            }
        }
        Ok(arrays)
    }
}

/// One group of a dataset with the attributes of each of its variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupNode {
    pub name: String,
    /// Variables in file order.
    pub variables: Vec<(String, AttributeMap)>,
    pub children: Vec<GroupNode>,
}

impl GroupNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: &str, attributes: &[(&str, &str)]) -> Self {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        match self.variables.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = attributes,
            None => self.variables.push((name.to_string(), attributes)),
        }
        self
    }

    pub fn with_child(mut self, child: GroupNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
    pub name: String,
    pub dimensions: Vec<String>,
    pub attributes: AttributeMap,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub attributes: AttributeMap,
    pub dimensions: Vec<(String, usize)>,
    pub variables: Vec<VariableSummary>,
    pub groups: Vec<GroupNode>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GLOBAL ATTRIBUTES:")?;
        for (name, value) in &self.attributes {
            writeln!(f, "  {}: {}", name, value)?;
        }

        writeln!(f, "GROUPS:")?;
        for group in &self.groups {
            write_group(f, group, 1)?;
        }

        writeln!(f, "DIMENSIONS:")?;
        for (name, len) in &self.dimensions {
            writeln!(f, "  {} = {}", name, len)?;
        }

        writeln!(f, "VARIABLES:")?;
        for var in &self.variables {
            writeln!(f, "  {}({})", var.name, var.dimensions.join(", "))?;
            for (name, value) in &var.attributes {
                writeln!(f, "    {}: {}", name, value)?;
            }
        }
        Ok(())
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, group: &GroupNode, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    writeln!(f, "{}/{} ({} variables)", indent, group.name, group.variables.len())?;
    for child in &group.children {
        write_group(f, child, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_array_row_major_lookup() {
        let array = GridArray::new("xch4", vec![2, 3], vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]).unwrap();
        assert_eq!(array.get(&[0, 2]), Some(2.0));
        assert_eq!(array.get(&[1, 0]), Some(10.0));
        assert_eq!(array.get(&[2, 0]), None);
        assert_eq!(array.get(&[0]), None);
        assert!(array.at(&[1, 3]).is_err());
    }

    #[test]
    fn test_grid_arrays_shape_check() {
        use crate::readers::MemoryGrid;

        let grid = MemoryGrid::methane(2, 3, |_, _| 0.0, |_, _| 1850.0);
        let arrays = GridArrays::read(&grid, 2, 3).unwrap();
        assert_eq!(arrays.time.shape(), &[2, 3]);
        assert_eq!(arrays.lons.shape(), &[3]);

        let bad_time = grid.with_variable("time", &["lat"], vec![0.0; 2]);
        let err = GridArrays::read(&bad_time, 2, 3).unwrap_err();
        assert!(err.is_unusable_file());
    }

    #[test]
    fn test_grid_array_shape_mismatch() {
        assert!(GridArray::new("lat", vec![3], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_summary_display() {
        let summary = DatasetSummary {
            attributes: AttributeMap::from([("title".to_string(), "XCH4".to_string())]),
            dimensions: vec![("lat".to_string(), 3), ("lon".to_string(), 4)],
            variables: vec![VariableSummary {
                name: "xch4".to_string(),
                dimensions: vec!["lat".to_string(), "lon".to_string()],
                attributes: AttributeMap::from([("units".to_string(), "ppb".to_string())]),
            }],
            groups: vec![GroupNode::new("product").with_child(GroupNode::new("geolocation"))],
        };

        let text = summary.to_string();
        assert!(text.contains("title: XCH4"));
        assert!(text.contains("lat = 3"));
        assert!(text.contains("xch4(lat, lon)"));
        assert!(text.contains("    /geolocation"));
    }
}
