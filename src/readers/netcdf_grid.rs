//! NetCDF-4 datasets read through the native netcdf library.

use crate::error::{IngestError, Result};
use crate::readers::grid::{
    AttributeMap, DatasetSummary, GridArray, GridOpener, GridSource, GroupNode, VariableSummary,
};
use netcdf::{AttributeValue, Variable};
use std::path::{Path, PathBuf};

pub struct NetCdfGrid {
    path: PathBuf,
    file: netcdf::File,
}

impl NetCdfGrid {
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path).map_err(|e| IngestError::DatasetOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn read_error(&self, what: &str, e: netcdf::Error) -> IngestError {
        IngestError::MissingData(format!("{} in {}: {}", what, self.path.display(), e))
    }
}

impl GridSource for NetCdfGrid {
    fn dimension_len(&self, name: &str) -> Result<usize> {
        self.file
            .dimension(name)
            .map(|d| d.len())
            .ok_or_else(|| IngestError::MissingData(format!("{} dimension", name)))
    }

    fn variable(&self, name: &str) -> Result<GridArray> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| IngestError::MissingData(format!("{} variable", name)))?;

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var
            .get_values::<f64, _>(..)
            .map_err(|e| self.read_error(&format!("reading '{}'", name), e))?;

        GridArray::new(name, shape, values)
    }

    fn groups(&self) -> Result<Vec<GroupNode>> {
        let groups = self
            .file
            .groups()
            .map_err(|e| self.read_error("listing groups", e))?;
        Ok(groups.map(|g| group_node(&g)).collect())
    }

    fn describe(&self) -> Result<DatasetSummary> {
        let attributes = self
            .file
            .attributes()
            .filter_map(|attr| {
                let value = attr.value().ok()?;
                Some((attr.name().to_string(), attribute_to_string(&value)))
            })
            .collect();

        let dimensions = self
            .file
            .dimensions()
            .map(|d| (d.name(), d.len()))
            .collect();

        let variables = self
            .file
            .variables()
            .map(|v| VariableSummary {
                name: v.name(),
                dimensions: v.dimensions().iter().map(|d| d.name()).collect(),
                attributes: variable_attributes(&v),
            })
            .collect();

        Ok(DatasetSummary {
            attributes,
            dimensions,
            variables,
            groups: self.groups()?,
        })
    }
}

fn group_node(group: &netcdf::Group<'_>) -> GroupNode {
    GroupNode {
        name: group.name(),
        variables: group
            .variables()
            .map(|v| (v.name(), variable_attributes(&v)))
            .collect(),
        children: group.groups().map(|child| group_node(&child)).collect(),
    }
}

fn variable_attributes(var: &Variable<'_>) -> AttributeMap {
    var.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok()?;
            Some((attr.name().to_string(), attribute_to_string(&value)))
        })
        .collect()
}

/// Render an attribute the way ncdump-style tools print scalars and lists.
fn attribute_to_string(value: &AttributeValue) -> String {
    fn list<T: ToString>(items: &[T]) -> String {
        let items: Vec<String> = items.iter().map(ToString::to_string).collect();
        format!("[{}]", items.join(" "))
    }

    match value {
        AttributeValue::Str(s) => s.clone(),
        AttributeValue::Strs(s) => s.join(", "),
        AttributeValue::Uchar(v) => v.to_string(),
        AttributeValue::Schar(v) => v.to_string(),
        AttributeValue::Ushort(v) => v.to_string(),
        AttributeValue::Short(v) => v.to_string(),
        AttributeValue::Uint(v) => v.to_string(),
        AttributeValue::Int(v) => v.to_string(),
        AttributeValue::Ulonglong(v) => v.to_string(),
        AttributeValue::Longlong(v) => v.to_string(),
        AttributeValue::Float(v) => v.to_string(),
        AttributeValue::Double(v) => v.to_string(),
        AttributeValue::Uchars(v) => list(v),
        AttributeValue::Schars(v) => list(v),
        AttributeValue::Ushorts(v) => list(v),
        AttributeValue::Shorts(v) => list(v),
        AttributeValue::Uints(v) => list(v),
        AttributeValue::Ints(v) => list(v),
        AttributeValue::Ulonglongs(v) => list(v),
        AttributeValue::Longlongs(v) => list(v),
        AttributeValue::Floats(v) => list(v),
        AttributeValue::Doubles(v) => list(v),
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}

/// Opens NetCDF files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfOpener;

impl GridOpener for NetCdfOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GridSource>> {
        Ok(Box::new(NetCdfGrid::open(path)?))
    }
}
