use crate::error::Result;
use crate::readers::grid::{GridSource, GroupNode};
use crate::utils::constants::METADATA_GROUPS;
use serde_json::{Map, Value};

/// Variable name -> attribute object, merged across the designated groups.
/// Keys keep the order in which they were first seen.
pub type StoredMetadata = Map<String, Value>;

/// Collects variable attributes from named groups of a dataset.
pub struct MetadataReader {
    group_names: Vec<String>,
}

impl MetadataReader {
    pub fn new() -> Self {
        Self::with_groups(&METADATA_GROUPS)
    }

    pub fn with_groups(group_names: &[&str]) -> Self {
        Self {
            group_names: group_names.iter().map(|g| g.to_string()).collect(),
        }
    }

    /// Attributes of every variable in the designated groups. Groups are
    /// merged in designation order, so a later group overwrites an earlier
    /// variable of the same name in place.
    pub fn collect(&self, dataset: &dyn GridSource) -> Result<StoredMetadata> {
        let groups = dataset.groups()?;
        let visited = walk_groups(&groups);

        let mut stored = StoredMetadata::new();
        for group_name in &self.group_names {
            for group in visited.iter().filter(|g| &g.name == group_name) {
                for (variable, attributes) in &group.variables {
                    let attributes: Map<String, Value> = attributes
                        .iter()
                        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                        .collect();
                    stored.insert(variable.clone(), Value::Object(attributes));
                }
            }
        }
        Ok(stored)
    }

    /// JSON document stored in `methane_data_file.metadata`.
    pub fn storable_json(&self, dataset: &dyn GridSource) -> Result<String> {
        Ok(serde_json::to_string(&self.collect(dataset)?)?)
    }
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Visit order: all siblings of a level are yielded, then each sibling's
/// subtree is walked in turn.
pub fn walk_groups(groups: &[GroupNode]) -> Vec<&GroupNode> {
    let mut visited: Vec<&GroupNode> = groups.iter().collect();
    for group in groups {
        visited.extend(walk_groups(&group.children));
    }
    visited
}
