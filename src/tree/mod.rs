//! Hierarchical tree layer: path-addressable view over one run's field data.
//!
//! This module is intentionally separate from rebasing and perturbation. It
//! owns:
//! - FieldPath type (slash-delimited field address)
//! - TreeNode (nested value structure)
//! - HierarchicalTree (flattened path index + array/scalar access)

pub mod node;
pub mod path;

pub use node::TreeNode;
pub use path::{ERROR_LOWER_SUFFIX, ERROR_UPPER_SUFFIX, FieldPath, WILDCARD};

use crate::error::{Error, Result};
use crate::table::Row;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Shape of one entry in the flattened field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInfo {
    Scalar,
    Array { len: usize },
}

/// Read-only view over one run's nested field data, with in-place mutable
/// access to single fields for the perturbation engine.
///
/// The flattened path index is computed once on first use and cached for the
/// lifetime of the instance. Mutation never changes a field's shape (only
/// `&mut [f64]` is handed out), so the cached index stays valid.
#[derive(Debug)]
pub struct HierarchicalTree {
    root: TreeNode,
    exclude_empty: bool,
    flat: OnceLock<BTreeMap<FieldPath, FieldInfo>>,
}

impl HierarchicalTree {
    /// Wrap a nested value structure for one run.
    ///
    /// With `exclude_empty` set, zero-length arrays are filtered out of the
    /// flattened mapping. This is a filter, not a deletion: the nodes stay in
    /// the underlying tree.
    pub fn new(root: TreeNode, exclude_empty: bool) -> Self {
        Self {
            root,
            exclude_empty,
            flat: OnceLock::new(),
        }
    }

    /// Parse already-validated JSON data into a tree.
    pub fn from_json(value: &serde_json::Value, exclude_empty: bool) -> Result<Self> {
        Ok(Self::new(TreeNode::from_json(value)?, exclude_empty))
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Flattened mapping from path to field shape. Lazily computed once per
    /// instance.
    pub fn flat_fields(&self) -> &BTreeMap<FieldPath, FieldInfo> {
        self.flat.get_or_init(|| {
            let mut out = BTreeMap::new();
            flatten(&self.root, FieldPath::new(""), self.exclude_empty, &mut out);
            out
        })
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.flat_fields().contains_key(path)
    }

    /// Scalar field lookup.
    pub fn scalar(&self, path: &FieldPath) -> Result<f64> {
        match self.resolve(path)? {
            TreeNode::Scalar(v) => Ok(*v),
            _ => Err(Error::shape_mismatch(format!("{path} is not a scalar"))),
        }
    }

    /// 1-D array field lookup.
    pub fn array(&self, path: &FieldPath) -> Result<&[f64]> {
        match self.resolve(path)? {
            TreeNode::Array(v) => Ok(v),
            _ => Err(Error::shape_mismatch(format!("{path} is not a 1-D array"))),
        }
    }

    /// Mutable borrow of exactly one array field's storage. The tree keeps
    /// exclusive ownership; callers must not retain the borrow past the
    /// mutating call.
    pub fn array_mut(&mut self, path: &FieldPath) -> Result<&mut [f64]> {
        if !self.contains(path) {
            return Err(Error::MissingField(path.clone()));
        }
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node
                .child_mut(segment)
                .ok_or_else(|| Error::MissingField(path.clone()))?;
        }
        match node {
            TreeNode::Array(v) => Ok(v.as_mut_slice()),
            _ => Err(Error::shape_mismatch(format!("{path} is not a 1-D array"))),
        }
    }

    /// Expand a path template containing the `$i` wildcard into all concrete
    /// paths present in the tree. The remaining path text is treated as a
    /// regular expression matched against the whole path. The result is
    /// sorted lexicographically.
    pub fn find_by_paths(&self, pattern: &str) -> Result<Vec<FieldPath>> {
        let expanded = pattern.replace(WILDCARD, r"(\d+)");
        let re = Regex::new(&format!("^{expanded}$"))
            .map_err(|e| Error::invalid_configuration(format!("bad path pattern: {e}")))?;

        // flat_fields is a BTreeMap, so iteration is already lexicographic.
        Ok(self
            .flat_fields()
            .keys()
            .filter(|p| re.is_match(p.as_str()))
            .cloned()
            .collect())
    }

    /// Emit one row per (time-step, spatial index) for the requested fields.
    ///
    /// Every time-step index found under `prefix` contributes one group of
    /// rows; within a step, all requested fields must have equal length. The
    /// row's time value comes from the tree's top-level `time` array when
    /// present, else the step index itself. Rows carry no run label; the
    /// ensemble assembler tags them.
    pub fn to_rows(&self, fields: &[&str], prefix: &str) -> Result<Vec<Row>> {
        let prefix_path = FieldPath::new(prefix);
        let steps = match self.resolve_node(&prefix_path) {
            Some(TreeNode::List(items)) => items.len(),
            _ => return Err(Error::MissingField(prefix_path)),
        };

        let time_path = FieldPath::new("time");
        let times: Option<&[f64]> = if self.contains(&time_path) {
            Some(self.array(&time_path)?)
        } else {
            None
        };

        let mut rows = Vec::new();
        for tstep in 0..steps {
            let mut columns: Vec<(&str, &[f64])> = Vec::with_capacity(fields.len());
            for &field in fields {
                let path = prefix_path.join(&tstep.to_string()).join(field);
                columns.push((field, self.array(&path)?));
            }

            let len = columns.first().map(|(_, a)| a.len()).unwrap_or(0);
            for (name, array) in &columns {
                if array.len() != len {
                    return Err(Error::shape_mismatch(format!(
                        "field {name} at time-step {tstep} has length {} (expected {len})",
                        array.len()
                    )));
                }
            }

            let time = times
                .and_then(|t| t.get(tstep).copied())
                .unwrap_or(tstep as f64);

            for index in 0..len {
                let mut values = BTreeMap::new();
                for (name, array) in &columns {
                    values.insert(name.to_string(), array[index]);
                }
                rows.push(Row {
                    run: String::new(),
                    tstep,
                    time,
                    fields: values,
                });
            }
        }

        Ok(rows)
    }

    fn resolve(&self, path: &FieldPath) -> Result<&TreeNode> {
        if !self.contains(path) {
            return Err(Error::MissingField(path.clone()));
        }
        self.resolve_node(path)
            .ok_or_else(|| Error::MissingField(path.clone()))
    }

    /// Raw walk of the nested structure, bypassing the flattened index.
    fn resolve_node(&self, path: &FieldPath) -> Option<&TreeNode> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.child(segment)?;
        }
        Some(node)
    }
}

fn flatten(
    node: &TreeNode,
    prefix: FieldPath,
    exclude_empty: bool,
    out: &mut BTreeMap<FieldPath, FieldInfo>,
) {
    match node {
        TreeNode::Scalar(_) => {
            out.insert(prefix, FieldInfo::Scalar);
        }
        TreeNode::Array(values) => {
            if exclude_empty && values.is_empty() {
                return;
            }
            out.insert(prefix, FieldInfo::Array { len: values.len() });
        }
        TreeNode::Struct(map) => {
            for (key, child) in map {
                flatten(child, prefix.join(key), exclude_empty, out);
            }
        }
        TreeNode::List(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(child, prefix.join(&index.to_string()), exclude_empty, out);
            }
        }
    }
}
