//! Nested value structure owned by a tree.
//!
//! Physical fields live at the leaves as scalars or 1-D arrays. Repeated
//! substructures (time steps) are `List` nodes addressed by integer segment.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Scalar(f64),
    Array(Vec<f64>),
    Struct(BTreeMap<String, TreeNode>),
    List(Vec<TreeNode>),
}

impl TreeNode {
    /// Build a node from already-parsed JSON.
    ///
    /// Numbers become scalars, numeric arrays become 1-D arrays, arrays of
    /// objects become repeated substructures, objects become records. Empty
    /// arrays are kept as zero-length arrays (the tree owner decides whether
    /// to filter them out of the flattened mapping).
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| {
                    Error::invalid_configuration(format!("number out of f64 range: {n}"))
                })?;
                Ok(TreeNode::Scalar(f))
            }
            Value::Array(items) => {
                if items.is_empty() {
                    return Ok(TreeNode::Array(Vec::new()));
                }
                if items.iter().all(Value::is_number) {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        let f = item.as_f64().ok_or_else(|| {
                            Error::invalid_configuration(format!(
                                "number out of f64 range: {item}"
                            ))
                        })?;
                        out.push(f);
                    }
                    Ok(TreeNode::Array(out))
                } else {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(Self::from_json(item)?);
                    }
                    Ok(TreeNode::List(out))
                }
            }
            Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    out.insert(key.clone(), Self::from_json(item)?);
                }
                Ok(TreeNode::Struct(out))
            }
            other => Err(Error::invalid_configuration(format!(
                "unsupported value in tree data: {other}"
            ))),
        }
    }

    /// Child lookup by path segment. Integer segments index into `List`
    /// nodes, everything else keys into `Struct` nodes.
    pub(crate) fn child(&self, segment: &str) -> Option<&TreeNode> {
        match self {
            TreeNode::Struct(map) => map.get(segment),
            TreeNode::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub(crate) fn child_mut(&mut self, segment: &str) -> Option<&mut TreeNode> {
        match self {
            TreeNode::Struct(map) => map.get_mut(segment),
            TreeNode::List(items) => {
                let i = segment.parse::<usize>().ok()?;
                items.get_mut(i)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_round_trip_shapes() {
        let node = TreeNode::from_json(&json!({
            "time": [0.0, 0.5],
            "profiles_1d": [
                {"t_i_average": [1.0, 2.0]},
                {"t_i_average": [3.0, 4.0]},
            ],
            "n_steps": 2,
        }))
        .unwrap();

        let steps = node.child("profiles_1d").unwrap();
        let first = steps.child("0").unwrap().child("t_i_average").unwrap();
        assert_eq!(first, &TreeNode::Array(vec![1.0, 2.0]));
        assert_eq!(node.child("n_steps").unwrap(), &TreeNode::Scalar(2.0));
    }

    #[test]
    fn rejects_non_numeric_leaves() {
        assert!(TreeNode::from_json(&json!({"name": "jet"})).is_err());
    }
}
