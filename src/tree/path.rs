//! Field path type used to address data inside a run's tree.
//!
//! Example path: profiles_1d/0/t_i_average  =>  the t_i_average array at
//! time-step 0. The segment "$i" is a reserved wildcard used in pattern
//! search (see `HierarchicalTree::find_by_paths`).
//!
//! We store the path as a String and derive ordering so it can be used in
//! BTreeSet/Map.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved wildcard segment standing in for a concrete integer index.
pub const WILDCARD: &str = "$i";

/// Conventional suffix addressing the upper error bound of a field.
pub const ERROR_UPPER_SUFFIX: &str = "_error_upper";

/// Conventional suffix addressing the lower error bound of a field.
pub const ERROR_LOWER_SUFFIX: &str = "_error_lower";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a segment separated by '/'.
    pub fn join(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{}", self.0, segment))
        }
    }

    /// Append a suffix to the final segment (no separator). Used for the
    /// error-bound convention: `P` + "_error_upper".
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }

    /// Substitute the wildcard segment with a concrete index.
    pub fn with_index(&self, index: usize) -> Self {
        Self(self.0.replace(WILDCARD, &index.to_string()))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FieldPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}
