//! Ensemble layer: run identities, the manifest format, and assembly of the
//! long-form multi-run table.
//!
//! The ensemble's iteration order is canonical: it drives both the
//! concatenation order of the assembled table and the default-grid selection
//! in the rebase engine, so the two always agree.

pub mod assemble;

pub use assemble::{Session, TreeStore, assemble, extract_run, write_back};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one simulation run in the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId {
    /// Organization or user owning the entry.
    pub user: String,
    /// Database / machine name.
    pub db: String,
    pub shot: u32,
    pub run: u32,
    /// Working-directory label for the run's case directory.
    #[serde(default)]
    pub dirname: String,
}

impl RunId {
    pub fn new(user: &str, db: &str, shot: u32, run: u32) -> Self {
        Self {
            user: user.to_string(),
            db: db.to_string(),
            shot,
            run,
            dirname: String::new(),
        }
    }

    /// Label used to tag table rows.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.user, self.db, self.shot, self.run)
    }
}

/// Ordered, non-empty collection of runs analyzed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RunId>", into = "Vec<RunId>")]
pub struct Ensemble {
    runs: Vec<RunId>,
}

impl Ensemble {
    pub fn new(runs: Vec<RunId>) -> Result<Self> {
        if runs.is_empty() {
            return Err(Error::EmptyEnsemble);
        }
        Ok(Self { runs })
    }

    /// Parse a manifest: an ordered JSON list of run records. The list order
    /// defines the canonical ensemble order.
    pub fn from_json(text: &str) -> Result<Self> {
        let runs: Vec<RunId> = serde_json::from_str(text)
            .map_err(|e| Error::invalid_configuration(format!("bad ensemble manifest: {e}")))?;
        Self::new(runs)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn first(&self) -> &RunId {
        &self.runs[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunId> {
        self.runs.iter()
    }
}

impl TryFrom<Vec<RunId>> for Ensemble {
    type Error = Error;

    fn try_from(runs: Vec<RunId>) -> Result<Self> {
        Self::new(runs)
    }
}

impl From<Ensemble> for Vec<RunId> {
    fn from(ensemble: Ensemble) -> Self {
        ensemble.runs
    }
}
