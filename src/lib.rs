//! Hierarchical profile access, perturbation, and rebasing engine.
//!
//! Core library for uncertainty-quantified analysis of simulation profile
//! output. Simulation runs produce physical quantities sampled over a
//! spatial coordinate and a sequence of time steps; this crate
//! - exposes a run's nested field data as flat path -> array lookups
//!   ([`tree`]),
//! - perturbs a baseline profile according to declarative model variants
//!   ([`perturb`]),
//! - aligns profiles from runs with non-matching grids onto shared spatial
//!   and temporal bases so cross-run statistics can be computed point by
//!   point ([`rebase`], [`stats`]),
//! - assembles per-run rows into one long-form table in canonical ensemble
//!   order ([`ensemble`]).
//!
//! The persistent store, job submission, plotting, and configuration parsing
//! are external collaborators behind the [`ensemble::TreeStore`] trait and
//! plain data types; this crate never touches the filesystem or network.

pub mod ensemble;
pub mod error;
pub mod perturb;
pub mod rebase;
pub mod stats;
pub mod table;
pub mod tree;

pub use ensemble::{Ensemble, RunId, Session, TreeStore, assemble, extract_run, write_back};
pub use error::{Error, Result};
pub use perturb::{BoundsMode, Operator, PerturbationModel, apply_model};
pub use rebase::{rebase_on_base, rebase_on_time};
pub use stats::{GroupStat, aggregate};
pub use table::{Row, Table};
pub use tree::{FieldPath, HierarchicalTree, TreeNode};
