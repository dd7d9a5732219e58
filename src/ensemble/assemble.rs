//! Assembly: pull per-run trees, extract rows, concatenate in ensemble order.
//!
//! Per-run extraction is a pure function of (store, run), so callers may fan
//! it out across a worker pool; results are merged by ensemble order, never
//! by completion order.

use crate::ensemble::{Ensemble, RunId};
use crate::error::Result;
use crate::table::Table;
use crate::tree::HierarchicalTree;
use std::collections::BTreeMap;
use tracing::debug;

/// External collaborator boundary: the persistent hierarchical data store.
///
/// Implementations are synchronous and may fail with their own I/O errors,
/// which this crate propagates unchanged. Transactions, retries, and locking
/// on the store are the implementation's concern.
pub trait TreeStore {
    /// Read-only profile tree for one run.
    fn get_tree(&self, run: &RunId, exclude_empty: bool) -> anyhow::Result<HierarchicalTree>;

    /// Clone a store entry so a mutated tree can be written next to it.
    fn copy_entry(&mut self, source: &RunId, target: &RunId) -> anyhow::Result<()>;

    /// Persist an in-memory tree at the target identity.
    fn put(&mut self, tree: &HierarchicalTree, target: &RunId) -> anyhow::Result<()>;
}

/// Extract the requested fields of one run into rows tagged with its label.
///
/// Empty arrays are excluded from the tree's flattened mapping here: a field
/// a run never filled in should read as absent, not as zero rows.
pub fn extract_run<S: TreeStore + ?Sized>(
    store: &S,
    run: &RunId,
    fields: &[&str],
    prefix: &str,
) -> Result<Table> {
    let tree = store.get_tree(run, true)?;
    let rows = tree.to_rows(fields, prefix)?;
    Ok(Table::new(rows).tagged(&run.label()))
}

/// Extract every run of the ensemble and concatenate, in ensemble order.
pub fn assemble<S: TreeStore + ?Sized>(
    store: &S,
    ensemble: &Ensemble,
    fields: &[&str],
    prefix: &str,
) -> Result<Table> {
    let mut out = Table::default();
    for run in ensemble.iter() {
        out.extend(extract_run(store, run, fields, prefix)?);
    }
    Ok(out)
}

/// Persist a mutated tree: clone the source entry to the target identity,
/// then write the tree over it.
pub fn write_back<S: TreeStore + ?Sized>(
    store: &mut S,
    source: &RunId,
    target: &RunId,
    tree: &HierarchicalTree,
) -> Result<()> {
    store.copy_entry(source, target)?;
    store.put(tree, target)?;
    Ok(())
}

type CacheKey = (RunId, Vec<String>, String);

/// Memoizing wrapper around a store for one analysis session.
///
/// Repeated identical extraction calls within the session short-circuit to
/// the cached table. The cache must be invalidated when the underlying store
/// changes; stale reads are otherwise possible and not detected.
pub struct Session<S: TreeStore> {
    store: S,
    cache: BTreeMap<CacheKey, Table>,
}

impl<S: TreeStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Cached variant of [`extract_run`].
    pub fn extract_run(&mut self, run: &RunId, fields: &[&str], prefix: &str) -> Result<Table> {
        let key = (
            run.clone(),
            fields.iter().map(|f| f.to_string()).collect(),
            prefix.to_string(),
        );

        if let Some(table) = self.cache.get(&key) {
            debug!(run = %run, "extraction cache hit");
            return Ok(table.clone());
        }

        let table = extract_run(&self.store, run, fields, prefix)?;
        self.cache.insert(key, table.clone());
        Ok(table)
    }

    /// Cached per-run assembly in ensemble order.
    pub fn assemble(&mut self, ensemble: &Ensemble, fields: &[&str], prefix: &str) -> Result<Table> {
        let mut out = Table::default();
        for run in ensemble.iter() {
            out.extend(self.extract_run(run, fields, prefix)?);
        }
        Ok(out)
    }

    /// Drop every cached extraction. Call after the underlying store changed.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}
