//! Long-form tabular abstraction shared by tree extraction and rebasing.
//!
//! One row per (run, time-step, spatial index). The rebase engine depends on
//! this shape only, never on trees. Invariant: rows of one run are contiguous
//! and ordered by increasing tstep, then increasing spatial index; run blocks
//! follow ensemble order.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Run label ("user/db/shot/run"). Empty until tagged by the assembler.
    pub run: String,
    /// Time-step index within the run.
    pub tstep: usize,
    /// Time value for that step.
    pub time: f64,
    /// Named columns: base coordinate plus value columns.
    pub fields: BTreeMap<String, f64>,
}

impl Row {
    pub fn field(&self, name: &str) -> Result<f64> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingField(name.into()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Stamp every row with a run label. Used by the assembler to tag rows
    /// freshly extracted from one run's tree.
    pub fn tagged(mut self, run: &str) -> Self {
        for row in &mut self.rows {
            row.run = run.to_string();
        }
        self
    }

    /// Append another table's rows, preserving its internal ordering.
    pub fn extend(&mut self, other: Table) {
        self.rows.extend(other.rows);
    }

    /// Run labels in first-appearance order. This is the canonical ensemble
    /// order when the table was built by the assembler.
    pub fn run_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.run) {
                seen.push(row.run.clone());
            }
        }
        seen
    }

    /// Column values for one run, in row order.
    pub fn column(&self, run: &str, name: &str) -> Result<Vec<f64>> {
        self.rows
            .iter()
            .filter(|r| r.run == run)
            .map(|r| r.field(name))
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn row(run: &str, tstep: usize, time: f64, fields: &[(&str, f64)]) -> Row {
    Row {
        run: run.to_string(),
        tstep,
        time,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
    }
}
