//! Cross-run aggregation over a rebased table.
//!
//! Only meaningful once every run sits on the same base grid: rows are
//! grouped by (tstep, base value) across runs and reduced to per-column mean
//! and sample standard deviation, the shape error-band plotting and
//! write-back consume.

use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::BTreeMap;

/// Mean/std summary of one (time-step, base point) group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStat {
    pub tstep: usize,
    pub base: f64,
    /// Number of contributing rows (one per run when grids are shared).
    pub count: usize,
    pub mean: BTreeMap<String, f64>,
    /// Sample standard deviation; zero for singleton groups.
    pub std: BTreeMap<String, f64>,
}

/// Group by (tstep, base value) and reduce every value column.
///
/// Output is sorted by tstep, then base.
pub fn aggregate(table: &Table, base_col: &str, value_cols: &[&str]) -> Result<Vec<GroupStat>> {
    if table.is_empty() {
        return Err(Error::EmptyEnsemble);
    }

    // Key base values by their bit pattern: rebased tables carry exact
    // copies of the shared grid, so grouping is exact, not fuzzy.
    let mut groups: BTreeMap<(usize, u64), (f64, Vec<BTreeMap<String, f64>>)> = BTreeMap::new();
    for row in &table.rows {
        let base = row.field(base_col)?;
        let mut values = BTreeMap::new();
        for &col in value_cols {
            values.insert(col.to_string(), row.field(col)?);
        }
        groups
            .entry((row.tstep, base.to_bits()))
            .or_insert_with(|| (base, Vec::new()))
            .1
            .push(values);
    }

    let mut out = Vec::with_capacity(groups.len());
    for ((tstep, _), (base, rows)) in groups {
        let count = rows.len();
        let mut mean = BTreeMap::new();
        let mut std = BTreeMap::new();

        for &col in value_cols {
            let samples: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let m = samples.iter().sum::<f64>() / count as f64;
            let s = if count > 1 {
                let var =
                    samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (count - 1) as f64;
                var.sqrt()
            } else {
                0.0
            };
            mean.insert(col.to_string(), m);
            std.insert(col.to_string(), s);
        }

        out.push(GroupStat {
            tstep,
            base,
            count,
            mean,
            std,
        });
    }

    // BTreeMap iteration already sorts by (tstep, bits); re-sort by the
    // actual base value since the bit order of negative floats differs.
    out.sort_by(|a, b| {
        a.tstep
            .cmp(&b.tstep)
            .then(a.base.partial_cmp(&b.base).unwrap_or(std::cmp::Ordering::Equal))
    });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn mean_and_std_across_runs() {
        let table = Table::new(vec![
            row("a", 0, 0.0, &[("rho", 0.0), ("ti", 10.0)]),
            row("a", 0, 0.0, &[("rho", 1.0), ("ti", 20.0)]),
            row("b", 0, 0.0, &[("rho", 0.0), ("ti", 14.0)]),
            row("b", 0, 0.0, &[("rho", 1.0), ("ti", 10.0)]),
        ]);

        let stats = aggregate(&table, "rho", &["ti"]).unwrap();
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].base, 0.0);
        assert_eq!(stats[0].count, 2);
        assert_relative_eq!(stats[0].mean["ti"], 12.0);
        assert_relative_eq!(stats[0].std["ti"], 8.0_f64.sqrt());

        assert_eq!(stats[1].base, 1.0);
        assert_relative_eq!(stats[1].mean["ti"], 15.0);
    }

    #[test]
    fn singleton_groups_have_zero_std() {
        let table = Table::new(vec![row("a", 0, 0.0, &[("rho", 0.5), ("ti", 3.0)])]);
        let stats = aggregate(&table, "rho", &["ti"]).unwrap();
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].std["ti"], 0.0);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            aggregate(&Table::default(), "rho", &["ti"]).unwrap_err(),
            Error::EmptyEnsemble
        ));
    }
}
