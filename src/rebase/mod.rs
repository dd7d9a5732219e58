//! Rebase engine: resample multi-run tables onto shared grids.
//!
//! Runs generally sample different spatial and temporal grids; cross-run
//! statistics need every run on the same one. Both entry points share the
//! clamped piecewise-linear kernel in `interp` and are pure: the input table
//! is never mutated, a fresh table is produced per call.

pub mod interp;

pub use interp::interp_clamped;

use crate::error::{Error, Result};
use crate::table::{Row, Table};
use std::collections::BTreeMap;
use tracing::debug;

/// Resample value columns onto a common spatial base.
///
/// Rows are grouped by (run, time-step); within each group `base_col` is the
/// x-axis and every entry of `value_cols` a y-axis resampled onto `new_base`.
///
/// When `new_base` is not supplied, the base values of the FIRST run's first
/// time-step group are used. This is a deliberate, order-dependent default
/// carried over from observed behavior: it silently privileges one run when
/// grids differ, with no diagnostic beyond a debug log line.
pub fn rebase_on_base(
    table: &Table,
    base_col: &str,
    value_cols: &[&str],
    new_base: Option<&[f64]>,
) -> Result<Table> {
    if table.is_empty() {
        return Err(Error::EmptyEnsemble);
    }

    let groups = group_rows(table);

    let new_base: Vec<f64> = match new_base {
        Some(base) => base.to_vec(),
        None => {
            let first = &groups[0];
            debug!(
                run = %first.run,
                tstep = first.tstep,
                "no explicit base supplied, using first run's grid"
            );
            column_of(&first.rows, base_col)?
        }
    };

    let mut rows = Vec::with_capacity(groups.len() * new_base.len());
    for group in &groups {
        let x = column_of(&group.rows, base_col)?;

        let mut resampled: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for &col in value_cols {
            let y = column_of(&group.rows, col)?;
            resampled.insert(col, interp_clamped(&x, &y, &new_base)?);
        }

        for (index, base_value) in new_base.iter().enumerate() {
            let mut fields = BTreeMap::new();
            fields.insert(base_col.to_string(), *base_value);
            for (col, values) in &resampled {
                fields.insert(col.to_string(), values[index]);
            }
            rows.push(Row {
                run: group.run.clone(),
                tstep: group.tstep,
                time: group.time,
                fields,
            });
        }
    }

    Ok(Table::new(rows))
}

/// Resample columns onto a common time sequence.
///
/// The same kernel applied along the time dimension: within one run, each
/// spatial position's series over the observed time values is the y-axis.
/// The output carries a synthetic integer `tstep` equal to the position
/// within `new_base` (the discrete-time selector for downstream
/// aggregation), with `time` set to the corresponding `new_base` value.
///
/// When `new_base` is not supplied, the first run's observed time values are
/// used (same order-dependent default as `rebase_on_base`).
pub fn rebase_on_time(table: &Table, cols: &[&str], new_base: Option<&[f64]>) -> Result<Table> {
    if table.is_empty() {
        return Err(Error::EmptyEnsemble);
    }

    let groups = group_rows(table);

    // Per run, in first-appearance order: the list of its time-step groups.
    let mut runs: Vec<(&str, Vec<&Group>)> = Vec::new();
    for group in &groups {
        match runs.last_mut() {
            Some((run, steps)) if *run == group.run => steps.push(group),
            _ => runs.push((group.run.as_str(), vec![group])),
        }
    }

    let new_base: Vec<f64> = match new_base {
        Some(base) => base.to_vec(),
        None => {
            let (run, steps) = &runs[0];
            debug!(run = %run, "no explicit time base supplied, using first run's times");
            steps.iter().map(|g| g.time).collect()
        }
    };

    let mut rows = Vec::new();
    for (run, steps) in &runs {
        let times: Vec<f64> = steps.iter().map(|g| g.time).collect();

        let spatial = steps[0].rows.len();
        for group in steps {
            if group.rows.len() != spatial {
                return Err(Error::shape_mismatch(format!(
                    "run {run} has {} rows at time-step {} (expected {spatial})",
                    group.rows.len(),
                    group.tstep
                )));
            }
        }

        // Interpolate each (column, spatial position) series over time.
        // resampled[col][s][j] = value at new_base[j].
        let mut resampled: BTreeMap<&str, Vec<Vec<f64>>> = BTreeMap::new();
        for &col in cols {
            let mut per_position = Vec::with_capacity(spatial);
            for s in 0..spatial {
                let series: Vec<f64> = steps
                    .iter()
                    .map(|g| g.rows[s].field(col))
                    .collect::<Result<_>>()?;
                per_position.push(interp_clamped(&times, &series, &new_base)?);
            }
            resampled.insert(col, per_position);
        }

        for (j, time) in new_base.iter().enumerate() {
            for s in 0..spatial {
                let mut fields = BTreeMap::new();
                for (col, per_position) in &resampled {
                    fields.insert(col.to_string(), per_position[s][j]);
                }
                rows.push(Row {
                    run: run.to_string(),
                    tstep: j,
                    time: *time,
                    fields,
                });
            }
        }
    }

    Ok(Table::new(rows))
}

/// One contiguous (run, time-step) block of rows.
struct Group<'a> {
    run: String,
    tstep: usize,
    time: f64,
    rows: Vec<&'a Row>,
}

/// Split the table into contiguous (run, tstep) groups, preserving input
/// order. The table invariant guarantees rows of one group are adjacent.
fn group_rows(table: &Table) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in &table.rows {
        match groups.last_mut() {
            Some(g) if g.run == row.run && g.tstep == row.tstep => g.rows.push(row),
            _ => groups.push(Group {
                run: row.run.clone(),
                tstep: row.tstep,
                time: row.time,
                rows: vec![row],
            }),
        }
    }
    groups
}

fn column_of(rows: &[&Row], name: &str) -> Result<Vec<f64>> {
    rows.iter().map(|r| r.field(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    /// Two runs on different spatial grids, one time step each.
    fn two_run_table() -> Table {
        Table::new(vec![
            row("a", 0, 0.0, &[("rho", 0.0), ("ti", 10.0)]),
            row("a", 0, 0.0, &[("rho", 1.0), ("ti", 20.0)]),
            row("a", 0, 0.0, &[("rho", 2.0), ("ti", 30.0)]),
            row("b", 0, 0.0, &[("rho", 0.0), ("ti", 5.0)]),
            row("b", 0, 0.0, &[("rho", 2.0), ("ti", 15.0)]),
        ])
    }

    #[test]
    fn rebase_interpolates_second_run_onto_shared_grid() {
        let out = rebase_on_base(&two_run_table(), "rho", &["ti"], Some(&[0.0, 1.0, 2.0])).unwrap();

        assert_eq!(out.column("a", "ti").unwrap(), vec![10.0, 20.0, 30.0]);
        assert_eq!(out.column("b", "ti").unwrap(), vec![5.0, 10.0, 15.0]);
        assert_eq!(out.column("b", "rho").unwrap(), vec![0.0, 1.0, 2.0]);

        // Cross-run mean at rho = 1.
        let at_one: Vec<f64> = out
            .rows
            .iter()
            .filter(|r| r.fields["rho"] == 1.0)
            .map(|r| r.fields["ti"])
            .collect();
        assert_eq!(at_one.iter().sum::<f64>() / at_one.len() as f64, 15.0);
    }

    #[test]
    fn default_base_is_first_runs_grid() {
        let out = rebase_on_base(&two_run_table(), "rho", &["ti"], None).unwrap();
        // First run is "a" with grid [0, 1, 2].
        assert_eq!(out.column("b", "rho").unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(out.column("b", "ti").unwrap(), vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn rebase_on_own_grid_is_identity() {
        let single = Table::new(vec![
            row("a", 0, 0.0, &[("rho", 0.0), ("ti", 10.0)]),
            row("a", 0, 0.0, &[("rho", 0.4), ("ti", 17.0)]),
            row("a", 0, 0.0, &[("rho", 1.0), ("ti", 30.0)]),
        ]);
        let out = rebase_on_base(&single, "rho", &["ti"], Some(&[0.0, 0.4, 1.0])).unwrap();

        for (got, want) in out.column("a", "ti").unwrap().iter().zip([10.0, 17.0, 30.0]) {
            assert_relative_eq!(*got, want, max_relative = 1e-12);
        }
    }

    #[test]
    fn out_of_range_points_clamp_without_nan() {
        let out =
            rebase_on_base(&two_run_table(), "rho", &["ti"], Some(&[-1.0, 0.5, 3.0])).unwrap();

        assert_eq!(out.column("a", "ti").unwrap(), vec![10.0, 15.0, 30.0]);
        assert_eq!(out.column("b", "ti").unwrap(), vec![5.0, 7.5, 15.0]);
        assert!(out.rows.iter().all(|r| r.fields["ti"].is_finite()));
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = rebase_on_base(&Table::default(), "rho", &["ti"], None).unwrap_err();
        assert!(matches!(err, Error::EmptyEnsemble));

        let err = rebase_on_time(&Table::default(), &["ti"], None).unwrap_err();
        assert!(matches!(err, Error::EmptyEnsemble));
    }

    #[test]
    fn single_point_group_is_rejected() {
        let table = Table::new(vec![row("a", 0, 0.0, &[("rho", 0.5), ("ti", 1.0)])]);
        let err = rebase_on_base(&table, "rho", &["ti"], Some(&[0.0, 1.0])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    /// One run, two spatial points, time steps at t=0 and t=1.
    fn time_table() -> Table {
        Table::new(vec![
            row("a", 0, 0.0, &[("rho", 0.0), ("ti", 10.0)]),
            row("a", 0, 0.0, &[("rho", 1.0), ("ti", 20.0)]),
            row("a", 1, 1.0, &[("rho", 0.0), ("ti", 30.0)]),
            row("a", 1, 1.0, &[("rho", 1.0), ("ti", 40.0)]),
        ])
    }

    #[test]
    fn time_rebase_attaches_synthetic_step_column() {
        let out = rebase_on_time(&time_table(), &["rho", "ti"], Some(&[0.0, 0.5, 1.0])).unwrap();

        assert_eq!(out.len(), 6);
        assert_eq!(
            out.rows.iter().map(|r| r.tstep).collect::<Vec<_>>(),
            vec![0, 0, 1, 1, 2, 2]
        );
        assert_eq!(
            out.rows.iter().map(|r| r.time).collect::<Vec<_>>(),
            vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]
        );
        // Midpoint in time interpolates each spatial position.
        assert_eq!(out.rows[2].fields["ti"], 20.0);
        assert_eq!(out.rows[3].fields["ti"], 30.0);
    }

    #[test]
    fn time_rebase_defaults_to_first_runs_times() {
        let out = rebase_on_time(&time_table(), &["ti"], None).unwrap();
        assert_eq!(
            out.rows.iter().map(|r| r.time).collect::<Vec<_>>(),
            vec![0.0, 0.0, 1.0, 1.0]
        );
        assert_eq!(
            out.rows.iter().map(|r| r.fields["ti"]).collect::<Vec<_>>(),
            vec![10.0, 20.0, 30.0, 40.0]
        );
    }

    #[test]
    fn time_rebase_rejects_ragged_steps() {
        let table = Table::new(vec![
            row("a", 0, 0.0, &[("ti", 10.0)]),
            row("a", 0, 0.0, &[("ti", 20.0)]),
            row("a", 1, 1.0, &[("ti", 30.0)]),
        ]);
        let err = rebase_on_time(&table, &["ti"], None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }
}
