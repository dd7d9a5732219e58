//! Shared 1-D interpolation kernel for both rebase directions.

use crate::error::{Error, Result};

/// Piecewise-linear interpolation of sampled pairs `(x, y)` at points `xi`.
///
/// Sample pairs are sorted by x before interpolating. Query points outside
/// the observed range clamp to the nearest boundary value; there is no
/// extrapolation. Fewer than two distinct x values make interpolation
/// undefined and fail with `ShapeMismatch`.
pub fn interp_clamped(x: &[f64], y: &[f64], xi: &[f64]) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(Error::shape_mismatch(format!(
            "interpolation inputs differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }

    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let distinct = {
        let mut count = 0usize;
        let mut last = f64::NAN;
        for (px, _) in &pairs {
            if *px != last {
                count += 1;
                last = *px;
            }
        }
        count
    };
    if distinct < 2 {
        return Err(Error::shape_mismatch(format!(
            "need at least 2 distinct base points to interpolate (found {distinct})"
        )));
    }

    let first = pairs[0];
    let last = pairs[pairs.len() - 1];

    let mut out = Vec::with_capacity(xi.len());
    for &q in xi {
        if q <= first.0 {
            out.push(first.1);
            continue;
        }
        if q >= last.0 {
            out.push(last.1);
            continue;
        }

        // Find the first pair with x >= q; q is strictly inside the range.
        let hi = pairs.partition_point(|(px, _)| *px < q);
        let (x1, y1) = pairs[hi];
        let (x0, y0) = pairs[hi - 1];

        if x1 == x0 {
            out.push(y1);
        } else {
            let t = (q - x0) / (x1 - x0);
            out.push(y0 + t * (y1 - y0));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn linear_midpoints() {
        let y = interp_clamped(&[0.0, 2.0], &[5.0, 15.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(y, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn clamps_outside_range() {
        let y = interp_clamped(&[0.0, 1.0, 2.0], &[10.0, 20.0, 30.0], &[-5.0, 7.0]).unwrap();
        assert_eq!(y, vec![10.0, 30.0]);
    }

    #[test]
    fn identity_on_own_grid() {
        let x = [0.0, 0.3, 0.7, 1.0];
        let y = [1.0, 4.0, 9.0, 16.0];
        assert_eq!(interp_clamped(&x, &y, &x).unwrap(), y.to_vec());
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let y = interp_clamped(&[2.0, 0.0], &[15.0, 5.0], &[1.0]).unwrap();
        assert_eq!(y, vec![10.0]);
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        assert!(interp_clamped(&[1.0, 1.0], &[2.0, 3.0], &[1.0]).is_err());
        assert!(interp_clamped(&[1.0], &[2.0], &[1.0]).is_err());
    }
}
