use crate::engine::PartitionalEngine;
use crate::error::{Result, SegmentError};
use crate::rng::derive_seed;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Dispersion of the best partition found for one k
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElbowPoint {
    pub k: usize,
    pub tot_withinss: f64,
    /// betweenss / totss
    pub explained_ratio: f64,
}

/// Total within-cluster sum of squares for k = 1..=k_max.
///
/// Each k is fitted independently (in parallel) with a seed derived from
/// `seed` and k, the same derivation the gap statistic uses for its
/// observed fits.
pub fn elbow_curve<E>(
    data: &ArrayView2<f64>,
    engine: &E,
    k_max: usize,
    seed: u64,
) -> Result<Vec<ElbowPoint>>
where
    E: PartitionalEngine + ?Sized,
{
    if k_max == 0 || k_max > data.nrows() {
        return Err(SegmentError::InvalidParameter(format!(
            "k_max must be in 1..={}, got {}",
            data.nrows(),
            k_max
        )));
    }

    (1..=k_max)
        .into_par_iter()
        .map(|k| {
            let fit = engine.fit_k(data, k, derive_seed(seed, k as u64, 0))?;
            Ok(ElbowPoint {
                k,
                tot_withinss: fit.metrics().tot_withinss,
                explained_ratio: fit.metrics().explained_ratio(),
            })
        })
        .collect()
}

/// The k where the dispersion curve bends most: the point farthest from the
/// straight line joining the first and last points, after scaling both axes
/// to [0, 1]. Earliest k on ties.
///
/// # Errors
///
/// Returns `NoSolution` for curves with fewer than 3 points or no change in
/// dispersion.
pub fn elbow_k(curve: &[ElbowPoint]) -> Result<usize> {
    if curve.len() < 3 {
        return Err(SegmentError::NoSolution(format!(
            "an elbow needs at least 3 points, got {}",
            curve.len()
        )));
    }

    let (first, last) = (curve[0], curve[curve.len() - 1]);
    let k_span = (last.k - first.k) as f64;
    let w_span = first.tot_withinss - last.tot_withinss;
    if k_span <= 0.0 || w_span <= 0.0 {
        return Err(SegmentError::NoSolution(
            "dispersion does not decrease over the curve".to_string(),
        ));
    }

    // on the scaled axes the chord runs from (0, 1) to (1, 0)
    let mut best = (first.k, f64::NEG_INFINITY);
    for point in curve {
        let x = (point.k - first.k) as f64 / k_span;
        let y = (point.tot_withinss - last.tot_withinss) / w_span;
        let distance = (1.0 - x - y) / std::f64::consts::SQRT_2;
        if distance > best.1 {
            best = (point.k, distance);
        }
    }

    Ok(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::KMeans;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn point(k: usize, tot_withinss: f64) -> ElbowPoint {
        ElbowPoint {
            k,
            tot_withinss,
            explained_ratio: 0.0,
        }
    }

    #[test]
    fn test_elbow_k_finds_bend() {
        let curve = vec![
            point(1, 100.0),
            point(2, 40.0),
            point(3, 12.0),
            point(4, 10.0),
            point(5, 9.0),
        ];
        assert_eq!(elbow_k(&curve).unwrap(), 3);
    }

    #[test]
    fn test_elbow_k_too_short() {
        let curve = vec![point(1, 10.0), point(2, 5.0)];
        assert!(matches!(elbow_k(&curve), Err(SegmentError::NoSolution(_))));
    }

    #[test]
    fn test_elbow_curve_starts_at_totss() {
        let data = array![[0.0, 0.0], [0.0, 1.0], [4.0, 4.0], [4.0, 5.0], [9.0, 0.0]];
        let curve = elbow_curve(&data.view(), &KMeans::new(1), 4, 0).unwrap();

        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0].k, 1);
        assert_abs_diff_eq!(curve[0].explained_ratio, 0.0, epsilon = 1e-12);
        assert!(curve[3].tot_withinss < curve[0].tot_withinss);
    }

    #[test]
    fn test_elbow_curve_rejects_k_max() {
        let data = array![[0.0], [1.0]];
        assert!(elbow_curve(&data.view(), &KMeans::new(1), 3, 0).is_err());
    }
}
