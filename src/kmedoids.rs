//! Partitioning Around Medoids.
//!
//! Representatives are actual data points and the objective is the total
//! Euclidean distance (not squared) from each point to its medoid, which
//! makes the partition less sensitive to outlying customers than k-means.
//! The swap phase evaluates every medoid/non-medoid exchange per iteration,
//! so cost grows quadratically with the number of points.

use crate::config::{KMedoidsConfig, MedoidInit};
use crate::distance::pairwise_distances;
use crate::engine::{validate_k, PartitionalEngine};
use crate::error::{Result, SegmentError};
use crate::result::{ClusterMetrics, ClusterResult};
use crate::rng::substream;
use log::{debug, log, warn, Level};
use ndarray::{Array1, Array2, ArrayView2};
use rand::seq::index;
use rayon::prelude::*;

/// Relative improvement a swap must exceed to be accepted
const SWAP_EPSILON: f64 = 1e-12;

/// K-medoids clustering with the PAM BUILD/SWAP algorithm
#[derive(Debug, Clone)]
pub struct KMedoids {
    config: KMedoidsConfig,
}

/// Nearest and second-nearest medoid of every point
struct Assignment {
    nearest: Vec<usize>,
    nearest_dist: Vec<f64>,
    second_dist: Vec<f64>,
}

impl Assignment {
    fn new(dist: &Array2<f64>, medoids: &[usize]) -> Self {
        let n = dist.nrows();
        let mut nearest = vec![0; n];
        let mut nearest_dist = vec![f64::INFINITY; n];
        let mut second_dist = vec![f64::INFINITY; n];

        for j in 0..n {
            for (pos, &m) in medoids.iter().enumerate() {
                let d = dist[[j, m]];
                if d < nearest_dist[j] {
                    second_dist[j] = nearest_dist[j];
                    nearest_dist[j] = d;
                    nearest[j] = pos;
                } else if d < second_dist[j] {
                    second_dist[j] = d;
                }
            }
            // a medoid always belongs to its own cluster, even next to a duplicate
            if let Some(pos) = medoids.iter().position(|&m| m == j) {
                if nearest[j] != pos {
                    nearest[j] = pos;
                    second_dist[j] = 0.0;
                }
            }
        }

        Self {
            nearest,
            nearest_dist,
            second_dist,
        }
    }

    fn cost(&self) -> f64 {
        self.nearest_dist.iter().sum()
    }
}

impl KMedoids {
    pub fn new(k: usize) -> Self {
        Self {
            config: KMedoidsConfig::new(k),
        }
    }

    pub fn with_config(config: KMedoidsConfig) -> Self {
        Self { config }
    }

    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn config(&self) -> &KMedoidsConfig {
        &self.config
    }

    /// Fit the model to the data.
    ///
    /// # Errors
    ///
    /// Returns an error if `k` is outside `[1, n_samples]`, `max_iters` is 0,
    /// or `k > 1` and every point is identical.
    pub fn fit(&self, data: &ArrayView2<f64>) -> Result<ClusterResult> {
        let config = &self.config;
        let k = config.k;
        validate_k(data, k)?;

        if config.max_iters == 0 {
            return Err(SegmentError::InvalidParameter(
                "max_iters must be greater than 0".to_string(),
            ));
        }

        let dist = pairwise_distances(data);
        let mut medoids = match config.init {
            MedoidInit::Build => build(&dist, k),
            MedoidInit::Random => {
                let mut rng = substream(config.seed, 0);
                index::sample(&mut rng, data.nrows(), k).into_vec()
            }
        };

        let mut assignment = Assignment::new(&dist, &medoids);
        let mut cost = assignment.cost();
        let mut history = vec![cost];
        let mut n_iterations = 0;
        let mut converged = false;

        while n_iterations < config.max_iters {
            let Some((delta, pos, candidate)) = best_swap(&dist, &medoids, &assignment) else {
                converged = true;
                break;
            };
            if delta >= -SWAP_EPSILON * cost.max(1.0) {
                converged = true;
                break;
            }

            n_iterations += 1;
            debug!(
                "  Swap {}: medoid {} -> point {} (delta {:.6})",
                n_iterations, medoids[pos], candidate, delta
            );
            medoids[pos] = candidate;
            assignment = Assignment::new(&dist, &medoids);
            cost = assignment.cost();
            history.push(cost);
        }

        // a final check after the cap: converged if no improving swap remains
        if !converged {
            converged = best_swap(&dist, &medoids, &assignment)
                .map_or(true, |(delta, _, _)| delta >= -SWAP_EPSILON * cost.max(1.0));
        }

        let level = if config.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        log!(
            level,
            "PAM: {} samples, k={}, total dissimilarity={:.6} after {} swaps",
            data.nrows(),
            k,
            cost,
            n_iterations
        );
        if !converged {
            warn!(
                "PAM (k={}) reached max_iters={} with improving swaps left",
                k, config.max_iters
            );
        }

        let labels = Array1::from_vec(assignment.nearest);
        let mut centroids = Array2::zeros((k, data.ncols()));
        for (mut row, &m) in centroids.outer_iter_mut().zip(medoids.iter()) {
            row.assign(&data.row(m));
        }
        let metrics = ClusterMetrics::compute(data, &labels.view(), k);

        Ok(ClusterResult {
            labels,
            centroids,
            medoids: Some(medoids),
            metrics,
            objective: cost,
            objective_trace: history,
            n_iterations,
            converged,
        })
    }
}

/// Greedy BUILD: first the point with the smallest total distance to all
/// others, then repeatedly the point whose addition lowers the total cost the
/// most. Ties go to the lowest index.
fn build(dist: &Array2<f64>, k: usize) -> Vec<usize> {
    let n = dist.nrows();
    let mut medoids = Vec::with_capacity(k);
    let mut nearest_dist = vec![f64::INFINITY; n];
    let mut is_medoid = vec![false; n];

    while medoids.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&c| !is_medoid[c]) {
            let cost: f64 = (0..n)
                .map(|j| nearest_dist[j].min(dist[[j, candidate]]))
                .sum();
            if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                best = Some((candidate, cost));
            }
        }

        let Some((chosen, _)) = best else { break };
        is_medoid[chosen] = true;
        medoids.push(chosen);
        for (j, nd) in nearest_dist.iter_mut().enumerate() {
            *nd = nd.min(dist[[j, chosen]]);
        }
    }

    medoids
}

/// Most negative cost change over all (medoid position, non-medoid) swaps.
///
/// Returns `(delta, position, candidate)`; ties resolve to the lowest
/// position, then the lowest candidate index.
fn best_swap(
    dist: &Array2<f64>,
    medoids: &[usize],
    assignment: &Assignment,
) -> Option<(f64, usize, usize)> {
    let n = dist.nrows();
    let pairs: Vec<(usize, usize)> = (0..medoids.len())
        .flat_map(|pos| {
            (0..n)
                .filter(|h| !medoids.contains(h))
                .map(move |h| (pos, h))
        })
        .collect();

    pairs
        .par_iter()
        .map(|&(pos, h)| (swap_delta(dist, assignment, pos, h), pos, h))
        .reduce_with(|a, b| {
            if b.0 < a.0 || (b.0 == a.0 && (b.1, b.2) < (a.1, a.2)) {
                b
            } else {
                a
            }
        })
}

/// Change in total cost when the medoid at `pos` is replaced by point `h`
fn swap_delta(dist: &Array2<f64>, assignment: &Assignment, pos: usize, h: usize) -> f64 {
    (0..dist.nrows())
        .map(|j| {
            let d_h = dist[[j, h]];
            let new = if assignment.nearest[j] == pos {
                assignment.second_dist[j].min(d_h)
            } else {
                assignment.nearest_dist[j].min(d_h)
            };
            new - assignment.nearest_dist[j]
        })
        .sum()
}

impl PartitionalEngine for KMedoids {
    fn fit_k(&self, data: &ArrayView2<f64>, k: usize, seed: u64) -> Result<ClusterResult> {
        let config = self.config.clone().with_seed(seed);
        KMedoids::with_config(KMedoidsConfig { k, ..config }).fit(data)
    }

    fn name(&self) -> &'static str {
        "pam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_build_picks_central_point_first() {
        let data = array![[0.0], [1.0], [2.0], [10.0]];
        let dist = pairwise_distances(&data.view());

        let medoids = build(&dist, 2);
        // 1.0 and 2.0 tie on total distance (11); lowest index wins
        assert_eq!(medoids[0], 1);
        assert_eq!(medoids[1], 3);
    }

    #[test]
    fn test_pam_medoids_are_data_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let data = Array2::random_using((40, 3), Uniform::new(0.0, 1.0), &mut rng);

        let result = KMedoids::new(4).fit(&data.view()).unwrap();
        let medoids = result.medoids().unwrap();

        assert_eq!(medoids.len(), 4);
        for (pos, &m) in medoids.iter().enumerate() {
            assert_eq!(result.centroids().row(pos), data.row(m));
            assert_eq!(result.labels()[m], pos);
        }
        assert!(result.converged());
    }

    #[test]
    fn test_pam_cost_non_increasing() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let data = Array2::random_using((30, 2), Uniform::new(0.0, 1.0), &mut rng);

        let result = KMedoids::with_config(KMedoidsConfig::new(3).with_init(MedoidInit::Random))
            .fit(&data.view())
            .unwrap();

        for pair in result.objective_trace().windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn test_pam_iteration_cap_reports_non_convergence() {
        // six runs of seven consecutive integers, 100 apart: the optimum has
        // the middle of every run as medoid, which one swap cannot reach from
        // a random start
        let data = Array2::from_shape_fn((42, 1), |(i, _)| ((i / 7) * 100 + i % 7) as f64);
        let config = KMedoidsConfig::new(6)
            .with_init(MedoidInit::Random)
            .with_seed(7)
            .with_max_iters(1);

        let result = KMedoids::with_config(config).fit(&data.view()).unwrap();

        assert!(!result.converged());
        assert_eq!(result.n_iterations(), 1);
        assert_eq!(result.objective_trace().len(), 2);
        assert!(matches!(
            result.require_converged(),
            Err(SegmentError::NonConvergence { iterations: 1 })
        ));

        let finished = KMedoids::new(6).fit(&data.view()).unwrap();
        assert!(finished.converged());
        assert!(finished.require_converged().is_ok());
        let mut medoids = finished.medoids().unwrap().to_vec();
        medoids.sort_unstable();
        assert_eq!(medoids, vec![3, 10, 17, 24, 31, 38]);
    }

    #[test]
    fn test_pam_no_improving_swap_at_optimum() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let data = Array2::random_using((25, 2), Uniform::new(0.0, 1.0), &mut rng);
        let result = KMedoids::new(3).fit(&data.view()).unwrap();

        let dist = pairwise_distances(&data.view());
        let medoids = result.medoids().unwrap().to_vec();
        let assignment = Assignment::new(&dist, &medoids);
        let (delta, _, _) = best_swap(&dist, &medoids, &assignment).unwrap();

        assert!(delta >= -1e-9);
        assert_relative_eq!(assignment.cost(), result.objective(), epsilon = 1e-9);
    }

    #[test]
    fn test_pam_duplicate_rows_keep_clusters_non_empty() {
        let data = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        for init in [MedoidInit::Build, MedoidInit::Random] {
            let result = KMedoids::with_config(KMedoidsConfig::new(2).with_init(init))
                .fit(&data.view())
                .unwrap();
            let mut sizes = result.sizes();
            sizes.sort_unstable();
            assert_eq!(sizes, vec![2, 3]);
            assert_relative_eq!(result.objective(), 0.0);
        }
    }

    #[test]
    fn test_pam_max_iters_zero() {
        let data = array![[0.0], [1.0]];
        let err = KMedoids::with_config(KMedoidsConfig::new(1).with_max_iters(0)).fit(&data.view());
        assert!(matches!(err, Err(SegmentError::InvalidParameter(_))));
    }
}
