use crate::distance::{cluster_means, find_nearest_centroids, within_sum_of_squares};
use crate::rng::substream;
use log::trace;
use ndarray::{Array1, Array2, ArrayView2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Result of a single Lloyd run
pub(crate) struct LloydRun {
    pub centroids: Array2<f64>,
    pub labels: Array1<usize>,
    pub tot_withinss: f64,
    pub trace: Vec<f64>,
    pub n_iterations: usize,
    pub converged: bool,
    pub n_reseeded: usize,
}

/// Run Lloyd's algorithm once from a random initialization.
///
/// Each pass assigns every point to its nearest centroid, repairs empty
/// clusters, then moves centroids to the mean of their members. The run
/// stops when a pass leaves every label unchanged or after `max_iters`
/// passes (the initial assignment counts as the first).
pub(crate) fn lloyd(
    data: &ArrayView2<f64>,
    k: usize,
    max_iters: usize,
    rng: &mut ChaCha8Rng,
) -> LloydRun {
    let initial = initialize_centroids(data, k, rng);

    let (mut labels, mut dists) = find_nearest_centroids(data, &initial.view());
    let mut n_reseeded = reseed_empty_clusters(&mut labels, &mut dists, k);
    let (mut centroids, _) = cluster_means(data, &labels.view(), k);
    let mut tot_withinss = within_sum_of_squares(data, &labels.view(), &centroids.view()).sum();
    let mut history = vec![tot_withinss];

    let mut n_iterations = 1;
    let mut converged = false;

    while n_iterations < max_iters {
        n_iterations += 1;

        let (mut new_labels, mut new_dists) = find_nearest_centroids(data, &centroids.view());
        n_reseeded += reseed_empty_clusters(&mut new_labels, &mut new_dists, k);

        if new_labels == labels {
            converged = true;
            break;
        }

        labels = new_labels;
        let (means, _) = cluster_means(data, &labels.view(), k);
        centroids = means;
        tot_withinss = within_sum_of_squares(data, &labels.view(), &centroids.view()).sum();
        history.push(tot_withinss);

        trace!(
            "  Iteration {}/{}: tot.withinss = {:.6}",
            n_iterations,
            max_iters,
            tot_withinss
        );
    }

    LloydRun {
        centroids,
        labels,
        tot_withinss,
        trace: history,
        n_iterations,
        converged,
        n_reseeded,
    }
}

/// Run `n_restarts` independent Lloyd runs and keep the one with the lowest
/// total within-cluster sum of squares (earliest restart on ties).
///
/// Restart `r` draws from stream `r` of `seed`, so the outcome does not
/// depend on how rayon schedules the runs.
pub(crate) fn lloyd_restarts(
    data: &ArrayView2<f64>,
    k: usize,
    max_iters: usize,
    n_restarts: usize,
    seed: u64,
) -> Option<LloydRun> {
    let runs: Vec<LloydRun> = (0..n_restarts)
        .into_par_iter()
        .map(|restart| {
            let mut rng = substream(seed, restart as u64);
            lloyd(data, k, max_iters, &mut rng)
        })
        .collect();

    runs.into_iter()
        .reduce(|best, run| {
            if run.tot_withinss < best.tot_withinss {
                run
            } else {
                best
            }
        })
}

/// Initialize centroids by sampling k distinct data points
fn initialize_centroids(data: &ArrayView2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let selected = index::sample(rng, data.nrows(), k);

    let mut centroids = Array2::zeros((k, data.ncols()));
    for (mut centroid, data_idx) in centroids.outer_iter_mut().zip(selected.iter()) {
        centroid.assign(&data.row(data_idx));
    }

    centroids
}

/// Give every empty cluster a member.
///
/// For each empty cluster, in index order, the point farthest from its own
/// centroid (lowest index on ties) is moved into it. Points that are the
/// only member of their cluster are never taken. Returns the number of
/// clusters repaired.
fn reseed_empty_clusters(labels: &mut Array1<usize>, dists: &mut Array1<f64>, k: usize) -> usize {
    let mut sizes = vec![0usize; k];
    for &label in labels.iter() {
        sizes[label] += 1;
    }

    let mut n_reseeded = 0;
    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }

        let mut farthest: Option<(usize, f64)> = None;
        for (i, (&label, &dist)) in labels.iter().zip(dists.iter()).enumerate() {
            if sizes[label] < 2 {
                continue;
            }
            if farthest.map_or(true, |(_, best)| dist > best) {
                farthest = Some((i, dist));
            }
        }

        if let Some((point, _)) = farthest {
            sizes[labels[point]] -= 1;
            sizes[empty] = 1;
            labels[point] = empty;
            dists[point] = 0.0;
            n_reseeded += 1;
        }
    }

    n_reseeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::SeedableRng;

    #[test]
    fn test_initialize_centroids_distinct_rows() {
        let data = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let centroids = initialize_centroids(&data.view(), 5, &mut rng);

        assert_eq!(centroids.dim(), (5, 2));
        let mut firsts: Vec<i64> = centroids.column(0).iter().map(|&v| v as i64).collect();
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), 5);
    }

    #[test]
    fn test_lloyd_trace_non_increasing() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let data = Array2::random_using((200, 6), Uniform::new(0.0, 1.0), &mut rng);

        let run = lloyd(&data.view(), 5, 100, &mut rng);

        for pair in run.trace.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "trace increased: {:?}", pair);
        }
        assert_relative_eq!(*run.trace.last().unwrap(), run.tot_withinss);
    }

    #[test]
    fn test_reseed_moves_farthest_point() {
        // cluster 1 is empty; point 2 is farthest from its centroid
        let mut labels = array![0usize, 0, 0, 2];
        let mut dists = array![0.5, 0.1, 3.0, 0.0];

        let n = reseed_empty_clusters(&mut labels, &mut dists, 3);

        assert_eq!(n, 1);
        assert_eq!(labels.to_vec(), vec![0, 0, 1, 2]);
        assert_relative_eq!(dists[2], 0.0);
    }

    #[test]
    fn test_reseed_never_empties_singletons() {
        // point 4 is the farthest but alone in cluster 3
        let mut labels = array![0usize, 0, 2, 2, 3];
        let mut dists = array![1.0, 2.0, 0.0, 0.0, 9.0];

        reseed_empty_clusters(&mut labels, &mut dists, 4);

        assert_eq!(labels.to_vec(), vec![0, 1, 2, 2, 3]);
    }

    #[test]
    fn test_duplicate_initial_centroids_recover() {
        // rows 0 and 1 are identical; any init that picks both leaves one
        // centroid without members on the first pass
        let data = array![[1.0, 1.0], [1.0, 1.0], [0.0, 0.0], [0.0, 1.0]];
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let run = lloyd(&data.view(), 3, 50, &mut rng);
            let mut sizes = [0usize; 3];
            for &l in run.labels.iter() {
                sizes[l] += 1;
            }
            assert!(sizes.iter().all(|&s| s > 0), "seed {}: {:?}", seed, sizes);
        }
    }

    #[test]
    fn test_restarts_pick_lowest_withinss() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let data = Array2::random_using((60, 3), Uniform::new(0.0, 1.0), &mut rng);

        let best = lloyd_restarts(&data.view(), 4, 100, 8, 11).unwrap();
        for restart in 0..8 {
            let mut rng = substream(11, restart);
            let run = lloyd(&data.view(), 4, 100, &mut rng);
            assert!(best.tot_withinss <= run.tot_withinss + 1e-12);
        }
    }
}
