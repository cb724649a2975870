use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::HashSet;

/// Squared Euclidean distance between two points
#[inline]
pub fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance between two points
#[inline]
pub fn euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Find the nearest centroid for each data point.
///
/// Distances are computed directly rather than through the norm expansion so
/// that exact ties (common on 0/1 data) stay exact; ties go to the lowest
/// centroid index.
///
/// # Returns
/// * `labels` - Cluster assignments for each data point (n_data,)
/// * `dists` - Squared distance of each point to its assigned centroid (n_data,)
pub fn find_nearest_centroids(
    data: &ArrayView2<f64>,
    centroids: &ArrayView2<f64>,
) -> (Array1<usize>, Array1<f64>) {
    let (labels, dists): (Vec<usize>, Vec<f64>) = (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut best_label = 0;
            let mut best_dist = f64::INFINITY;
            for (j, centroid) in centroids.outer_iter().enumerate() {
                let dist = squared_euclidean(&row, &centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best_label = j;
                }
            }
            (best_label, best_dist)
        })
        .unzip();

    (Array1::from_vec(labels), Array1::from_vec(dists))
}

/// Full symmetric matrix of pairwise Euclidean distances
pub fn pairwise_distances(data: &ArrayView2<f64>) -> Array2<f64> {
    let n = data.nrows();
    let rows: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row = data.row(i);
            (0..n).map(move |j| euclidean(&row, &data.row(j)))
        })
        .collect();

    // Shape always matches the collected length
    Array2::from_shape_vec((n, n), rows).unwrap_or_else(|_| Array2::zeros((n, n)))
}

/// Column means of a matrix; zero vector for an empty matrix
pub fn column_means(data: &ArrayView2<f64>) -> Array1<f64> {
    data.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()))
}

/// Sum of squared distances of every point to the global mean (totss)
pub fn total_sum_of_squares(data: &ArrayView2<f64>) -> f64 {
    let mean = column_means(data);
    data.outer_iter()
        .map(|row| squared_euclidean(&row, &mean.view()))
        .sum()
}

/// Component-wise mean of the points assigned to each cluster.
///
/// Returns the means and the number of members per cluster; the row of an
/// empty cluster is left at zero.
pub fn cluster_means(
    data: &ArrayView2<f64>,
    labels: &ArrayView1<usize>,
    k: usize,
) -> (Array2<f64>, Array1<usize>) {
    let n_features = data.ncols();
    let mut sums: Array2<f64> = Array2::zeros((k, n_features));
    let mut counts: Array1<usize> = Array1::zeros(k);

    for (row, &label) in data.outer_iter().zip(labels.iter()) {
        counts[label] += 1;
        let mut sum = sums.row_mut(label);
        sum += &row;
    }

    for (mut sum, &count) in sums.outer_iter_mut().zip(counts.iter()) {
        if count > 0 {
            sum /= count as f64;
        }
    }

    (sums, counts)
}

/// Per-cluster sum of squared distances to the given representatives
pub fn within_sum_of_squares(
    data: &ArrayView2<f64>,
    labels: &ArrayView1<usize>,
    representatives: &ArrayView2<f64>,
) -> Array1<f64> {
    let mut withinss = Array1::zeros(representatives.nrows());
    for (row, &label) in data.outer_iter().zip(labels.iter()) {
        withinss[label] += squared_euclidean(&row, &representatives.row(label));
    }
    withinss
}

/// Number of distinct rows (exact bitwise comparison)
pub fn count_distinct_rows(data: &ArrayView2<f64>) -> usize {
    data.outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}
