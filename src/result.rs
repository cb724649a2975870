use crate::distance::{
    cluster_means, find_nearest_centroids, total_sum_of_squares, within_sum_of_squares,
};
use crate::error::{Result, SegmentError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Scalar quality summaries of a partition.
///
/// Dispersion is measured about the cluster means for every engine, so the
/// numbers are comparable between k-means, PAM and hierarchical cuts.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMetrics {
    /// Within-cluster sum of squares, per cluster
    pub withinss: Array1<f64>,
    /// Sum of `withinss`
    pub tot_withinss: f64,
    /// Sum of squared distances of all points to the global mean
    pub totss: f64,
    /// `totss - tot_withinss`
    pub betweenss: f64,
}

impl ClusterMetrics {
    /// Compute the metrics of an assignment of `data` into `k` clusters
    pub fn compute(data: &ArrayView2<f64>, labels: &ArrayView1<usize>, k: usize) -> Self {
        let (means, _) = cluster_means(data, labels, k);
        let withinss = within_sum_of_squares(data, labels, &means.view());
        let tot_withinss = withinss.sum();
        let totss = total_sum_of_squares(data);
        Self {
            withinss,
            tot_withinss,
            totss,
            betweenss: totss - tot_withinss,
        }
    }

    /// Share of the total sum of squares explained by the partition
    /// (`betweenss / totss`), 0 when the data has no spread
    pub fn explained_ratio(&self) -> f64 {
        if self.totss > 0.0 {
            self.betweenss / self.totss
        } else {
            0.0
        }
    }
}

/// Output of a partitional fit: assignment, representatives and metrics.
///
/// Labels are zero-based indices into the rows of [`centroids`](Self::centroids).
#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub(crate) labels: Array1<usize>,
    pub(crate) centroids: Array2<f64>,
    pub(crate) medoids: Option<Vec<usize>>,
    pub(crate) metrics: ClusterMetrics,
    pub(crate) objective: f64,
    pub(crate) objective_trace: Vec<f64>,
    pub(crate) n_iterations: usize,
    pub(crate) converged: bool,
}

impl ClusterResult {
    /// Wrap an arbitrary assignment with cluster means and metrics.
    ///
    /// Used for assignments that do not come with their own representatives,
    /// such as a dendrogram cut. The objective is the total within-cluster
    /// sum of squares.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the label count differs from the point
    /// count, or if any of the clusters `0..k` is empty.
    pub fn from_labels(data: &ArrayView2<f64>, labels: Array1<usize>) -> Result<Self> {
        if labels.len() != data.nrows() {
            return Err(SegmentError::InvalidParameter(format!(
                "Expected {} labels, got {}",
                data.nrows(),
                labels.len()
            )));
        }
        let k = labels.iter().max().map_or(0, |&m| m + 1);
        let (centroids, counts) = cluster_means(data, &labels.view(), k);
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(SegmentError::InvalidParameter(format!(
                "Cluster {} has no members",
                empty
            )));
        }
        let metrics = ClusterMetrics::compute(data, &labels.view(), k);
        let objective = metrics.tot_withinss;

        Ok(Self {
            labels,
            centroids,
            medoids: None,
            metrics,
            objective,
            objective_trace: vec![objective],
            n_iterations: 0,
            converged: true,
        })
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    /// Zero-based cluster label of every point
    pub fn labels(&self) -> &Array1<usize> {
        &self.labels
    }

    /// Labels in `1..=k`, the presentation used by reports
    pub fn one_based_labels(&self) -> Array1<usize> {
        self.labels.mapv(|l| l + 1)
    }

    /// Cluster representatives, one row per cluster (means for k-means,
    /// medoid rows for PAM)
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Row indices of the medoids, for PAM results
    pub fn medoids(&self) -> Option<&[usize]> {
        self.medoids.as_deref()
    }

    pub fn metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }

    /// Value of the engine's own objective: total within-cluster sum of
    /// squares for k-means, total distance to medoids for PAM
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Objective after each iteration of the winning run
    pub fn objective_trace(&self) -> &[f64] {
        &self.objective_trace
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Whether the fit stabilised before its iteration cap
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Turn a capped fit into an error, for callers that want to retry with
    /// more iterations or restarts.
    pub fn require_converged(&self) -> Result<&Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(SegmentError::NonConvergence {
                iterations: self.n_iterations,
            })
        }
    }

    /// Number of points in each cluster
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    /// Indices of the points assigned to `cluster`, in row order
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == cluster)
            .map(|(i, _)| i)
            .collect()
    }

    /// Assign new points to their nearest representative.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the points' dimensionality differs from
    /// the centroids'.
    pub fn predict(&self, points: &ArrayView2<f64>) -> Result<Array1<usize>> {
        if points.ncols() != self.centroids.ncols() {
            return Err(SegmentError::InvalidParameter(format!(
                "Expected {} features, got {}",
                self.centroids.ncols(),
                points.ncols()
            )));
        }
        let (labels, _) = find_nearest_centroids(points, &self.centroids.view());
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_metrics_single_cluster() {
        let data = array![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [2.0, 2.0]];
        let labels = array![0usize, 0, 0, 0];
        let metrics = ClusterMetrics::compute(&data.view(), &labels.view(), 1);

        assert_relative_eq!(metrics.tot_withinss, metrics.totss);
        assert_relative_eq!(metrics.betweenss, 0.0);
        assert_relative_eq!(metrics.explained_ratio(), 0.0);
    }

    #[test]
    fn test_from_labels() {
        let data = array![[0.0, 0.0], [0.0, 2.0], [10.0, 0.0], [10.0, 2.0]];
        let result = ClusterResult::from_labels(&data.view(), array![0, 0, 1, 1]).unwrap();

        assert_eq!(result.k(), 2);
        assert_eq!(result.sizes(), vec![2, 2]);
        assert_eq!(result.members(1), vec![2, 3]);
        assert_relative_eq!(result.centroids()[[1, 0]], 10.0);
        assert_relative_eq!(result.metrics().tot_withinss, 4.0);
        assert_relative_eq!(result.metrics().totss, 104.0);
        assert_eq!(result.one_based_labels().to_vec(), vec![1, 1, 2, 2]);
        assert!(result.require_converged().is_ok());
    }

    #[test]
    fn test_from_labels_rejects_gaps() {
        let data = array![[0.0], [1.0]];
        let result = ClusterResult::from_labels(&data.view(), array![0, 2]);
        assert!(matches!(result, Err(SegmentError::InvalidParameter(_))));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let data = array![[0.0, 0.0], [1.0, 1.0]];
        let result = ClusterResult::from_labels(&data.view(), array![0, 1]).unwrap();

        let labels = result.predict(&array![[0.9, 0.8]].view()).unwrap();
        assert_eq!(labels[0], 1);

        let err = result.predict(&array![[0.0, 0.0, 0.0]].view());
        assert!(matches!(err, Err(SegmentError::InvalidParameter(_))));
    }

    #[test]
    fn test_require_converged_flags_cap() {
        let data = array![[0.0], [1.0]];
        let mut result = ClusterResult::from_labels(&data.view(), array![0, 1]).unwrap();
        result.converged = false;
        result.n_iterations = 3;
        assert_eq!(
            result.require_converged().unwrap_err(),
            SegmentError::NonConvergence { iterations: 3 }
        );
    }
}
