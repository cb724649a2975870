use crate::algorithm::lloyd_restarts;
use crate::config::KMeansConfig;
use crate::engine::{validate_k, PartitionalEngine};
use crate::error::{Result, SegmentError};
use crate::result::{ClusterMetrics, ClusterResult};
use log::{log, warn, Level};
use ndarray::ArrayView2;

/// K-means clustering (Lloyd's algorithm) with seeded random initialization
/// and independent restarts.
///
/// # Example
///
/// ```
/// use custseg::{KMeans, KMeansConfig};
/// use ndarray::array;
///
/// let data = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
/// let kmeans = KMeans::with_config(KMeansConfig::new(2).with_seed(1));
///
/// let result = kmeans.fit(&data.view()).unwrap();
/// assert_eq!(result.labels()[0], result.labels()[1]);
/// assert_ne!(result.labels()[0], result.labels()[2]);
/// assert_eq!(result.metrics().tot_withinss, 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    /// Create a new KMeans instance with default configuration.
    pub fn new(k: usize) -> Self {
        Self {
            config: KMeansConfig::new(k),
        }
    }

    /// Create a new KMeans instance with custom configuration.
    pub fn with_config(config: KMeansConfig) -> Self {
        Self { config }
    }

    /// Fit the model to the data.
    ///
    /// # Arguments
    ///
    /// * `data` - Points of shape (n_samples, n_features)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `k` is 0 or larger than the number of samples
    /// - `max_iters` or `n_restarts` is 0
    /// - `k > 1` and every point is identical
    pub fn fit(&self, data: &ArrayView2<f64>) -> Result<ClusterResult> {
        let config = &self.config;
        validate_k(data, config.k)?;

        if config.max_iters == 0 {
            return Err(SegmentError::InvalidParameter(
                "max_iters must be greater than 0".to_string(),
            ));
        }
        if config.n_restarts == 0 {
            return Err(SegmentError::InvalidParameter(
                "n_restarts must be greater than 0".to_string(),
            ));
        }

        let run = lloyd_restarts(
            data,
            config.k,
            config.max_iters,
            config.n_restarts,
            config.seed,
        )
        .ok_or_else(|| SegmentError::InvalidParameter("no restarts ran".to_string()))?;

        let level = if config.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        log!(
            level,
            "k-means: {} samples, {} features, k={}, tot.withinss={:.6} after {} iterations ({} empty clusters reseeded)",
            data.nrows(),
            data.ncols(),
            config.k,
            run.tot_withinss,
            run.n_iterations,
            run.n_reseeded
        );
        if !run.converged {
            warn!(
                "k-means (k={}) reached max_iters={} without converging",
                config.k, config.max_iters
            );
        }

        let metrics = ClusterMetrics::compute(data, &run.labels.view(), config.k);

        Ok(ClusterResult {
            labels: run.labels,
            centroids: run.centroids,
            medoids: None,
            objective: metrics.tot_withinss,
            metrics,
            objective_trace: run.trace,
            n_iterations: run.n_iterations,
            converged: run.converged,
        })
    }

    /// Get the number of clusters.
    pub fn k(&self) -> usize {
        self.config.k
    }

    /// Get the configuration.
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }
}

impl PartitionalEngine for KMeans {
    fn fit_k(&self, data: &ArrayView2<f64>, k: usize, seed: u64) -> Result<ClusterResult> {
        let config = self.config.clone().with_seed(seed);
        KMeans::with_config(KMeansConfig { k, ..config }).fit(data)
    }

    fn name(&self) -> &'static str {
        "k-means"
    }
}
