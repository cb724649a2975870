use crate::distance::count_distinct_rows;
use crate::error::{Result, SegmentError};
use crate::result::ClusterResult;
use ndarray::ArrayView2;

/// Common interface for engines that partition points into exactly `k` groups.
///
/// The gap statistic and the elbow curve only need this capability, so any
/// engine (k-means, PAM, a dendrogram cut) can back them.
pub trait PartitionalEngine: Sync {
    /// Partition `data` into `k` clusters using `seed` for any randomness.
    fn fit_k(&self, data: &ArrayView2<f64>, k: usize, seed: u64) -> Result<ClusterResult>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// Reject cluster counts a partition of `data` cannot satisfy.
pub(crate) fn validate_k(data: &ArrayView2<f64>, k: usize) -> Result<()> {
    let n_samples = data.nrows();

    if k == 0 {
        return Err(SegmentError::InvalidParameter(
            "k must be greater than 0".to_string(),
        ));
    }

    if n_samples < k {
        return Err(SegmentError::InvalidParameter(format!(
            "Number of samples ({}) is less than k ({})",
            n_samples, k
        )));
    }

    if data.iter().any(|v| !v.is_finite()) {
        return Err(SegmentError::InvalidParameter(
            "Data contains non-finite values".to_string(),
        ));
    }

    // repeated rows are fine: empty-cluster repair and medoid self-assignment
    // still give k non-empty groups
    if k > 1 && count_distinct_rows(data) < 2 {
        return Err(SegmentError::DegenerateInput(format!(
            "All {} points are identical; cannot form {} clusters",
            n_samples, k
        )));
    }

    Ok(())
}
