use thiserror::Error;

/// Error types for the segmentation engines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// A parameter is out of range (k outside [1, n_points], zero counts,
    /// mismatched dimensionality, unknown offer ids, non-binary cells)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The data cannot support the requested computation (too few points,
    /// zero total variance, every point identical)
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// The iteration cap was reached before the assignment stabilised.
    ///
    /// Fits never return this directly; it is produced by
    /// [`ClusterResult::require_converged`](crate::ClusterResult::require_converged).
    #[error("Did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// A k-selection rule found no qualifying cluster count
    #[error("No solution: {0}")]
    NoSolution(String),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SegmentError>;
