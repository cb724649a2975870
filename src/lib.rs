//! # custseg-rs
//!
//! Customer segmentation on binary purchase matrices (which discount offers
//! each customer accepted), built on ndarray.
//!
//! ## Features
//!
//! - **Partitional clustering**: k-means (Lloyd, seeded restarts, deterministic
//!   empty-cluster repair) and k-medoids (PAM BUILD/SWAP)
//! - **Hierarchical clustering**: complete linkage with fixed-k and
//!   fixed-height cuts
//! - **Choosing k**: gap statistic with the `Tibs2001SEmax` rule, and the
//!   within-cluster sum of squares elbow
//! - **PCA**: principal components for 2-D coordinates and variance reports
//! - **Reproducible parallelism**: rayon everywhere, with every parallel task
//!   drawing from its own ChaCha stream derived from the seed
//!
//! ## Example
//!
//! ```rust
//! use custseg::{GapConfig, GapRule, GapStatistic, KMeans, KMeansConfig, Pca, PurchaseMatrix, Transaction};
//!
//! let transactions = vec![
//!     Transaction::new("Adams", 1), Transaction::new("Adams", 2),
//!     Transaction::new("Baker", 1), Transaction::new("Baker", 2),
//!     Transaction::new("Clark", 1), Transaction::new("Clark", 2),
//!     Transaction::new("Davis", 3), Transaction::new("Davis", 4),
//!     Transaction::new("Evans", 3), Transaction::new("Evans", 4),
//!     Transaction::new("Fox", 3),
//! ];
//! let matrix = PurchaseMatrix::from_transactions(&transactions, &[1, 2, 3, 4]).unwrap();
//!
//! let kmeans = KMeans::with_config(KMeansConfig::new(2).with_seed(1).with_restarts(5));
//! let result = kmeans.fit(&matrix.view()).unwrap();
//! assert_eq!(result.labels()[0], result.labels()[2]);
//! assert_ne!(result.labels()[0], result.labels()[3]);
//!
//! let gap = GapStatistic::with_config(GapConfig::new(2).with_bootstrap(20).with_seed(7));
//! let analysis = gap.evaluate(&matrix.view(), &kmeans).unwrap();
//! assert_eq!(analysis.results().len(), 2);
//! let _k = analysis.optimal_k(GapRule::Tibs2001SeMax);
//!
//! let pca = Pca::new().fit(&matrix.view()).unwrap();
//! let coords = pca.project_default(&result.centroids().view()).unwrap();
//! assert_eq!(coords.dim(), (2, 2));
//! ```

// Link BLAS libraries when features are enabled
#[cfg(feature = "accelerate")]
extern crate accelerate_src;

#[cfg(feature = "openblas")]
extern crate openblas_src;

mod algorithm;
mod config;
mod distance;
mod elbow;
mod engine;
mod error;
mod gap;
mod hierarchical;
mod kmeans;
mod kmedoids;
mod matrix;
mod pca;
mod profile;
mod result;
mod rng;

pub use config::{
    GapConfig, KMeansConfig, KMedoidsConfig, MedoidInit, PcaConfig, ReferenceDistribution,
};
pub use distance::{euclidean, pairwise_distances, squared_euclidean, total_sum_of_squares};
pub use elbow::{elbow_curve, elbow_k, ElbowPoint};
pub use engine::PartitionalEngine;
pub use error::{Result, SegmentError};
pub use gap::{GapAnalysis, GapResult, GapRule, GapStatistic};
pub use hierarchical::{Dendrogram, Hierarchical, Merge};
pub use kmeans::KMeans;
pub use kmedoids::KMedoids;
pub use matrix::{Offer, PurchaseMatrix, Transaction};
pub use pca::{Pca, PcaModel};
pub use profile::ClusterProfile;
pub use result::{ClusterMetrics, ClusterResult};
