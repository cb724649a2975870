use crate::config::PcaConfig;
use crate::distance::column_means;
use crate::error::{Result, SegmentError};
use log::debug;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use std::cmp::Ordering;

/// Principal component analysis by eigen-decomposition of the covariance
/// matrix.
#[derive(Debug, Clone, Default)]
pub struct Pca {
    config: PcaConfig,
}

/// A fitted PCA: loading vectors, their variances and the centering vector.
///
/// Components are the columns of [`components`](Self::components), ordered
/// by non-increasing explained variance and mutually orthonormal. Each
/// component's sign is fixed so that its largest absolute loading is positive.
#[derive(Debug, Clone)]
pub struct PcaModel {
    /// Shape (n_features, n_features)
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    mean: Array1<f64>,
    n_components: usize,
}

impl Pca {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PcaConfig) -> Self {
        Self { config }
    }

    /// Fit the principal components of `data`.
    ///
    /// Columns with zero variance are valid; they receive ~0 loadings.
    ///
    /// # Errors
    ///
    /// - `DegenerateInput` if there are fewer than 2 points or the total
    ///   variance is zero
    /// - `InvalidParameter` if the data has no columns or non-finite values
    ///
    /// The configured `n_components` only sets the default for
    /// [`PcaModel::project_default`] and is capped at the number of features.
    pub fn fit(&self, data: &ArrayView2<f64>) -> Result<PcaModel> {
        let (n_samples, n_features) = data.dim();

        if n_samples < 2 {
            return Err(SegmentError::DegenerateInput(format!(
                "PCA needs at least 2 points, got {}",
                n_samples
            )));
        }
        if n_features == 0 {
            return Err(SegmentError::InvalidParameter(
                "PCA needs at least one feature".to_string(),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::InvalidParameter(
                "Data contains non-finite values".to_string(),
            ));
        }

        let mean = if self.config.center {
            column_means(data)
        } else {
            Array1::zeros(n_features)
        };
        let centered = data - &mean;
        let covariance = centered.t().dot(&centered) / (n_samples - 1) as f64;

        let total_variance = covariance.diag().sum();
        if total_variance <= 0.0 {
            return Err(SegmentError::DegenerateInput(
                "Total variance is zero".to_string(),
            ));
        }

        let eigen = SymmetricEigen::new(DMatrix::from_fn(n_features, n_features, |i, j| {
            covariance[[i, j]]
        }));

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let mut components = Array2::zeros((n_features, n_features));
        let mut explained_variance = Array1::zeros(n_features);
        for (dst, &src) in order.iter().enumerate() {
            explained_variance[dst] = eigen.eigenvalues[src].max(0.0);

            let column = eigen.eigenvectors.column(src);
            let pivot = column
                .iter()
                .copied()
                .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            for (i, &v) in column.iter().enumerate() {
                components[[i, dst]] = sign * v;
            }
        }

        debug!(
            "PCA: {} samples, {} features, first component explains {:.4} of variance",
            n_samples,
            n_features,
            explained_variance[0] / explained_variance.sum()
        );

        Ok(PcaModel {
            components,
            explained_variance,
            mean,
            n_components: self.config.n_components.min(n_features),
        })
    }
}

impl PcaModel {
    /// Loading vectors as columns, shape (n_features, n_features)
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Variance along each component (covariance eigenvalues)
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Share of total variance per component; sums to 1
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.explained_variance.sum();
        self.explained_variance.mapv(|v| v / total)
    }

    /// Running total of [`explained_variance_ratio`](Self::explained_variance_ratio)
    pub fn cumulative_variance_ratio(&self) -> Array1<f64> {
        let mut ratio = self.explained_variance_ratio();
        ratio.accumulate_axis_inplace(Axis(0), |&prev, cur| *cur += prev);
        ratio
    }

    /// Centering vector subtracted before projection
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn n_features(&self) -> usize {
        self.components.nrows()
    }

    /// Project points onto the first `n_components` components.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the points' dimensionality differs from
    /// the model's or `n_components` is not in `1..=n_features`.
    pub fn project(&self, points: &ArrayView2<f64>, n_components: usize) -> Result<Array2<f64>> {
        if points.ncols() != self.n_features() {
            return Err(SegmentError::InvalidParameter(format!(
                "Expected {} features, got {}",
                self.n_features(),
                points.ncols()
            )));
        }
        if n_components == 0 || n_components > self.n_features() {
            return Err(SegmentError::InvalidParameter(format!(
                "n_components must be in 1..={}, got {}",
                self.n_features(),
                n_components
            )));
        }

        let centered = points - &self.mean;
        Ok(centered.dot(&self.components.slice(s![.., ..n_components])))
    }

    /// Project onto the configured number of components (2 by default, for
    /// scatter plots, or fewer when the data has fewer features).
    ///
    /// # Errors
    ///
    /// As [`project`](Self::project); a configured `n_components` of 0 is
    /// rejected here.
    pub fn project_default(&self, points: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.project(points, self.n_components)
    }

    /// Map projected coordinates back to the original feature space.
    ///
    /// With all components this reproduces the input up to rounding.
    pub fn reconstruct(&self, projected: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let m = projected.ncols();
        if m == 0 || m > self.n_features() {
            return Err(SegmentError::InvalidParameter(format!(
                "Projected data must have 1..={} columns, got {}",
                self.n_features(),
                m
            )));
        }

        let restored = projected.dot(&self.components.slice(s![.., ..m]).t());
        Ok(restored + &self.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pca_line_has_one_component() {
        let data = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let model = Pca::new().fit(&data.view()).unwrap();

        let ratio = model.explained_variance_ratio();
        assert_relative_eq!(ratio[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio[1], 0.0, epsilon = 1e-12);

        let first = model.components().column(0);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(first[0], h, epsilon = 1e-12);
        assert_relative_eq!(first[1], h, epsilon = 1e-12);
    }

    #[test]
    fn test_pca_components_orthonormal_and_ordered() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let data = Array2::random_using((50, 5), Uniform::new(0.0, 1.0), &mut rng);
        let model = Pca::new().fit(&data.view()).unwrap();

        let gram = model.components().t().dot(model.components());
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }

        let var = model.explained_variance();
        for i in 1..5 {
            assert!(var[i] <= var[i - 1]);
        }
        assert_relative_eq!(model.explained_variance_ratio().sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.cumulative_variance_ratio()[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pca_zero_variance_column_allowed() {
        let data = array![[1.0, 0.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let model = Pca::new().fit(&data.view()).unwrap();

        assert_abs_diff_eq!(model.components()[[1, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pca_degenerate_inputs() {
        let single = array![[1.0, 2.0]];
        assert!(matches!(
            Pca::new().fit(&single.view()),
            Err(SegmentError::DegenerateInput(_))
        ));

        let constant = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        assert!(matches!(
            Pca::new().fit(&constant.view()),
            Err(SegmentError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_pca_single_offer_column() {
        let data = array![[0.0], [1.0], [1.0]];
        let model = Pca::new().fit(&data.view()).unwrap();

        assert_eq!(model.n_features(), 1);
        assert_relative_eq!(model.components()[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.explained_variance()[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(model.explained_variance_ratio()[0], 1.0, epsilon = 1e-12);

        let coords = model.project_default(&data.view()).unwrap();
        assert_eq!(coords.dim(), (3, 1));
        assert_relative_eq!(coords[[0, 0]], -2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pca_zero_components_rejected_on_projection() {
        let data = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let model = Pca::with_config(PcaConfig::default().with_components(0))
            .fit(&data.view())
            .unwrap();

        assert!(matches!(
            model.project_default(&data.view()),
            Err(SegmentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_pca_project_validates_dimensions() {
        let data = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]];
        let model = Pca::new().fit(&data.view()).unwrap();

        assert_eq!(model.project_default(&data.view()).unwrap().dim(), (3, 2));
        assert!(matches!(
            model.project(&array![[1.0, 0.0]].view(), 2),
            Err(SegmentError::InvalidParameter(_))
        ));
        assert!(matches!(
            model.project(&data.view(), 4),
            Err(SegmentError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_pca_uncentered() {
        let data = array![[1.0, 0.0], [3.0, 0.0]];
        let model = Pca::with_config(PcaConfig::default().with_center(false))
            .fit(&data.view())
            .unwrap();

        assert_eq!(model.mean().to_vec(), vec![0.0, 0.0]);
        assert_relative_eq!(model.components()[[0, 0]], 1.0, epsilon = 1e-12);
    }
}
