//! Gap statistic for choosing the number of clusters.
//!
//! For each k the observed log-dispersion `log(W_k)` is compared with its
//! expectation under a null reference distribution estimated from `B`
//! reference datasets:
//!
//! ```text
//! Gap(k) = (1/B) Σ_b log(W*_kb) − log(W_k)
//! s_k    = sd_b(log(W*_kb)) · sqrt(1 + 1/B)
//! ```
//!
//! # References
//!
//! - R. Tibshirani, G. Walther and T. Hastie (2001), "Estimating the number of
//!   clusters in a data set via the gap statistic"

use crate::config::{GapConfig, PcaConfig, ReferenceDistribution};
use crate::engine::PartitionalEngine;
use crate::error::{Result, SegmentError};
use crate::pca::{Pca, PcaModel};
use crate::rng::{derive_seed, substream};
use log::{log, Level};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;

/// Gap statistic for one candidate k
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapResult {
    pub k: usize,
    /// Observed log-dispersion, `ln(tot.withinss)`
    pub log_w: f64,
    /// Mean reference log-dispersion
    pub e_log_w: f64,
    /// Standard error of the reference log-dispersions, scaled by sqrt(1 + 1/B)
    pub se_sim: f64,
    /// `e_log_w - log_w`
    pub gap: f64,
}

/// Rule for turning a gap curve into a cluster count, after `cluster::maxSE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapRule {
    /// Smallest k with `gap(k) >= gap(k+1) - se(k+1)`
    #[default]
    Tibs2001SeMax,
    /// Smallest k within one standard error of the first local maximum
    FirstSeMax,
    /// Smallest k within one standard error of the global maximum
    GlobalSeMax,
    /// First local maximum (k_max if the curve never decreases)
    FirstMax,
    /// Global maximum
    GlobalMax,
}

/// Gap statistics for k = 1..=k_max, in order of k
#[derive(Debug, Clone)]
pub struct GapAnalysis {
    results: Vec<GapResult>,
    n_bootstrap: usize,
}

impl GapAnalysis {
    pub fn results(&self) -> &[GapResult] {
        &self.results
    }

    pub fn n_bootstrap(&self) -> usize {
        self.n_bootstrap
    }

    pub fn gaps(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.gap).collect()
    }

    /// Pick the number of clusters with `rule`.
    ///
    /// # Errors
    ///
    /// Returns `NoSolution` when [`GapRule::Tibs2001SeMax`] finds no k below
    /// k_max satisfying its criterion; callers can raise k_max or fall back
    /// to the elbow of the dispersion curve.
    pub fn optimal_k(&self, rule: GapRule) -> Result<usize> {
        let r = &self.results;
        if r.is_empty() {
            return Err(SegmentError::NoSolution("no gap results".to_string()));
        }

        let k_at = |i: usize| r[i].k;
        let first_within_se = |target: usize| {
            let threshold = r[target].gap - r[target].se_sim;
            (0..r.len())
                .find(|&i| r[i].gap >= threshold)
                .map_or(k_at(target), k_at)
        };
        let global_max = || {
            (1..r.len()).fold(0, |best, i| if r[i].gap > r[best].gap { i } else { best })
        };
        let first_max = || {
            (0..r.len() - 1)
                .find(|&i| r[i + 1].gap <= r[i].gap)
                .unwrap_or(r.len() - 1)
        };

        match rule {
            GapRule::Tibs2001SeMax => (0..r.len() - 1)
                .find(|&i| r[i].gap >= r[i + 1].gap - r[i + 1].se_sim)
                .map(k_at)
                .ok_or_else(|| {
                    SegmentError::NoSolution(format!(
                        "no k below k_max={} satisfies gap(k) >= gap(k+1) - se(k+1)",
                        k_at(r.len() - 1)
                    ))
                }),
            GapRule::FirstSeMax => Ok(first_within_se(first_max())),
            GapRule::GlobalSeMax => Ok(first_within_se(global_max())),
            GapRule::FirstMax => Ok(k_at(first_max())),
            GapRule::GlobalMax => Ok(k_at(global_max())),
        }
    }
}

/// Bootstrap estimator of the optimal cluster count, usable with any
/// [`PartitionalEngine`].
#[derive(Debug, Clone)]
pub struct GapStatistic {
    config: GapConfig,
}

impl GapStatistic {
    pub fn new(k_max: usize) -> Self {
        Self {
            config: GapConfig::new(k_max),
        }
    }

    pub fn with_config(config: GapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GapConfig {
        &self.config
    }

    /// Compute the gap statistic for k = 1..=k_max.
    ///
    /// Reference dataset `b` is drawn once from stream `b` of the seed and
    /// reused for every k. The engine fit for (k, b) gets its own derived
    /// seed, so the output depends only on the seed, the data and the
    /// parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `k_max` is 0 or not below the number of
    ///   points, or `n_bootstrap < 2`
    /// - any error raised by the engine
    pub fn evaluate<E>(&self, data: &ArrayView2<f64>, engine: &E) -> Result<GapAnalysis>
    where
        E: PartitionalEngine + ?Sized,
    {
        let config = &self.config;
        let n_samples = data.nrows();

        if config.k_max == 0 || config.k_max >= n_samples {
            return Err(SegmentError::InvalidParameter(format!(
                "k_max must be in 1..{}, got {}",
                n_samples, config.k_max
            )));
        }
        if config.n_bootstrap < 2 {
            return Err(SegmentError::InvalidParameter(format!(
                "n_bootstrap must be at least 2, got {}",
                config.n_bootstrap
            )));
        }

        let sampler = ReferenceSampler::new(data, config.reference)?;
        let references: Vec<Array2<f64>> = (0..config.n_bootstrap)
            .into_par_iter()
            .map(|b| sampler.sample(&mut substream(config.seed, b as u64)))
            .collect::<Result<_>>()?;

        let level = if config.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        let b_f = config.n_bootstrap as f64;
        let mut results = Vec::with_capacity(config.k_max);

        for k in 1..=config.k_max {
            let observed = engine.fit_k(data, k, derive_seed(config.seed, k as u64, 0))?;
            let log_w = observed.metrics().tot_withinss.ln();

            let ref_log_w: Vec<f64> = references
                .par_iter()
                .enumerate()
                .map(|(b, reference)| {
                    let seed = derive_seed(config.seed, k as u64, b as u64 + 1);
                    engine
                        .fit_k(&reference.view(), k, seed)
                        .map(|fit| fit.metrics().tot_withinss.ln())
                })
                .collect::<Result<_>>()?;

            let e_log_w = ref_log_w.iter().sum::<f64>() / b_f;
            let variance =
                ref_log_w.iter().map(|l| (l - e_log_w).powi(2)).sum::<f64>() / (b_f - 1.0);
            let se_sim = variance.sqrt() * (1.0 + 1.0 / b_f).sqrt();
            let gap = e_log_w - log_w;

            log!(
                level,
                "gap[{}] k={}: logW={:.4}, E.logW={:.4}, gap={:.4}, SE={:.4}",
                engine.name(),
                k,
                log_w,
                e_log_w,
                gap,
                se_sim
            );

            results.push(GapResult {
                k,
                log_w,
                e_log_w,
                se_sim,
                gap,
            });
        }

        Ok(GapAnalysis {
            results,
            n_bootstrap: config.n_bootstrap,
        })
    }
}

/// Draws reference datasets with the data's shape from the null model
enum ReferenceSampler {
    BoundingBox {
        shape: (usize, usize),
        low: Array1<f64>,
        span: Array1<f64>,
    },
    ScaledPca {
        model: PcaModel,
        n_samples: usize,
        low: Array1<f64>,
        span: Array1<f64>,
    },
}

impl ReferenceSampler {
    fn new(data: &ArrayView2<f64>, reference: ReferenceDistribution) -> Result<Self> {
        match reference {
            ReferenceDistribution::BoundingBox => {
                let (low, span) = column_ranges(data);
                Ok(Self::BoundingBox {
                    shape: data.dim(),
                    low,
                    span,
                })
            }
            ReferenceDistribution::ScaledPca => {
                let model = Pca::with_config(PcaConfig::default().with_components(1)).fit(data)?;
                let rotated = model.project(data, model.n_features())?;
                let (low, span) = column_ranges(&rotated.view());
                Ok(Self::ScaledPca {
                    model,
                    n_samples: data.nrows(),
                    low,
                    span,
                })
            }
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Result<Array2<f64>> {
        match self {
            Self::BoundingBox { shape, low, span } => Ok(uniform_box(*shape, low, span, rng)),
            Self::ScaledPca {
                model,
                n_samples,
                low,
                span,
            } => {
                let rotated = uniform_box((*n_samples, low.len()), low, span, rng);
                model.reconstruct(&rotated.view())
            }
        }
    }
}

/// Per-column minimum and range
fn column_ranges(data: &ArrayView2<f64>) -> (Array1<f64>, Array1<f64>) {
    let low = data.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v));
    let high = data.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v));
    let span = &high - &low;
    (low, span)
}

/// Independent uniform draws per column within `[low, low + span]`, row-major
fn uniform_box<R: Rng>(
    shape: (usize, usize),
    low: &Array1<f64>,
    span: &Array1<f64>,
    rng: &mut R,
) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(_, j)| low[j] + rng.gen::<f64>() * span[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::KMeans;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn analysis(gaps: &[(f64, f64)]) -> GapAnalysis {
        GapAnalysis {
            results: gaps
                .iter()
                .enumerate()
                .map(|(i, &(gap, se_sim))| GapResult {
                    k: i + 1,
                    log_w: 0.0,
                    e_log_w: gap,
                    se_sim,
                    gap,
                })
                .collect(),
            n_bootstrap: 10,
        }
    }

    #[test]
    fn test_tibs_rule_picks_first_within_se() {
        let a = analysis(&[(0.1, 0.05), (0.5, 0.05), (0.52, 0.05), (0.4, 0.05)]);
        // k=1: 0.1 >= 0.5 - 0.05? no. k=2: 0.5 >= 0.52 - 0.05? yes
        assert_eq!(a.optimal_k(GapRule::Tibs2001SeMax).unwrap(), 2);
    }

    #[test]
    fn test_tibs_rule_no_solution() {
        let a = analysis(&[(0.1, 0.01), (0.3, 0.01), (0.6, 0.01)]);
        assert!(matches!(
            a.optimal_k(GapRule::Tibs2001SeMax),
            Err(SegmentError::NoSolution(_))
        ));
        // the other rules always answer
        assert_eq!(a.optimal_k(GapRule::FirstMax).unwrap(), 3);
        assert_eq!(a.optimal_k(GapRule::GlobalMax).unwrap(), 3);
    }

    #[test]
    fn test_max_rules() {
        let a = analysis(&[(0.2, 0.1), (0.5, 0.1), (0.45, 0.1), (0.7, 0.3), (0.6, 0.1)]);
        assert_eq!(a.optimal_k(GapRule::FirstMax).unwrap(), 2);
        assert_eq!(a.optimal_k(GapRule::GlobalMax).unwrap(), 4);
        // global max 0.7 - 0.3 = 0.4: k=2 is the first at or above
        assert_eq!(a.optimal_k(GapRule::GlobalSeMax).unwrap(), 2);
        // first max 0.5 - 0.1 = 0.4: k=2
        assert_eq!(a.optimal_k(GapRule::FirstSeMax).unwrap(), 2);
    }

    #[test]
    fn test_bounding_box_reference_stays_in_range() {
        let data = array![[0.0, 5.0, 1.0], [1.0, 7.0, 1.0], [0.5, 6.0, 1.0]];
        let sampler = ReferenceSampler::new(&data.view(), ReferenceDistribution::BoundingBox).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let reference = sampler.sample(&mut rng).unwrap();

        assert_eq!(reference.dim(), (3, 3));
        for row in reference.outer_iter() {
            assert!((0.0..=1.0).contains(&row[0]));
            assert!((5.0..=7.0).contains(&row[1]));
            assert_relative_eq!(row[2], 1.0);
        }
    }

    #[test]
    fn test_scaled_pca_reference_shape() {
        let data = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.1], [3.0, 2.9]];
        let sampler = ReferenceSampler::new(&data.view(), ReferenceDistribution::ScaledPca).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let reference = sampler.sample(&mut rng).unwrap();

        assert_eq!(reference.dim(), (4, 2));
        // points stay close to the principal axis y = x
        for row in reference.outer_iter() {
            assert!((row[0] - row[1]).abs() < 0.5);
        }
    }

    #[test]
    fn test_evaluate_parameter_checks() {
        let data = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let engine = KMeans::new(1);

        let err = GapStatistic::new(0).evaluate(&data.view(), &engine);
        assert!(matches!(err, Err(SegmentError::InvalidParameter(_))));

        let err = GapStatistic::new(4).evaluate(&data.view(), &engine);
        assert!(matches!(err, Err(SegmentError::InvalidParameter(_))));

        let err = GapStatistic::with_config(GapConfig::new(2).with_bootstrap(1))
            .evaluate(&data.view(), &engine);
        assert!(matches!(err, Err(SegmentError::InvalidParameter(_))));
    }

    #[test]
    fn test_evaluate_one_result_per_k() {
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1]
        ];
        let gap = GapStatistic::with_config(GapConfig::new(4).with_bootstrap(5).with_seed(3));
        let analysis = gap.evaluate(&data.view(), &KMeans::new(1)).unwrap();

        let ks: Vec<usize> = analysis.results().iter().map(|r| r.k).collect();
        assert_eq!(ks, vec![1, 2, 3, 4]);
        for r in analysis.results() {
            assert!(r.se_sim >= 0.0);
            assert_relative_eq!(r.gap, r.e_log_w - r.log_w);
        }
    }
}
