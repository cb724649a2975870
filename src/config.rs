/// Configuration for the k-means engine
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,

    /// Maximum number of assignment passes per restart
    pub max_iters: usize,

    /// Number of independent restarts. The restart with the lowest total
    /// within-cluster sum of squares is kept (first one on ties).
    pub n_restarts: usize,

    /// Random seed for centroid initialization
    pub seed: u64,

    /// Log fit summaries at info level instead of debug
    pub verbose: bool,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 4,
            max_iters: 100,
            n_restarts: 1,
            seed: 0,
            verbose: false,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified number of clusters
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the maximum number of iterations
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the number of restarts
    pub fn with_restarts(mut self, n_restarts: usize) -> Self {
        self.n_restarts = n_restarts;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set verbose mode
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// How PAM picks its starting medoids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MedoidInit {
    /// Greedy BUILD: start from the most central point, then repeatedly add
    /// the point that lowers total dissimilarity the most. Ignores the seed.
    #[default]
    Build,

    /// Sample k distinct points from the seeded stream, like k-means.
    Random,
}

/// Configuration for the k-medoids (PAM) engine
#[derive(Debug, Clone)]
pub struct KMedoidsConfig {
    /// Number of clusters
    pub k: usize,

    /// Maximum number of accepted swaps
    pub max_iters: usize,

    /// Random seed, only used by [`MedoidInit::Random`]
    pub seed: u64,

    /// Initialization strategy
    pub init: MedoidInit,

    /// Log fit summaries at info level instead of debug
    pub verbose: bool,
}

impl Default for KMedoidsConfig {
    fn default() -> Self {
        Self {
            k: 4,
            max_iters: 100,
            seed: 0,
            init: MedoidInit::Build,
            verbose: false,
        }
    }
}

impl KMedoidsConfig {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_init(mut self, init: MedoidInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Null reference model for the gap statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceDistribution {
    /// Sample each column uniformly within its observed [min, max] range.
    #[default]
    BoundingBox,

    /// Sample uniformly in the bounding box of the principal-component
    /// rotation of the centered data, then rotate back. Tighter null model
    /// than the column box when offers are correlated.
    ScaledPca,
}

/// Configuration for the gap statistic evaluator
#[derive(Debug, Clone)]
pub struct GapConfig {
    /// Largest cluster count evaluated (k runs over 1..=k_max)
    pub k_max: usize,

    /// Number of reference datasets (B)
    pub n_bootstrap: usize,

    /// Random seed for reference sampling and per-fit seeds
    pub seed: u64,

    /// Reference distribution
    pub reference: ReferenceDistribution,

    /// Log per-k summaries at info level instead of debug
    pub verbose: bool,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            k_max: 10,
            n_bootstrap: 100,
            seed: 0,
            reference: ReferenceDistribution::BoundingBox,
            verbose: false,
        }
    }
}

impl GapConfig {
    pub fn new(k_max: usize) -> Self {
        Self {
            k_max,
            ..Default::default()
        }
    }

    pub fn with_bootstrap(mut self, n_bootstrap: usize) -> Self {
        self.n_bootstrap = n_bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_reference(mut self, reference: ReferenceDistribution) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Configuration for principal component analysis
#[derive(Debug, Clone)]
pub struct PcaConfig {
    /// Subtract column means before decomposition
    pub center: bool,

    /// Components kept by [`PcaModel::project_default`](crate::PcaModel::project_default)
    pub n_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            center: true,
            n_components: 2,
        }
    }
}

impl PcaConfig {
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    pub fn with_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }
}
