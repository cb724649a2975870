use crate::distance::pairwise_distances;
use crate::engine::PartitionalEngine;
use crate::error::{Result, SegmentError};
use crate::result::ClusterResult;
use log::debug;
use ndarray::{Array1, ArrayView2};

/// One agglomeration step.
///
/// Node ids follow the scipy convention: leaves are `0..n`, and the node
/// created by merge `i` is `n + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Child whose smallest member point index is lower
    pub left: usize,
    pub right: usize,
    /// Complete-linkage distance at which the children were joined
    pub height: f64,
    /// Number of points under the new node
    pub size: usize,
}

/// Binary merge tree over the input points, in merge order.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_leaves: usize,
}

/// Agglomerative clustering with complete linkage on Euclidean distances.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hierarchical;

impl Hierarchical {
    pub fn new() -> Self {
        Self
    }

    /// Build the full merge tree of `data`.
    ///
    /// At every step the two clusters with the smallest complete-linkage
    /// distance are merged; ties go to the pair whose smallest member
    /// indices are lowest (compared lexicographically).
    ///
    /// # Errors
    ///
    /// Returns `DegenerateInput` for fewer than 2 points and
    /// `InvalidParameter` for non-finite values.
    pub fn fit(&self, data: &ArrayView2<f64>) -> Result<Dendrogram> {
        let n = data.nrows();
        if n < 2 {
            return Err(SegmentError::DegenerateInput(format!(
                "Hierarchical clustering needs at least 2 points, got {}",
                n
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::InvalidParameter(
                "Data contains non-finite values".to_string(),
            ));
        }

        let mut dist = pairwise_distances(data);

        // Slot i holds the cluster whose smallest member is point i
        let mut active = vec![true; n];
        let mut node_of: Vec<usize> = (0..n).collect();
        let mut sizes = vec![1usize; n];
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for step in 0..n.saturating_sub(1) {
            let mut best: Option<(f64, usize, usize)> = None;
            for i in (0..n).filter(|&i| active[i]) {
                for j in ((i + 1)..n).filter(|&j| active[j]) {
                    let d = dist[[i, j]];
                    if best.map_or(true, |(best_d, _, _)| d < best_d) {
                        best = Some((d, i, j));
                    }
                }
            }
            let Some((height, i, j)) = best else { break };

            let size = sizes[i] + sizes[j];
            merges.push(Merge {
                left: node_of[i],
                right: node_of[j],
                height,
                size,
            });
            debug!(
                "  Merge {}: nodes {} + {} at height {:.6} (size {})",
                step, node_of[i], node_of[j], height, size
            );

            active[j] = false;
            sizes[i] = size;
            node_of[i] = n + step;

            for other in (0..n).filter(|&o| active[o] && o != i) {
                let d = dist[[i, other]].max(dist[[j, other]]);
                dist[[i, other]] = d;
                dist[[other, i]] = d;
            }
        }

        Ok(Dendrogram {
            merges,
            n_leaves: n,
        })
    }
}

impl Dendrogram {
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Merge heights in merge order; non-decreasing under complete linkage
    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.height).collect()
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    /// Assignment into exactly `k` clusters.
    ///
    /// Keeps the `k - 1` highest merges as cluster boundaries by applying
    /// only the first `n - k` merges. Labels are numbered `0..k` in order of
    /// each cluster's first point.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `k` is 0 or exceeds the number of points.
    pub fn cut(&self, k: usize) -> Result<Array1<usize>> {
        if k == 0 || k > self.n_leaves {
            return Err(SegmentError::InvalidParameter(format!(
                "k must be in 1..={}, got {}",
                self.n_leaves, k
            )));
        }
        Ok(self.labels_after(self.n_leaves - k))
    }

    /// Assignment obtained by applying every merge at or below `height`
    pub fn cut_at_height(&self, height: f64) -> Array1<usize> {
        let applied = self.merges.iter().take_while(|m| m.height <= height).count();
        self.labels_after(applied)
    }

    /// Leaves in left-to-right drawing order
    pub fn leaf_order(&self) -> Vec<usize> {
        let n = self.n_leaves;
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![n + self.merges.len() - 1];
        while let Some(node) = stack.pop() {
            if node < n {
                order.push(node);
            } else {
                let merge = &self.merges[node - n];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        order
    }

    fn labels_after(&self, n_merges: usize) -> Array1<usize> {
        let n = self.n_leaves;
        let mut parent: Vec<usize> = (0..n).collect();
        let mut node_point: Vec<usize> = (0..n).collect();

        for merge in self.merges.iter().take(n_merges) {
            let a = find(&mut parent, node_point[merge.left]);
            let b = find(&mut parent, node_point[merge.right]);
            parent[b] = a;
            node_point.push(a);
        }

        let mut label_of_root = vec![usize::MAX; n];
        let mut next_label = 0;
        let mut labels = Array1::zeros(n);
        for point in 0..n {
            let root = find(&mut parent, point);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next_label;
                next_label += 1;
            }
            labels[point] = label_of_root[root];
        }
        labels
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

impl PartitionalEngine for Hierarchical {
    /// Cut the complete-linkage tree at `k`; the seed is unused.
    fn fit_k(&self, data: &ArrayView2<f64>, k: usize, _seed: u64) -> Result<ClusterResult> {
        let labels = self.fit(data)?.cut(k)?;
        ClusterResult::from_labels(data, labels)
    }

    fn name(&self) -> &'static str {
        "hclust-complete"
    }
}
