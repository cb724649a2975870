use crate::error::{Result, SegmentError};
use crate::matrix::{Offer, PurchaseMatrix};
use crate::result::ClusterResult;
use std::collections::{BTreeMap, HashMap};

/// What the customers of one cluster bought.
///
/// These are the tallies behind per-cluster bar charts and word clouds.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Acceptances per offer, in matrix column order
    pub offer_counts: Vec<(u32, usize)>,
    /// Acceptances per varietal
    pub varietals: BTreeMap<String, usize>,
    /// Acceptances per country of origin
    pub origins: BTreeMap<String, usize>,
}

impl ClusterProfile {
    /// Tally offer acceptances for every cluster of `result`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the result was not fitted on this
    /// matrix's rows, or a matrix column has no entry in `offers`.
    pub fn build(
        matrix: &PurchaseMatrix,
        result: &ClusterResult,
        offers: &[Offer],
    ) -> Result<Vec<ClusterProfile>> {
        if result.labels().len() != matrix.n_customers() {
            return Err(SegmentError::InvalidParameter(format!(
                "Result has {} labels for {} customers",
                result.labels().len(),
                matrix.n_customers()
            )));
        }

        let catalog: HashMap<u32, &Offer> = offers.iter().map(|o| (o.id, o)).collect();
        let columns: Vec<&Offer> = matrix
            .offers()
            .iter()
            .map(|id| {
                catalog.get(id).copied().ok_or_else(|| {
                    SegmentError::InvalidParameter(format!("No metadata for offer {}", id))
                })
            })
            .collect::<Result<_>>()?;

        let sizes = result.sizes();
        let mut profiles: Vec<ClusterProfile> = (0..result.k())
            .map(|cluster| ClusterProfile {
                cluster,
                size: sizes[cluster],
                offer_counts: matrix.offers().iter().map(|&id| (id, 0)).collect(),
                varietals: BTreeMap::new(),
                origins: BTreeMap::new(),
            })
            .collect();

        for (row, &label) in matrix.view().outer_iter().zip(result.labels().iter()) {
            let profile = &mut profiles[label];
            for ((&cell, offer), count) in row
                .iter()
                .zip(columns.iter())
                .zip(profile.offer_counts.iter_mut())
            {
                if cell == 0.0 {
                    continue;
                }
                count.1 += 1;
                *profile.varietals.entry(offer.varietal.clone()).or_default() += 1;
                *profile.origins.entry(offer.origin.clone()).or_default() += 1;
            }
        }

        Ok(profiles)
    }

    /// The `n` most accepted offers, by count then offer id; offers nobody
    /// in the cluster accepted are left out
    pub fn top_offers(&self, n: usize) -> Vec<(u32, usize)> {
        let mut ranked: Vec<(u32, usize)> = self
            .offer_counts
            .iter()
            .copied()
            .filter(|&(_, count)| count > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Most frequent varietal, alphabetically first on ties
    pub fn dominant_varietal(&self) -> Option<&str> {
        self.varietals
            .iter()
            .fold(None, |best: Option<(&String, usize)>, (name, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((name, count)),
            })
            .map(|(name, _)| name.as_str())
    }
}
