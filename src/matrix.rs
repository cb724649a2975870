use crate::error::{Result, SegmentError};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One accepted offer: customer `customer` took offer `offer`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub customer: String,
    pub offer: u32,
}

impl Transaction {
    pub fn new(customer: impl Into<String>, offer: u32) -> Self {
        Self {
            customer: customer.into(),
            offer,
        }
    }
}

/// Catalog entry describing a discount offer
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: u32,
    pub campaign: String,
    pub varietal: String,
    pub min_qty: u32,
    /// Discount in percent
    pub discount: f64,
    pub origin: String,
    pub past_peak: bool,
}

/// Customer × offer 0/1 indicator matrix.
///
/// Row order is the customer identity used by every downstream result; the
/// column set is fixed at construction. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseMatrix {
    customers: Vec<String>,
    offers: Vec<u32>,
    data: Array2<f64>,
}

impl PurchaseMatrix {
    /// Pivot accepted-offer records into an indicator matrix.
    ///
    /// Rows are the distinct customers sorted by name; columns follow
    /// `offer_ids`, so offers nobody accepted stay as all-zero columns.
    /// Repeated records for the same pair count once.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `offer_ids` is empty or has duplicates, or a
    ///   transaction refers to an offer not in `offer_ids`
    /// - `DegenerateInput` if there are no transactions
    pub fn from_transactions(transactions: &[Transaction], offer_ids: &[u32]) -> Result<Self> {
        let column_of = index_offers(offer_ids)?;
        if transactions.is_empty() {
            return Err(SegmentError::DegenerateInput(
                "No transactions to build a matrix from".to_string(),
            ));
        }

        let customers: Vec<String> = transactions
            .iter()
            .map(|t| t.customer.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<&str, usize> = customers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut data = Array2::zeros((customers.len(), offer_ids.len()));
        for t in transactions {
            let column = *column_of.get(&t.offer).ok_or_else(|| {
                SegmentError::InvalidParameter(format!(
                    "Transaction for {} refers to unknown offer {}",
                    t.customer, t.offer
                ))
            })?;
            data[[row_of[t.customer.as_str()], column]] = 1.0;
        }

        Ok(Self {
            customers,
            offers: offer_ids.to_vec(),
            data,
        })
    }

    /// Build a matrix from already-tabulated rows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for ragged rows, row/customer count
    /// mismatches, duplicate customers or offers, or cells other than 0 and 1.
    pub fn from_rows(customers: Vec<String>, offers: Vec<u32>, rows: Vec<Vec<f64>>) -> Result<Self> {
        index_offers(&offers)?;
        if customers.len() != rows.len() {
            return Err(SegmentError::InvalidParameter(format!(
                "{} customers but {} rows",
                customers.len(),
                rows.len()
            )));
        }
        if customers.iter().collect::<HashSet<_>>().len() != customers.len() {
            return Err(SegmentError::InvalidParameter(
                "Duplicate customer names".to_string(),
            ));
        }

        let n_offers = offers.len();
        let mut flat = Vec::with_capacity(rows.len() * n_offers);
        for (customer, row) in customers.iter().zip(rows) {
            if row.len() != n_offers {
                return Err(SegmentError::InvalidParameter(format!(
                    "Row for {} has {} cells, expected {}",
                    customer,
                    row.len(),
                    n_offers
                )));
            }
            if let Some(bad) = row.iter().find(|&&v| v != 0.0 && v != 1.0) {
                return Err(SegmentError::InvalidParameter(format!(
                    "Row for {} contains non-binary value {}",
                    customer, bad
                )));
            }
            flat.extend(row);
        }

        let data = Array2::from_shape_vec((customers.len(), n_offers), flat)
            .map_err(|e| SegmentError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            customers,
            offers,
            data,
        })
    }

    /// Read-only view for the clustering engines
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn customers(&self) -> &[String] {
        &self.customers
    }

    pub fn offers(&self) -> &[u32] {
        &self.offers
    }

    pub fn n_customers(&self) -> usize {
        self.customers.len()
    }

    pub fn n_offers(&self) -> usize {
        self.offers.len()
    }

    pub fn row_of(&self, customer: &str) -> Option<usize> {
        self.customers.iter().position(|c| c == customer)
    }

    pub fn column_of(&self, offer: u32) -> Option<usize> {
        self.offers.iter().position(|&o| o == offer)
    }

    /// Number of customers who accepted each offer
    pub fn offer_totals(&self) -> Array1<f64> {
        self.data.sum_axis(Axis(0))
    }
}

fn index_offers(offer_ids: &[u32]) -> Result<HashMap<u32, usize>> {
    if offer_ids.is_empty() {
        return Err(SegmentError::InvalidParameter(
            "At least one offer column is required".to_string(),
        ));
    }
    let column_of: HashMap<u32, usize> = offer_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();
    if column_of.len() != offer_ids.len() {
        return Err(SegmentError::InvalidParameter(
            "Duplicate offer ids".to_string(),
        ));
    }
    Ok(column_of)
}
