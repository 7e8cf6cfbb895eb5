//! Weighted, scaled squared distance ("gap") between a query trip and every
//! training trip.
//!
//! The column plan is resolved once per call: each weighted column gets a
//! single multiplier (weight, longitude compression, 1 / standard deviation)
//! and the row loop only does the arithmetic.

use tracing::{debug, warn};

use crate::config::{is_longitude_column, PredictConfig};
use crate::error::{PredictError, Result};
use crate::stats::{sample_std_dev, scale_divisor};
use crate::table::Table;

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveColumn {
    pub index: usize,
    pub name: String,
    /// Multiplier applied to `train - query` before squaring.
    pub factor: f64,
}

#[derive(Clone, Debug, Default)]
pub struct GapPlan {
    columns: Vec<ActiveColumn>,
}

impl GapPlan {
    /// Resolves the weighted columns of `config` against the training schema.
    /// Zero-weight columns are dropped here and never scanned.
    pub fn resolve(train: &Table, config: &PredictConfig) -> Result<Self> {
        let schema = train.schema();
        let compression = config.longitude_compression();
        let mut columns = Vec::new();

        for (name, weight) in config.weights.iter() {
            let index = schema
                .index_of(name)
                .ok_or_else(|| PredictError::UnknownColumn(name.to_string()))?;
            if weight == 0.0 {
                continue;
            }
            if schema.is_destination(index) {
                return Err(PredictError::WeightOnDestination(name.to_string()));
            }

            let mut factor = weight;
            if is_longitude_column(name) {
                factor *= compression;
            }
            if config.scale {
                let sd = sample_std_dev(train.column(index));
                if sd == 0.0 {
                    debug!(column = name, "zero variance, column left unscaled");
                }
                factor /= scale_divisor(sd);
            }
            columns.push(ActiveColumn {
                index,
                name: name.to_string(),
                factor,
            });
        }

        if config.weights.is_degenerate() {
            warn!("all weights are zero, every training trip is equally close");
        }
        debug!(?columns, "resolved gap plan");
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ActiveColumn] {
        &self.columns
    }

    /// Fails if the query lacks a value for any weighted column.
    pub fn check_query(&self, query: &[f64]) -> Result<()> {
        match self.columns.iter().find(|c| !query[c.index].is_finite()) {
            Some(c) => Err(PredictError::MissingQueryValue {
                column: c.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Gap of one training row. `row` and `query` are indexed by the
    /// training schema.
    pub fn gap(&self, row: &[f64], query: &[f64]) -> f64 {
        self.columns
            .iter()
            .map(|c| {
                let d = (row[c.index] - query[c.index]) * c.factor;
                d * d
            })
            .sum()
    }

    /// Gaps of every training row, in row order. Rows without a known
    /// destination get NaN so they are never picked as neighbours.
    pub fn gaps(&self, train: &Table, query: &[f64]) -> Vec<f64> {
        (0..train.len())
            .map(|row| {
                let dest = train.destination(row);
                if dest.lon.is_finite() && dest.lat.is_finite() {
                    self.gap(&train.records()[row].values, query)
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
