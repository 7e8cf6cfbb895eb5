//! Predictions for every row of a test table, scored against each row's
//! known destination.
//!
//! Two report shapes are produced from the same predictions: `score` gives
//! residuals standardized by the spread of training destinations, `range`
//! gives physical errors in kilometres for display.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PredictConfig;
use crate::error::{PredictError, Result};
use crate::gap::GapPlan;
use crate::geo::{haversine_km, LonLat};
use crate::neighbours::Prediction;
use crate::predict::{predict_aligned, validate};
use crate::stats::{sample_std_dev, scale_divisor};
use crate::table::Table;

/// Standard deviations of the training destinations, used to standardize
/// residuals. Zero deviations are replaced by 1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DestinationScale {
    pub sd_lon: f64,
    pub sd_lat: f64,
}

impl DestinationScale {
    pub fn of(train: &Table) -> Self {
        let schema = train.schema();
        Self {
            sd_lon: scale_divisor(sample_std_dev(train.column(schema.dest_lon()))),
            sd_lat: scale_divisor(sample_std_dev(train.column(schema.dest_lat()))),
        }
    }

    /// Signed standardized residuals `(actual - predicted) / sd` per axis.
    pub fn residuals(&self, predicted: LonLat, actual: LonLat) -> (f64, f64) {
        (
            (actual.lon - predicted.lon) / self.sd_lon,
            (actual.lat - predicted.lat) / self.sd_lat,
        )
    }

    pub fn combined_error(&self, predicted: LonLat, actual: LonLat) -> f64 {
        combined_distance_error(
            actual.lon - predicted.lon,
            actual.lat - predicted.lat,
            self.sd_lon,
            self.sd_lat,
        )
    }
}

/// Joint residual magnitude in standardized units:
/// `sqrt((dlon^2 + dlat^2) / (sd_lon^2 + sd_lat^2))`.
pub fn combined_distance_error(d_lon: f64, d_lat: f64, sd_lon: f64, sd_lat: f64) -> f64 {
    ((d_lon * d_lon + d_lat * d_lat) / (sd_lon * sd_lon + sd_lat * sd_lat)).sqrt()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreRow {
    pub trip_id: String,
    pub snapshot: Option<String>,
    pub pred_lon: f64,
    pub pred_lat: f64,
    pub spread_lon: f64,
    pub spread_lat: f64,
    pub actual_lon: Option<f64>,
    pub actual_lat: Option<f64>,
    pub error_lon: Option<f64>,
    pub error_lat: Option<f64>,
    pub error_distance: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RangeRow {
    pub trip_id: String,
    pub snapshot: Option<String>,
    pub pred_lon: f64,
    pub pred_lat: f64,
    pub actual_lon: Option<f64>,
    pub actual_lat: Option<f64>,
    /// Great-circle distance from prediction to actual destination.
    pub error_km: Option<f64>,
    /// Great-circle distance from the prediction to the prediction shifted
    /// by one neighbour spread on both axes.
    pub range_km: f64,
}

#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    pub trip_id: String,
    pub error: PredictError,
}

/// Rows that could be predicted, in test-table order, and the ones that could
/// not. The caller decides whether a failure aborts the batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub rows: Vec<T>,
    pub failures: Vec<RowFailure>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub scored: usize,
    pub failures: usize,
    pub mean_error: Option<f64>,
}

impl<T> BatchReport<T> {
    fn summarize(&self, errors: impl Iterator<Item = Option<f64>>) -> BatchSummary {
        let known: Vec<f64> = errors.flatten().collect();
        BatchSummary {
            rows: self.rows.len(),
            scored: known.len(),
            failures: self.failures.len(),
            mean_error: if known.is_empty() {
                None
            } else {
                Some(known.iter().sum::<f64>() / known.len() as f64)
            },
        }
    }
}

impl BatchReport<ScoreRow> {
    /// Summary whose `mean_error` is the mean combined standardized error.
    pub fn summary(&self) -> BatchSummary {
        self.summarize(self.rows.iter().map(|r| r.error_distance))
    }
}

impl BatchReport<RangeRow> {
    /// Summary whose `mean_error` is the mean great-circle error in km.
    pub fn summary(&self) -> BatchSummary {
        self.summarize(self.rows.iter().map(|r| r.error_km))
    }
}

fn known(dest: LonLat) -> Option<LonLat> {
    (dest.lon.is_finite() && dest.lat.is_finite()).then_some(dest)
}

/// Predicts every test row. The column plan is resolved once since the
/// training table does not change during the batch.
fn predict_rows(
    train: &Table,
    test: &Table,
    config: &PredictConfig,
) -> Result<Vec<Result<Prediction>>> {
    validate(train, config)?;
    train.schema().ensure_same(test.schema())?;
    let plan = GapPlan::resolve(train, config)?;

    let run = |row: usize| {
        predict_aligned(train, &plan, &test.records()[row].values, config.k)
            .map(|(prediction, _)| prediction)
    };

    #[cfg(feature = "parallel")]
    let predictions = {
        use rayon::prelude::*;
        (0..test.len()).into_par_iter().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let predictions = (0..test.len()).map(run).collect();

    Ok(predictions)
}

fn collect_rows<T>(
    test: &Table,
    predictions: Vec<Result<Prediction>>,
    mut build: impl FnMut(usize, Prediction) -> T,
) -> BatchReport<T> {
    let mut rows = Vec::with_capacity(predictions.len());
    let mut failures = Vec::new();
    for (row, prediction) in predictions.into_iter().enumerate() {
        match prediction {
            Ok(p) => rows.push(build(row, p)),
            Err(error) => {
                let trip_id = test.records()[row].trip_id.clone();
                warn!(row, trip_id = %trip_id, %error, "prediction failed");
                failures.push(RowFailure {
                    row,
                    trip_id,
                    error,
                });
            }
        }
    }
    BatchReport { rows, failures }
}

/// Standardized-residual report, one row per predicted test row.
pub fn score(train: &Table, test: &Table, config: &PredictConfig) -> Result<BatchReport<ScoreRow>> {
    let predictions = predict_rows(train, test, config)?;
    let scale = DestinationScale::of(train);

    let report = collect_rows(test, predictions, |row, p| {
        let record = &test.records()[row];
        let actual = known(test.destination(row));
        let residuals = actual.map(|a| scale.residuals(p.destination(), a));
        ScoreRow {
            trip_id: record.trip_id.clone(),
            snapshot: record.snapshot.clone(),
            pred_lon: p.lon,
            pred_lat: p.lat,
            spread_lon: p.spread_lon,
            spread_lat: p.spread_lat,
            actual_lon: actual.map(|a| a.lon),
            actual_lat: actual.map(|a| a.lat),
            error_lon: residuals.map(|r| r.0),
            error_lat: residuals.map(|r| r.1),
            error_distance: actual.map(|a| scale.combined_error(p.destination(), a)),
        }
    });
    info!(?scale, summary = ?report.summary(), "scored test table");
    Ok(report)
}

/// Kilometre error and neighbour-spread range, one row per predicted test row.
pub fn range(train: &Table, test: &Table, config: &PredictConfig) -> Result<BatchReport<RangeRow>> {
    let predictions = predict_rows(train, test, config)?;

    let report = collect_rows(test, predictions, |row, p| {
        let record = &test.records()[row];
        let actual = known(test.destination(row));
        RangeRow {
            trip_id: record.trip_id.clone(),
            snapshot: record.snapshot.clone(),
            pred_lon: p.lon,
            pred_lat: p.lat,
            actual_lon: actual.map(|a| a.lon),
            actual_lat: actual.map(|a| a.lat),
            error_km: actual.map(|a| haversine_km(p.destination(), a)),
            range_km: haversine_km(p.destination(), p.spread_corner()),
        }
    });
    info!(summary = ?report.summary(), "ranged test table");
    Ok(report)
}
