use crate::config::PredictConfig;
use crate::error::{PredictError, Result};
use crate::gap::GapPlan;
use crate::neighbours::{aggregate, nearest, Neighbour, Prediction};
use crate::table::{QueryTrip, Table};

/// Predicts the destination of one trip in progress from `train`.
///
/// Every call recomputes the column plan and the gap to every training row.
pub fn predict(train: &Table, query: &QueryTrip, config: &PredictConfig) -> Result<Prediction> {
    predict_with_neighbours(train, query, config).map(|(prediction, _)| prediction)
}

/// Like [`predict`], also returning the neighbours used, nearest first.
pub fn predict_with_neighbours(
    train: &Table,
    query: &QueryTrip,
    config: &PredictConfig,
) -> Result<(Prediction, Vec<Neighbour>)> {
    validate(train, config)?;
    let aligned = query.align(train.schema())?;
    let plan = GapPlan::resolve(train, config)?;
    predict_aligned(train, &plan, &aligned, config.k)
}

pub(crate) fn validate(train: &Table, config: &PredictConfig) -> Result<()> {
    if config.k == 0 {
        return Err(PredictError::InvalidK(config.k));
    }
    if train.is_empty() {
        return Err(PredictError::EmptyTrainingSet);
    }
    Ok(())
}

/// Prediction for a query already laid out in the training schema.
pub(crate) fn predict_aligned(
    train: &Table,
    plan: &GapPlan,
    query: &[f64],
    k: usize,
) -> Result<(Prediction, Vec<Neighbour>)> {
    plan.check_query(query)?;
    let gaps = plan.gaps(train, query);
    let neighbours = nearest(&gaps, k)?;
    let prediction = aggregate(train, &neighbours)?;
    Ok((prediction, neighbours))
}
