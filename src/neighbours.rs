use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::error::{PredictError, Result};
use crate::geo::LonLat;
use crate::stats::sample_std_dev;
use crate::table::Table;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbour {
    pub row: usize,
    pub gap: f64,
}

impl Neighbour {
    /// Inverse-distance weight in (0, 1]; 1 for an exact match.
    pub fn closeness(&self) -> f64 {
        1.0 / (1.0 + self.gap)
    }
}

/// Destination estimate for one query.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub lon: f64,
    pub lat: f64,
    /// Sample standard deviation of the neighbours' destination longitudes.
    pub spread_lon: f64,
    pub spread_lat: f64,
    /// Number of neighbours the estimate is built from.
    pub neighbours: usize,
}

impl Prediction {
    pub fn destination(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }

    /// The prediction shifted by one spread on both axes.
    pub fn spread_corner(&self) -> LonLat {
        LonLat::new(self.lon + self.spread_lon, self.lat + self.spread_lat)
    }
}

/// The `k` rows with the smallest gap, nearest first. Equal gaps keep row
/// order. A NaN gap marks an unusable row: it is never selected, so
/// `min(k, usable rows)` neighbours come back.
pub fn nearest(gaps: &[f64], k: usize) -> Result<Vec<Neighbour>> {
    if k == 0 {
        return Err(PredictError::InvalidK(k));
    }
    if gaps.is_empty() {
        return Err(PredictError::EmptyTrainingSet);
    }

    // Max-heap bounded to k: the top is the worst neighbour kept so far.
    let mut heap: BinaryHeap<(OrderedFloat<f64>, usize)> = BinaryHeap::with_capacity(k + 1);
    for (row, &gap) in gaps.iter().enumerate() {
        if gap.is_nan() {
            continue;
        }
        let entry = (OrderedFloat(gap), row);
        if heap.len() < k {
            heap.push(entry);
        } else if heap.peek().is_some_and(|top| entry < *top) {
            heap.pop();
            heap.push(entry);
        }
    }

    if heap.is_empty() {
        return Err(PredictError::NoUsableNeighbours { rows: gaps.len() });
    }
    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|(gap, row)| Neighbour { row, gap: gap.0 })
        .collect())
}

/// Closeness-weighted mean destination and unweighted spread of `neighbours`.
/// A single neighbour has zero spread. Fails when every neighbour is
/// infinitely far, since closeness then gives no weight to blend with.
pub fn aggregate(train: &Table, neighbours: &[Neighbour]) -> Result<Prediction> {
    if neighbours.is_empty() {
        return Err(PredictError::NoUsableNeighbours { rows: train.len() });
    }

    let mut weight_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut lat_sum = 0.0;
    for n in neighbours {
        let dest = train.destination(n.row);
        let w = n.closeness();
        weight_sum += w;
        lon_sum += dest.lon * w;
        lat_sum += dest.lat * w;
    }

    let (lon, lat) = (lon_sum / weight_sum, lat_sum / weight_sum);
    if weight_sum <= 0.0 || !lon.is_finite() || !lat.is_finite() {
        return Err(PredictError::GapOverflow {
            neighbours: neighbours.len(),
        });
    }

    let dests: Vec<LonLat> = neighbours.iter().map(|n| train.destination(n.row)).collect();
    Ok(Prediction {
        lon,
        lat,
        spread_lon: sample_std_dev(dests.iter().map(|d| d.lon)),
        spread_lat: sample_std_dev(dests.iter().map(|d| d.lat)),
        neighbours: neighbours.len(),
    })
}
