//! Destination prediction for taxi trips in progress.
//!
//! A partial trip is compared against completed trips with a weighted,
//! per-column scaled squared distance (the "gap"). The `k` closest trips are
//! blended with inverse-distance weights `1 / (1 + gap)` into a destination
//! estimate, and the spread of their destinations gives a local uncertainty.
//!
//! ```
//! use taxi_dest::{predict, PredictConfig, QueryTrip, Table, WeightVector};
//!
//! let train = Table::from_rows(
//!     &["DAY_HOUR", "LON_START", "LAT_START", "LON_FINISH", "LAT_FINISH"],
//!     vec![
//!         vec![0.0, -8.61, 41.14, -8.62, 41.15],
//!         vec![0.0, -8.60, 41.16, -8.58, 41.17],
//!     ],
//! )
//! .unwrap();
//! let query = QueryTrip::from_pairs(&[
//!     ("DAY_HOUR", 0.0),
//!     ("LON_START", -8.605),
//!     ("LAT_START", 41.15),
//! ]);
//! let config = PredictConfig {
//!     k: 2,
//!     weights: WeightVector::empty().with("LON_START", 1.0).unwrap().with("LAT_START", 1.0).unwrap(),
//!     scale: false,
//!     ..PredictConfig::default()
//! };
//! let p = predict(&train, &query, &config).unwrap();
//! assert_eq!(p.neighbours, 2);
//! assert!(p.lon > -8.62 && p.lon < -8.58);
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod gap;
pub mod geo;
pub mod illume;
pub mod neighbours;
pub mod predict;
pub mod prepare;
pub mod stats;
pub mod table;
pub mod weights;

pub use batch::{range, score, BatchReport, BatchSummary, DestinationScale, RangeRow, ScoreRow};
pub use config::{Layout, PredictConfig};
pub use error::{PredictError, Result};
pub use geo::{haversine_km, haversine_meters, LonLat};
pub use neighbours::{Neighbour, Prediction};
pub use predict::{predict, predict_with_neighbours};
pub use table::{QueryTrip, Record, Schema, Table};
pub use weights::WeightVector;
