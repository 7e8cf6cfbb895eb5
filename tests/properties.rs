//! Property tests for the neighbour search and distance functions

use proptest::prelude::*;
use taxi_dest::neighbours::nearest;
use taxi_dest::{haversine_meters, predict_with_neighbours, LonLat, PredictConfig, Table};

const COLUMNS: [&str; 5] = ["DAY_HOUR", "LON_START", "LAT_START", "LON_FINISH", "LAT_FINISH"];

fn trip() -> impl Strategy<Value = Vec<f64>> {
    (4.0..28.0f64, -8.7..-8.5f64, 41.1..41.25f64, -8.7..-8.5f64, 41.1..41.25f64)
        .prop_map(|(h, lon, lat, dlon, dlat)| vec![h, lon, lat, dlon, dlat])
}

fn point() -> impl Strategy<Value = LonLat> {
    (-180.0..180.0f64, -90.0..90.0f64).prop_map(|(lon, lat)| LonLat::new(lon, lat))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn effective_k_is_min_of_k_and_rows(
        rows in prop::collection::vec(trip(), 1..30),
        k in 1..40usize,
        query in trip(),
    ) {
        let n = rows.len();
        let train = Table::from_rows(&COLUMNS, rows).unwrap();
        let q = Table::from_rows(&COLUMNS, vec![query]).unwrap().query(0);
        let config = PredictConfig { k, ..PredictConfig::default() };
        let (p, neighbours) = predict_with_neighbours(&train, &q, &config).unwrap();
        prop_assert_eq!(neighbours.len(), k.min(n));
        prop_assert_eq!(p.neighbours, k.min(n));

        // Nearest first, ties by row order
        for pair in neighbours.windows(2) {
            prop_assert!(
                pair[0].gap < pair[1].gap || (pair[0].gap == pair[1].gap && pair[0].row < pair[1].row)
            );
        }
    }

    #[test]
    fn prediction_inside_neighbour_bounding_box(
        rows in prop::collection::vec(trip(), 1..30),
        k in 1..10usize,
        query in trip(),
    ) {
        let train = Table::from_rows(&COLUMNS, rows).unwrap();
        let q = Table::from_rows(&COLUMNS, vec![query]).unwrap().query(0);
        let config = PredictConfig { k, ..PredictConfig::default() };
        let (p, neighbours) = predict_with_neighbours(&train, &q, &config).unwrap();

        let dests: Vec<LonLat> = neighbours.iter().map(|n| train.destination(n.row)).collect();
        let min_lon = dests.iter().map(|d| d.lon).fold(f64::INFINITY, f64::min);
        let max_lon = dests.iter().map(|d| d.lon).fold(f64::NEG_INFINITY, f64::max);
        let min_lat = dests.iter().map(|d| d.lat).fold(f64::INFINITY, f64::min);
        let max_lat = dests.iter().map(|d| d.lat).fold(f64::NEG_INFINITY, f64::max);
        let eps = 1e-9;
        prop_assert!(p.lon >= min_lon - eps && p.lon <= max_lon + eps);
        prop_assert!(p.lat >= min_lat - eps && p.lat <= max_lat + eps);
        prop_assert!(p.spread_lon >= 0.0 && p.spread_lat >= 0.0);
    }

    #[test]
    fn selected_gaps_never_exceed_unselected(
        gaps in prop::collection::vec(0.0..100.0f64, 1..50),
        k in 1..60usize,
    ) {
        let chosen = nearest(&gaps, k).unwrap();
        prop_assert_eq!(chosen.len(), k.min(gaps.len()));
        let worst = chosen.last().map(|n| n.gap).unwrap_or(0.0);
        for (row, gap) in gaps.iter().enumerate() {
            if !chosen.iter().any(|n| n.row == row) {
                prop_assert!(*gap >= worst);
            }
        }
    }

    #[test]
    fn haversine_symmetric_and_non_negative(a in point(), b in point()) {
        let ab = haversine_meters(a, b);
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - haversine_meters(b, a)).abs() < 1e-6);
        prop_assert_eq!(haversine_meters(a, a), 0.0);
    }
}
