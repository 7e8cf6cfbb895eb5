use crate::weights::WeightVector;

pub const DEFAULT_K: usize = 10;

/// Latitude (degrees) whose cosine compresses longitude deltas, chosen for Porto.
pub const DEFAULT_REFERENCE_LATITUDE: f64 = 41.155;

/// Columns weighted 1 when the caller gives no weights.
pub const DEFAULT_WEIGHTED_COLUMNS: [&str; 3] = ["DAY_HOUR", "LON_START", "LAT_START"];

/// Settings for one prediction call.
#[derive(Clone, Debug)]
pub struct PredictConfig {
    /// Neighbourhood size, clamped to the training set size.
    pub k: usize,
    pub weights: WeightVector,
    /// Standardize each weighted column by its training standard deviation.
    pub scale: bool,
    pub reference_latitude: f64,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            weights: WeightVector::default(),
            scale: true,
            reference_latitude: DEFAULT_REFERENCE_LATITUDE,
        }
    }
}

impl PredictConfig {
    /// Factor applied to the weight of every longitude column.
    pub fn longitude_compression(&self) -> f64 {
        self.reference_latitude.to_radians().cos()
    }
}

/// How CSV headers map onto a trip table.
#[derive(Clone, Debug)]
pub struct Layout {
    pub id_column: String,
    /// Optional; tables without it have no snapshot labels.
    pub snapshot_column: String,
    pub dest_lon: String,
    pub dest_lat: String,
    /// Non-numeric columns dropped while loading.
    pub skip: Vec<String>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            id_column: "TRIP_ID".to_string(),
            snapshot_column: "SNAPSHOT".to_string(),
            dest_lon: "LON_FINISH".to_string(),
            dest_lat: "LAT_FINISH".to_string(),
            skip: [
                "CALL_TYPE",
                "ORIGIN_CALL",
                "ORIGIN_STAND",
                "TAXI_ID",
                "DAY_TYPE",
                "DAY_BUSY",
                "MISSING_DATA",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Canonical form of a column name: trimmed, upper case, with runs of
/// spaces, dots and dashes folded into a single underscore.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c == ' ' || c == '.' || c == '-' || c == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_uppercase());
    }
    out
}

/// A column holds longitude values when one of its `_`-separated tokens
/// starts with `LON`.
pub fn is_longitude_column(name: &str) -> bool {
    name.split('_').any(|token| token.starts_with("LON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header("Lon Start"), "LON_START");
        assert_eq!(normalize_header(" lon.start "), "LON_START");
        assert_eq!(normalize_header("day--hour"), "DAY_HOUR");
        assert_eq!(normalize_header("TRIP_ID"), "TRIP_ID");
    }

    #[test]
    fn detects_longitude_columns() {
        assert!(is_longitude_column("LON_START"));
        assert!(is_longitude_column("LON_02"));
        assert!(is_longitude_column("START_LONGITUDE"));
        assert!(!is_longitude_column("LAT_START"));
        assert!(!is_longitude_column("DAY_HOUR"));
    }

    #[test]
    fn compression_factor() {
        let c = PredictConfig::default().longitude_compression();
        assert!((c - 0.75293).abs() < 1e-4);
    }
}
