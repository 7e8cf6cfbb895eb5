use crate::config::{normalize_header, DEFAULT_WEIGHTED_COLUMNS};
use crate::error::{PredictError, Result};

/// Non-negative per-column weights keyed by normalized column name.
/// Columns without an entry weigh 0 and take no part in the gap.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl Default for WeightVector {
    fn default() -> Self {
        let mut weights = Self::empty();
        for name in DEFAULT_WEIGHTED_COLUMNS {
            weights.entries.push((name.to_string(), 1.0));
        }
        weights
    }
}

impl WeightVector {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets (or replaces) the weight of `column`.
    pub fn set(&mut self, column: &str, weight: f64) -> Result<()> {
        let column = normalize_header(column);
        if !weight.is_finite() || weight < 0.0 {
            return Err(PredictError::InvalidWeight { column, weight });
        }
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((column, weight)),
        }
        Ok(())
    }

    pub fn with(mut self, column: &str, weight: f64) -> Result<Self> {
        self.set(column, weight)?;
        Ok(self)
    }

    /// Builds a vector from `NAME=VALUE` strings.
    pub fn parse_all<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let mut weights = Self::empty();
        for entry in entries {
            let entry = entry.as_ref();
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| PredictError::MalformedWeight(entry.to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| PredictError::MalformedWeight(entry.to_string()))?;
            weights.set(name, value)?;
        }
        Ok(weights)
    }

    pub fn get(&self, column: &str) -> f64 {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    /// Entries with a strictly positive weight, in insertion order.
    pub fn active(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(name, w)| (name.as_str(), *w))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, w)| (name.as_str(), *w))
    }

    pub fn is_degenerate(&self) -> bool {
        self.active().next().is_none()
    }
}
