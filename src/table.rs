//! Trip tables: a shared column schema plus numeric rows.
//!
//! Every row of a table carries the same numeric columns. Two of them are the
//! destination longitude and latitude; the trip id and snapshot label are kept
//! beside the numbers and never take part in distances.

use std::io;
use std::path::Path;

use csv::ReaderBuilder;
use hashbrown::HashMap;

use crate::config::{normalize_header, Layout};
use crate::error::{PredictError, Result};
use crate::geo::LonLat;

#[derive(Clone, Debug)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    dest_lon: usize,
    dest_lat: usize,
}

impl Schema {
    /// Schema whose destination columns are found by name.
    pub fn new(columns: Vec<String>, dest_lon: &str, dest_lat: &str) -> Result<Self> {
        let (columns, index) = index_columns(columns)?;
        let lookup = |name: &str| {
            index
                .get(&normalize_header(name))
                .copied()
                .ok_or_else(|| PredictError::MissingColumn(normalize_header(name)))
        };
        let dest_lon = lookup(dest_lon)?;
        let dest_lat = lookup(dest_lat)?;
        Ok(Self {
            columns,
            index,
            dest_lon,
            dest_lat,
        })
    }

    /// Schema using the positional convention: destination longitude is the
    /// second-to-last column and destination latitude the last one.
    pub fn positional(columns: Vec<String>) -> Result<Self> {
        let (columns, index) = index_columns(columns)?;
        let n = columns.len();
        if n < 2 {
            return Err(PredictError::MissingColumn(
                "destination longitude/latitude".to_string(),
            ));
        }
        Ok(Self {
            columns,
            index,
            dest_lon: n - 2,
            dest_lat: n - 1,
        })
    }

    fn for_layout(columns: Vec<String>, layout: &Layout) -> Result<Self> {
        let has = |name: &str| {
            let name = normalize_header(name);
            columns.iter().any(|c| *c == name)
        };
        if has(&layout.dest_lon) && has(&layout.dest_lat) {
            Self::new(columns, &layout.dest_lon, &layout.dest_lat)
        } else {
            Self::positional(columns)
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn dest_lon(&self) -> usize {
        self.dest_lon
    }

    pub fn dest_lat(&self) -> usize {
        self.dest_lat
    }

    pub fn is_destination(&self, idx: usize) -> bool {
        idx == self.dest_lon || idx == self.dest_lat
    }

    /// Non-destination columns with their indices.
    pub fn features(&self) -> impl Iterator<Item = (usize, &str)> {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| !self.is_destination(*i))
            .map(|(i, name)| (i, name.as_str()))
    }

    /// Fails on the first column where `other` differs from `self`.
    pub fn ensure_same(&self, other: &Schema) -> Result<()> {
        for (i, name) in self.columns.iter().enumerate() {
            match other.columns.get(i) {
                Some(theirs) if theirs == name => {}
                Some(theirs) => {
                    return Err(PredictError::SchemaMismatch {
                        column: name.clone(),
                        detail: format!("found {} at position {}", theirs, i),
                    })
                }
                None => {
                    return Err(PredictError::SchemaMismatch {
                        column: name.clone(),
                        detail: "missing from test table".to_string(),
                    })
                }
            }
        }
        if let Some(extra) = other.columns.get(self.columns.len()) {
            return Err(PredictError::SchemaMismatch {
                column: extra.clone(),
                detail: "not present in training table".to_string(),
            });
        }
        if (self.dest_lon, self.dest_lat) != (other.dest_lon, other.dest_lat) {
            return Err(PredictError::SchemaMismatch {
                column: other.columns[other.dest_lon].clone(),
                detail: "destination columns differ".to_string(),
            });
        }
        Ok(())
    }
}

fn index_columns(columns: Vec<String>) -> Result<(Vec<String>, HashMap<String, usize>)> {
    let columns: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
    let mut index = HashMap::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        if index.insert(name.clone(), i).is_some() {
            return Err(PredictError::SchemaMismatch {
                column: name.clone(),
                detail: "duplicate column".to_string(),
            });
        }
    }
    Ok((columns, index))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub trip_id: String,
    pub snapshot: Option<String>,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct Table {
    schema: Schema,
    records: Vec<Record>,
}

impl Table {
    pub fn new(schema: Schema, records: Vec<Record>) -> Result<Self> {
        for (row, record) in records.iter().enumerate() {
            if record.values.len() != schema.width() {
                return Err(PredictError::SchemaMismatch {
                    column: format!("row {}", row),
                    detail: format!(
                        "{} values for {} columns",
                        record.values.len(),
                        schema.width()
                    ),
                });
            }
        }
        Ok(Self { schema, records })
    }

    /// In-memory table with positional destination columns; trip ids are the
    /// row numbers.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<f64>>) -> Result<Self> {
        let schema = Schema::positional(columns.iter().map(|c| c.to_string()).collect())?;
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| Record {
                trip_id: i.to_string(),
                snapshot: None,
                values,
            })
            .collect();
        Self::new(schema, records)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, layout: &Layout) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, layout)
    }

    pub fn from_reader<R: io::Read>(reader: R, layout: &Layout) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();
        let id_column = normalize_header(&layout.id_column);
        let snapshot_column = normalize_header(&layout.snapshot_column);
        let skip: Vec<String> = layout.skip.iter().map(|s| normalize_header(s)).collect();

        let id_idx = headers.iter().position(|h| *h == id_column);
        let snapshot_idx = headers.iter().position(|h| *h == snapshot_column);
        let numeric: Vec<usize> = (0..headers.len())
            .filter(|&i| Some(i) != id_idx && Some(i) != snapshot_idx && !skip.contains(&headers[i]))
            .collect();

        let schema = Schema::for_layout(
            numeric.iter().map(|&i| headers[i].clone()).collect(),
            layout,
        )?;

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let mut values = Vec::with_capacity(numeric.len());
            for &i in &numeric {
                let cell = record.get(i).unwrap_or("").trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse().map_err(|_| PredictError::Parse {
                        row,
                        column: headers[i].clone(),
                        value: cell.to_string(),
                    })?
                };
                values.push(value);
            }
            records.push(Record {
                trip_id: id_idx
                    .and_then(|i| record.get(i))
                    .map(str::to_string)
                    .unwrap_or_else(|| row.to_string()),
                snapshot: snapshot_idx.and_then(|i| record.get(i)).map(str::to_string),
                values,
            });
        }

        tracing::debug!(
            rows = records.len(),
            columns = schema.width(),
            "loaded trip table"
        );
        Self::new(schema, records)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(move |r| r.values[idx])
    }

    pub fn destination(&self, row: usize) -> LonLat {
        let values = &self.records[row].values;
        LonLat::new(values[self.schema.dest_lon], values[self.schema.dest_lat])
    }

    /// Rows whose trip id equals `trip_id`, as a new table.
    pub fn trip(&self, trip_id: &str) -> Table {
        Table {
            schema: self.schema.clone(),
            records: self
                .records
                .iter()
                .filter(|r| r.trip_id == trip_id)
                .cloned()
                .collect(),
        }
    }

    pub fn query(&self, row: usize) -> QueryTrip {
        let record = &self.records[row];
        QueryTrip {
            columns: self.schema.columns.clone(),
            values: record.values.clone(),
        }
    }
}

/// A trip in progress: named feature values, optionally with its destination.
#[derive(Clone, Debug, Default)]
pub struct QueryTrip {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl QueryTrip {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self {
            columns: pairs.iter().map(|(c, _)| normalize_header(c)).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    /// Values reordered to the training schema. The query must supply every
    /// feature column of `schema` exactly once and nothing else; destination
    /// slots it omits are NaN.
    pub fn align(&self, schema: &Schema) -> Result<Vec<f64>> {
        let mut aligned = vec![f64::NAN; schema.width()];
        let mut seen = vec![false; schema.width()];
        for (name, &value) in self.columns.iter().zip(&self.values) {
            let idx = schema
                .index_of(name)
                .ok_or_else(|| PredictError::SchemaMismatch {
                    column: name.clone(),
                    detail: "not present in training table".to_string(),
                })?;
            if seen[idx] {
                return Err(PredictError::SchemaMismatch {
                    column: name.clone(),
                    detail: "duplicate column".to_string(),
                });
            }
            aligned[idx] = value;
            seen[idx] = true;
        }
        if let Some((_, name)) = schema.features().find(|(i, _)| !seen[*i]) {
            return Err(PredictError::SchemaMismatch {
                column: name.to_string(),
                detail: "missing from query".to_string(),
            });
        }
        Ok(aligned)
    }
}
