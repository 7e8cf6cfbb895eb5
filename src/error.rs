use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("training set has no rows")]
    EmptyTrainingSet,

    #[error("none of the {rows} training rows is usable: each lacks a weighted value or a destination")]
    NoUsableNeighbours { rows: usize },

    #[error("all {neighbours} selected neighbours have an infinite gap; feature values overflow, try scaling")]
    GapOverflow { neighbours: usize },

    #[error("schema mismatch at column {column}: {detail}")]
    SchemaMismatch { column: String, detail: String },

    #[error("weight given for unknown column {0}")]
    UnknownColumn(String),

    #[error("weight for column {column} must be finite and non-negative, got {weight}")]
    InvalidWeight { column: String, weight: f64 },

    #[error("destination column {0} cannot carry a weight")]
    WeightOnDestination(String),

    #[error("query has no value for weighted column {column}")]
    MissingQueryValue { column: String },

    #[error("required column {0} not found in header")]
    MissingColumn(String),

    #[error("row {row}, column {column}: cannot parse {value:?} as a number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("malformed weight {0:?}, expected NAME=VALUE")]
    MalformedWeight(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PredictError>;
