//! Error taxonomy shared by every stage of a run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbTestError {
    /// Assignment or aggregation was asked to work on zero records.
    #[error("dataset is empty: no users to assign or summarize")]
    EmptyDataset,

    /// The variant × outcome table has a missing row or column, so the
    /// chi-square statistic is undefined.
    #[error("contingency table is degenerate: {reason}")]
    DegenerateContingency { reason: String },

    /// A required outcome column is absent from the supplied data.
    #[error("required column `{column}` is missing from the dataset")]
    SchemaMismatch { column: String },

    #[error("row {row}: column `{column}` has invalid value `{value}`")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AbTestError>;
