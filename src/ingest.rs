//! CSV ingestion with schema validation.
//!
//! Required outcome columns are checked against the header before any row is
//! read. Attribute columns are optional; missing ones fall back to defaults
//! and a warning is logged.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::error::{AbTestError, Result};
use crate::record::{Dataset, Outcome, UserRecord};

const ATTRIBUTE_COLUMNS: [&str; 5] = ["user_id", "age", "location", "device", "click_rate"];
const UNKNOWN: &str = "unknown";

/// Column name → index lookup built from the header row.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Columns(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        )
    }

    fn get<'r>(&self, row: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.0.get(name).and_then(|&i| row.get(i)).map(str::trim)
    }

    fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

fn invalid(row: usize, column: &str, value: &str) -> AbTestError {
    AbTestError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Parse a binary indicator written as `0`/`1` (or `true`/`false`).
fn parse_flag(row: usize, column: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(true),
        "0" | "0.0" | "false" => Ok(false),
        _ => Err(invalid(row, column, value)),
    }
}

fn parse_outcome(
    columns: &Columns,
    record: &StringRecord,
    row: usize,
    outcome: Outcome,
) -> Result<Option<bool>> {
    columns
        .get(record, outcome.column())
        .map(|v| parse_flag(row, outcome.column(), v))
        .transpose()
}

/// Read a dataset from any CSV source. `outcomes` lists the columns that must
/// be present.
pub fn read_dataset<R: Read>(reader: R, outcomes: &[Outcome]) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let columns = Columns::new(rdr.headers()?);

    for outcome in outcomes {
        if !columns.contains(outcome.column()) {
            return Err(AbTestError::SchemaMismatch {
                column: outcome.column().to_string(),
            });
        }
    }
    let missing: Vec<_> = ATTRIBUTE_COLUMNS
        .iter()
        .filter(|c| !columns.contains(c))
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "attribute columns absent, using defaults");
    }

    let mut data = Dataset::new();
    let mut seen_ids = HashSet::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        // 1-based, counting the header line.
        let row = i + 2;

        let age = match columns.get(&record, "age") {
            Some(v) => v.parse::<u32>().map_err(|_| invalid(row, "age", v))?,
            None => 0,
        };
        let click_rate = match columns.get(&record, "click_rate") {
            Some(v) => v
                .parse::<f64>()
                .ok()
                .filter(|c| (0.0..1.0).contains(c))
                .ok_or_else(|| invalid(row, "click_rate", v))?,
            None => 0.0,
        };
        let user_id = columns
            .get(&record, "user_id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("user_{i}"));
        if user_id.is_empty() || !seen_ids.insert(user_id.clone()) {
            return Err(invalid(row, "user_id", &user_id));
        }
        let converted = parse_outcome(&columns, &record, row, Outcome::Converted)?
            .ok_or_else(|| invalid(row, "converted", ""))?;

        data.push(UserRecord {
            user_id,
            age,
            location: columns.get(&record, "location").unwrap_or(UNKNOWN).to_string(),
            device: columns.get(&record, "device").unwrap_or(UNKNOWN).to_string(),
            click_rate,
            converted,
            engaged: parse_outcome(&columns, &record, row, Outcome::Engaged)?,
            signed_up: parse_outcome(&columns, &record, row, Outcome::SignedUp)?,
        });
    }
    Ok(data)
}

/// Load a dataset from a CSV file on disk.
pub fn load_csv(path: &Path, outcomes: &[Outcome]) -> Result<Dataset> {
    let file = File::open(path)?;
    let data = read_dataset(file, outcomes)?;
    info!(path = %path.display(), rows = data.len(), "loaded dataset");
    Ok(data)
}
