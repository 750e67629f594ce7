use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::utils::logging::StatusLog;

#[derive(Debug)]
pub enum SeriesLoadError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    /// The file has a header row but no data columns.
    NoColumns,
}

impl From<std::io::Error> for SeriesLoadError {
    fn from(err: std::io::Error) -> Self {
        SeriesLoadError::IoError(err)
    }
}

impl From<csv::Error> for SeriesLoadError {
    fn from(err: csv::Error) -> Self {
        SeriesLoadError::CsvError(err)
    }
}

impl std::fmt::Display for SeriesLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesLoadError::IoError(e) => write!(f, "IO error: {}", e),
            SeriesLoadError::CsvError(e) => write!(f, "CSV error: {}", e),
            SeriesLoadError::NoColumns => write!(f, "Series file has no data columns"),
        }
    }
}

impl std::error::Error for SeriesLoadError {}

/// The balance engine recognises its load series by prefix; a lone-column
/// file and any header mentioning "load" both normalise to that prefix.
fn series_key(header: &str, single_column: bool) -> String {
    let header = header.trim();
    if header.starts_with("Load") {
        return header.to_string();
    }
    if single_column || header.to_lowercase().contains("load") {
        return if header.is_empty() {
            "Load".to_string()
        } else {
            format!("Load ({})", header)
        };
    }
    header.to_string()
}

/// Load hourly series from CSV: either a single load column or one column
/// per station. A header containing "kWh" marks a column for conversion to
/// MWh. Unparseable cells become zero and are reported.
pub fn load_series<P: AsRef<Path>>(
    path: P,
    log: &mut StatusLog,
) -> Result<BTreeMap<String, Vec<f64>>, SeriesLoadError> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    parse_series(&contents, log)
}

pub fn parse_series(
    contents: &str,
    log: &mut StatusLog,
) -> Result<BTreeMap<String, Vec<f64>>, SeriesLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(SeriesLoadError::NoColumns);
    }
    let single_column = headers.len() == 1;
    let keys: Vec<String> = headers
        .iter()
        .map(|h| series_key(h, single_column))
        .collect();
    let kwh: Vec<bool> = headers
        .iter()
        .map(|h| h.to_lowercase().contains("kwh"))
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keys.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        for (col, column) in columns.iter_mut().enumerate() {
            let raw = record.get(col).map(str::trim).unwrap_or("");
            let value = match raw.parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    if !raw.is_empty() {
                        log.push(format!(
                            "Series '{}' row {}: '{}' is not a number, using 0",
                            keys[col],
                            row + 2,
                            raw
                        ));
                    }
                    0.0
                }
            };
            column.push(if kwh[col] { value / 1000.0 } else { value });
        }
    }

    Ok(keys.into_iter().zip(columns).collect())
}
