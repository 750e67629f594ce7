use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Writer};

use crate::core::geodesy::Coordinate;
use crate::models::station::{Station, Technology};
use crate::utils::logging::StatusLog;

#[derive(Debug)]
pub enum StationLoadError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    /// A required header is absent; nothing can be loaded.
    MissingColumn(String),
}

impl From<std::io::Error> for StationLoadError {
    fn from(err: std::io::Error) -> Self {
        StationLoadError::IoError(err)
    }
}

impl From<csv::Error> for StationLoadError {
    fn from(err: csv::Error) -> Self {
        StationLoadError::CsvError(err)
    }
}

impl std::fmt::Display for StationLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationLoadError::IoError(e) => write!(f, "IO error: {}", e),
            StationLoadError::CsvError(e) => write!(f, "CSV error: {}", e),
            StationLoadError::MissingColumn(name) => {
                write!(f, "Missing required column: {}", name)
            }
        }
    }
}

impl std::error::Error for StationLoadError {}

const NAME: &str = "Station Name";
const TECHNOLOGY: &str = "Technology";
const LATITUDE: &str = "Latitude";
const LONGITUDE: &str = "Longitude";
const CAPACITY: &str = "Maximum Capacity (MW)";

const OPTIONAL_COLUMNS: [&str; 11] = [
    "Turbine",
    "Rotor Diam",
    "No. turbines",
    "Area",
    "Power File",
    "Grid Line",
    "Direction",
    "Tilt",
    "Storage Hours",
    "Hub Height",
    "Zone",
];

/// Case-insensitive header lookup.
fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn required_index(headers: &StringRecord, name: &str) -> Result<usize, StationLoadError> {
    column_index(headers, name).ok_or_else(|| StationLoadError::MissingColumn(name.to_string()))
}

fn field<'a>(record: &'a StringRecord, idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Load a station catalogue from CSV. Malformed rows are skipped and
/// reported; a missing required column fails the whole load.
pub fn load_stations<P: AsRef<Path>>(
    path: P,
    log: &mut StatusLog,
) -> Result<Vec<Station>, StationLoadError> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    parse_stations(&contents, log)
}

pub fn parse_stations(
    contents: &str,
    log: &mut StatusLog,
) -> Result<Vec<Station>, StationLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let headers = reader.headers()?.clone();
    let name_idx = required_index(&headers, NAME)?;
    let technology_idx = required_index(&headers, TECHNOLOGY)?;
    let latitude_idx = required_index(&headers, LATITUDE)?;
    let longitude_idx = required_index(&headers, LONGITUDE)?;
    let capacity_idx = required_index(&headers, CAPACITY)?;
    let optional: Vec<Option<usize>> = OPTIONAL_COLUMNS
        .iter()
        .map(|name| column_index(&headers, name))
        .collect();
    let existing_idx = column_index(&headers, "Existing");

    let mut stations = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = row + 2; // 1-based, after the header

        let Some(name) = field(&record, Some(name_idx)) else {
            log.push(format!("Row {}: missing station name, skipped", line));
            continue;
        };
        let technology = match field(&record, Some(technology_idx))
            .map(Technology::from_str)
        {
            Some(Ok(technology)) => technology,
            _ => {
                log.push(format!("Row {} ('{}'): bad technology, skipped", line, name));
                continue;
            }
        };
        let coordinate = match (
            field(&record, Some(latitude_idx)).and_then(|v| v.parse::<f64>().ok()),
            field(&record, Some(longitude_idx)).and_then(|v| v.parse::<f64>().ok()),
        ) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                Coordinate::new(lat, lon)
            }
            _ => {
                log.push(format!("Row {} ('{}'): bad coordinates, skipped", line, name));
                continue;
            }
        };
        let Some(capacity) = field(&record, Some(capacity_idx)).and_then(|v| v.parse().ok())
        else {
            log.push(format!("Row {} ('{}'): bad capacity, skipped", line, name));
            continue;
        };

        let mut station = Station::new(name.to_string(), technology, coordinate, capacity);
        station.turbine = field(&record, optional[0]).map(str::to_string);
        station.rotor_diameter = field(&record, optional[1]).and_then(|v| v.parse().ok());
        station.no_turbines = field(&record, optional[2]).and_then(|v| v.parse().ok());
        station.area = field(&record, optional[3]).and_then(|v| v.parse().ok());
        station.power_file = field(&record, optional[4]).map(str::to_string);
        station.grid_line = field(&record, optional[5]).map(str::to_string);
        station.direction = field(&record, optional[6]).map(str::to_string);
        station.tilt = field(&record, optional[7]).and_then(|v| v.parse().ok());
        station.storage_hours = field(&record, optional[8]).and_then(|v| v.parse().ok());
        station.hub_height = field(&record, optional[9]).and_then(|v| v.parse().ok());
        station.zone = field(&record, optional[10]).map(str::to_string);
        station.existing = field(&record, existing_idx)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "on" | "1"))
            .unwrap_or(false);

        stations.push(station);
    }

    Ok(stations)
}

/// Write the catalogue back out with the full column set. A load/save
/// cycle preserves every populated field modulo numeric formatting.
pub fn save_stations<P: AsRef<Path>>(path: P, stations: &[Station]) -> Result<(), StationLoadError> {
    let mut writer = Writer::from_path(path)?;

    let mut headers = vec![NAME, TECHNOLOGY, LATITUDE, LONGITUDE, CAPACITY];
    headers.extend(OPTIONAL_COLUMNS);
    headers.push("Existing");
    writer.write_record(&headers)?;

    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    for station in stations {
        writer.write_record(&[
            station.name.clone(),
            station.technology.to_string(),
            station.coordinate.lat.to_string(),
            station.coordinate.lon.to_string(),
            station.capacity.to_string(),
            text(&station.turbine),
            number(station.rotor_diameter),
            station
                .no_turbines
                .map(|v| v.to_string())
                .unwrap_or_default(),
            number(station.area),
            text(&station.power_file),
            text(&station.grid_line),
            text(&station.direction),
            number(station.tilt),
            number(station.storage_hours),
            number(station.hub_height),
            text(&station.zone),
            if station.existing { "yes" } else { "" }.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Station Name,Technology,Latitude,Longitude,Maximum Capacity (MW),Turbine,Rotor Diam,No. turbines,Grid Line,Existing
Collgar Wind,Wind,-31.65,118.15,206,V90-2.0,90,111,,
Greenough PV,Fixed PV,-28.95,114.7,10,,,,,yes
Routed Wind,Wind,-31.8,116.2,50,,,,\"-31.6,116.3 -31.4,116.4\",
";

    #[test]
    fn loads_required_and_optional_columns() {
        let mut log = StatusLog::new();
        let stations = parse_stations(SAMPLE, &mut log).unwrap();
        assert_eq!(stations.len(), 3);
        assert!(log.is_empty());

        let collgar = &stations[0];
        assert_eq!(collgar.name, "Collgar Wind");
        assert_eq!(collgar.technology, Technology::Wind);
        assert_eq!(collgar.capacity, 206.0);
        assert_eq!(collgar.turbine.as_deref(), Some("V90-2.0"));
        assert_eq!(collgar.rotor_diameter, Some(90.0));
        assert_eq!(collgar.no_turbines, Some(111));
        assert!(!collgar.existing);

        assert!(stations[1].existing);
        assert_eq!(stations[2].grid_line_waypoints().map(|w| w.len()), Some(2));
    }

    #[test]
    fn bad_rows_are_skipped_and_logged() {
        let contents = "\
Station Name,Technology,Latitude,Longitude,Maximum Capacity (MW)
Good,Wind,-31.5,116.5,100
Bad Tech,Cold Fusion,-31.5,116.5,100
Bad Coord,Wind,-95.0,116.5,100
Bad Cap,Wind,-31.5,116.5,lots
";
        let mut log = StatusLog::new();
        let stations = parse_stations(contents, &mut log).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Good");
        assert_eq!(log.get_log().len(), 3);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let contents = "Station Name,Latitude,Longitude\nA,-31.0,116.0\n";
        let mut log = StatusLog::new();
        assert!(matches!(
            parse_stations(contents, &mut log),
            Err(StationLoadError::MissingColumn(_))
        ));
    }

    #[test]
    fn catalogue_round_trips() {
        let mut log = StatusLog::new();
        let stations = parse_stations(SAMPLE, &mut log).unwrap();

        let dir = std::env::temp_dir().join("gridsite-station-roundtrip.csv");
        save_stations(&dir, &stations).unwrap();
        let reloaded = load_stations(&dir, &mut log).unwrap();
        std::fs::remove_file(&dir).ok();

        assert_eq!(reloaded.len(), stations.len());
        for (a, b) in stations.iter().zip(&reloaded) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.technology, b.technology);
            assert_eq!(a.coordinate, b.coordinate);
            assert_eq!(a.capacity, b.capacity);
            assert_eq!(a.turbine, b.turbine);
            assert_eq!(a.no_turbines, b.no_turbines);
            assert_eq!(a.grid_line, b.grid_line);
            assert_eq!(a.existing, b.existing);
        }
    }
}
