use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::config::settings::Config;
use crate::core::geodesy::{within_polygon, Coordinate};
use crate::core::grid::Grid;
use crate::models::segment::Segment;
use crate::utils::logging::StatusLog;

#[derive(Debug)]
pub enum GridLoadError {
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl From<std::io::Error> for GridLoadError {
    fn from(err: std::io::Error) -> Self {
        GridLoadError::IoError(err)
    }
}

impl From<serde_json::Error> for GridLoadError {
    fn from(err: serde_json::Error) -> Self {
        GridLoadError::JsonError(err)
    }
}

impl std::fmt::Display for GridLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridLoadError::IoError(e) => write!(f, "IO error: {}", e),
            GridLoadError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for GridLoadError {}

/// One polyline in the network file. Points are `[lat, lon]` pairs;
/// altitudes from the upstream extraction are already stripped.
#[derive(Debug, Deserialize)]
struct SegmentRecord {
    name: String,
    #[serde(default)]
    style: String,
    points: Vec<[f64; 2]>,
    #[serde(default)]
    dispatchable: bool,
}

#[derive(Debug, Deserialize)]
struct GridFile {
    segments: Vec<SegmentRecord>,
}

/// Load the trunk catalogue and build the grid. Vertices outside the map
/// polygon are dropped; a segment left with fewer than two vertices is
/// skipped and reported.
pub fn load_grid<P: AsRef<Path>>(
    path: P,
    config: &Config,
    log: &mut StatusLog,
) -> Result<Grid, GridLoadError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let grid_file: GridFile = serde_json::from_reader(reader)?;
    Ok(build_grid(grid_file, config, log))
}

pub fn parse_grid(
    contents: &str,
    config: &Config,
    log: &mut StatusLog,
) -> Result<Grid, GridLoadError> {
    let grid_file: GridFile = serde_json::from_str(contents)?;
    Ok(build_grid(grid_file, config, log))
}

fn build_grid(grid_file: GridFile, config: &Config, log: &mut StatusLog) -> Grid {
    let mut segments = Vec::with_capacity(grid_file.segments.len());
    for record in grid_file.segments {
        let total = record.points.len();
        let points: Vec<Coordinate> = record
            .points
            .into_iter()
            .map(|[lat, lon]| Coordinate::new(lat, lon))
            .filter(|p| within_polygon(p, &config.map_polygon))
            .collect();
        if points.len() < total {
            log.push(format!(
                "Segment '{}': {} of {} vertices outside the map polygon, dropped",
                record.name,
                total - points.len(),
                total
            ));
        }
        if points.len() < 2 {
            log.push(format!(
                "Segment '{}' has fewer than two vertices inside the map, skipped",
                record.name
            ));
            continue;
        }
        segments.push(Segment::trunk(
            record.name,
            record.style,
            points,
            record.dispatchable,
        ));
    }
    Grid::new(config, segments)
}
