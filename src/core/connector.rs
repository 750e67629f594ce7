use std::fmt;

use crate::core::geodesy::{distance, within_polygon, Coordinate};
use crate::core::grid::Grid;
use crate::models::segment::{Segment, Upstream};
use crate::models::station::Station;
use crate::utils::logging::StatusLog;
use crate::utils::progress::ProgressHooks;

#[derive(Debug)]
pub enum ConnectError {
    /// Station falls outside the map polygon; it is rejected with no tail.
    OutOfBounds { station: String },
    /// Nothing to connect to: no segment, no load centre, no other station.
    NoTarget { station: String },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::OutOfBounds { station } => {
                write!(f, "Station '{}' is outside the map polygon", station)
            }
            ConnectError::NoTarget { station } => {
                write!(f, "Station '{}' has nothing to connect to", station)
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// Result of splicing one station into the network.
#[derive(Debug, Clone)]
pub struct Splice {
    pub station: String,
    pub tail_index: usize,
    /// Direct tail length in km.
    pub grid_len: f64,
    pub connection: Coordinate,
    pub upstream: Upstream,
    /// The trunk arc the tail was spliced into, when there was one.
    pub trunk_arc: Option<(usize, usize)>,
}

/// Connect one station: honour explicit grid-line waypoints, find the
/// nearest point on any existing segment, fall back to the nearest load
/// centre and then to the nearest other station, and append the tail.
pub fn connect_station(
    grid: &mut Grid,
    station: &Station,
    catalogue: &[Station],
) -> Result<Splice, ConnectError> {
    if !within_polygon(&station.coordinate, &grid.boundary) {
        return Err(ConnectError::OutOfBounds {
            station: station.name.clone(),
        });
    }

    // Waypoints are honoured verbatim; only the last one is connected by
    // nearest-point logic.
    let mut points = vec![station.coordinate];
    if let Some(waypoints) = station.grid_line_waypoints() {
        points.extend(waypoints);
    }
    let target = *points.last().unwrap_or(&station.coordinate);

    let own_segments: Vec<usize> = grid
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.name == station.name)
        .map(|(idx, _)| idx)
        .collect();

    let (connection, upstream, trunk_arc) = match grid.nearest_connection(&target, &own_segments) {
        Some(found) => (
            found.point,
            Upstream::Segment(found.segment),
            Some((found.segment, found.arc)),
        ),
        None => match nearest_load_centre(grid, &target) {
            Some(centre) => (centre, Upstream::LoadCentre, None),
            None => match nearest_other_station(station, catalogue, &target) {
                Some(other) => (other, Upstream::Station, None),
                None => {
                    return Err(ConnectError::NoTarget {
                        station: station.name.clone(),
                    })
                }
            },
        },
    };

    // A coincident vertex still gets a zero-length tail so the station
    // keeps its own graph identity.
    if points.last() != Some(&connection) || points.len() < 2 {
        points.push(connection);
    }

    let tail = Segment::tail(station.name.clone(), points, upstream);
    let grid_len = tail.length_km;
    let tail_index = grid.add_tail(tail);

    Ok(Splice {
        station: station.name.clone(),
        tail_index,
        grid_len,
        connection,
        upstream,
        trunk_arc,
    })
}

fn nearest_load_centre(grid: &Grid, target: &Coordinate) -> Option<Coordinate> {
    grid.load_centres
        .iter()
        .min_by(|a, b| {
            distance(target, &a.coordinate).total_cmp(&distance(target, &b.coordinate))
        })
        .map(|centre| centre.coordinate)
}

fn nearest_other_station(
    station: &Station,
    catalogue: &[Station],
    target: &Coordinate,
) -> Option<Coordinate> {
    catalogue
        .iter()
        .filter(|other| other.name != station.name)
        .min_by(|a, b| {
            distance(target, &a.coordinate).total_cmp(&distance(target, &b.coordinate))
        })
        .map(|other| other.coordinate)
}

/// Splice every station in catalogue order. Rejected stations become
/// `None` entries and a diagnostic; returns true when the run was cut
/// short by the cancellation predicate.
pub fn splice_all(
    grid: &mut Grid,
    stations: &[Station],
    hooks: &ProgressHooks,
    log: &mut StatusLog,
) -> (Vec<Option<Splice>>, bool) {
    let total = stations.len();
    let mut splices = Vec::with_capacity(total);

    for (idx, station) in stations.iter().enumerate() {
        if hooks.cancelled() {
            splices.resize(total, None);
            return (splices, true);
        }
        hooks.report(idx, total);

        match connect_station(grid, station, stations) {
            Ok(splice) => splices.push(Some(splice)),
            Err(err) => {
                log.push(err.to_string());
                splices.push(None);
            }
        }
    }
    hooks.report(total, total);

    (splices, false)
}
