use std::collections::BTreeMap;

use crate::config::constants::{round2, HOURS_PER_YEAR};
use crate::config::settings::Config;
use crate::core::grid::Grid;
use crate::core::router::StationRoute;
use crate::models::station::Station;

/// Financial and energy summary for one station, derived after routing and
/// a balance run.
#[derive(Debug, Clone)]
pub struct StationSummary {
    pub name: String,
    pub technology: String,
    pub capacity_mw: f64,
    pub annual_energy_mwh: f64,
    pub capacity_factor: f64,
    pub grid_len_km: f64,
    pub grid_path_len_km: f64,
    pub line_class: Option<String>,
    pub line_cost: f64,
    pub substation_cost: f64,
    /// Resistive transmission loss at peak, MW.
    pub loss_mw: f64,
    pub reachable: bool,
}

/// Build per-station summaries. Hourly generation comes from the balance
/// input keyed by station name; a station with no series reports zero
/// energy. An unreachable station keeps its energy figures but carries no
/// grid cost.
pub fn station_summaries(
    stations: &[Station],
    routes: &[StationRoute],
    grid: &Grid,
    config: &Config,
    series: &BTreeMap<String, Vec<f64>>,
) -> Vec<StationSummary> {
    stations
        .iter()
        .zip(routes)
        .map(|(station, route)| {
            let annual_energy: f64 = series
                .get(&station.name)
                .map(|values| values.iter().sum())
                .unwrap_or(0.0);
            let capacity_factor = if station.capacity > 0.0 {
                annual_energy / (station.capacity * HOURS_PER_YEAR as f64)
            } else {
                0.0
            };

            let dispatchable_mw = if config.is_dispatchable(&station.technology) {
                station.capacity
            } else {
                0.0
            };
            let (line_class, line_cost, substation_cost, loss_mw) = if route.reachable {
                match grid.line_cost(station.capacity, dispatchable_mw) {
                    Some((per_km, tag)) => {
                        let substation = grid.substation_cost(&tag);
                        (
                            Some(tag),
                            round2(per_km * route.grid_path_len),
                            substation,
                            round2(station.capacity * grid.line_loss * route.grid_path_len),
                        )
                    }
                    None => (None, 0.0, 0.0, 0.0),
                }
            } else {
                (None, 0.0, 0.0, 0.0)
            };

            StationSummary {
                name: station.name.clone(),
                technology: station.technology.to_string(),
                capacity_mw: station.capacity,
                annual_energy_mwh: round2(annual_energy),
                capacity_factor,
                grid_len_km: route.grid_len,
                grid_path_len_km: route.grid_path_len,
                line_class,
                line_cost,
                substation_cost,
                loss_mw,
                reachable: route.reachable,
            }
        })
        .collect()
}
