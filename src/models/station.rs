use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::geodesy::Coordinate;

/// Generation technology tag. `Fossil` captures the family of
/// `Fossil <fuel>` tags so a catalogue round-trips without a fixed list of
/// fuels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    Wind,
    OffshoreWind,
    RooftopPv,
    FixedPv,
    SingleAxisPv,
    DualAxisPv,
    Biomass,
    Geothermal,
    Cst,
    SolarThermal,
    Hydro,
    Wave,
    PumpedHydro,
    Other,
    Fossil(String),
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Wind" => Ok(Technology::Wind),
            "Offshore Wind" => Ok(Technology::OffshoreWind),
            "Rooftop PV" => Ok(Technology::RooftopPv),
            "Fixed PV" => Ok(Technology::FixedPv),
            "Single Axis PV" => Ok(Technology::SingleAxisPv),
            "Dual Axis PV" => Ok(Technology::DualAxisPv),
            "Biomass" => Ok(Technology::Biomass),
            "Geothermal" => Ok(Technology::Geothermal),
            "CST" => Ok(Technology::Cst),
            "Solar Thermal" => Ok(Technology::SolarThermal),
            "Hydro" => Ok(Technology::Hydro),
            "Wave" => Ok(Technology::Wave),
            "Pumped Hydro" => Ok(Technology::PumpedHydro),
            "Other" => Ok(Technology::Other),
            other if other.starts_with("Fossil") => {
                let fuel = other.trim_start_matches("Fossil").trim();
                Ok(Technology::Fossil(fuel.to_string()))
            }
            other => Err(format!("Unknown technology: {}", other)),
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Technology::Wind => write!(f, "Wind"),
            Technology::OffshoreWind => write!(f, "Offshore Wind"),
            Technology::RooftopPv => write!(f, "Rooftop PV"),
            Technology::FixedPv => write!(f, "Fixed PV"),
            Technology::SingleAxisPv => write!(f, "Single Axis PV"),
            Technology::DualAxisPv => write!(f, "Dual Axis PV"),
            Technology::Biomass => write!(f, "Biomass"),
            Technology::Geothermal => write!(f, "Geothermal"),
            Technology::Cst => write!(f, "CST"),
            Technology::SolarThermal => write!(f, "Solar Thermal"),
            Technology::Hydro => write!(f, "Hydro"),
            Technology::Wave => write!(f, "Wave"),
            Technology::PumpedHydro => write!(f, "Pumped Hydro"),
            Technology::Other => write!(f, "Other"),
            Technology::Fossil(fuel) if fuel.is_empty() => write!(f, "Fossil"),
            Technology::Fossil(fuel) => write!(f, "Fossil {}", fuel),
        }
    }
}

impl Technology {
    pub fn is_fossil(&self) -> bool {
        matches!(self, Technology::Fossil(_))
    }

    pub fn is_intermittent(&self) -> bool {
        matches!(
            self,
            Technology::Wind
                | Technology::OffshoreWind
                | Technology::RooftopPv
                | Technology::FixedPv
                | Technology::SingleAxisPv
                | Technology::DualAxisPv
                | Technology::Wave
        )
    }
}

/// A candidate or existing generation station. Immutable during balance
/// runs; technology-specific parameters are passed through unexamined by
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub technology: Technology,
    pub coordinate: Coordinate,
    pub capacity: f64,
    pub turbine: Option<String>,
    pub rotor_diameter: Option<f64>,
    pub no_turbines: Option<u32>,
    pub area: Option<f64>,
    pub power_file: Option<String>,
    /// Raw waypoint list between the station and its nominal connection
    /// point, as loaded. Parsed on demand by `grid_line_waypoints`.
    pub grid_line: Option<String>,
    pub direction: Option<String>,
    pub tilt: Option<f64>,
    pub storage_hours: Option<f64>,
    pub hub_height: Option<f64>,
    pub zone: Option<String>,
    /// True for stations that were already connected when the catalogue was
    /// loaded; routed only when `trace_existing` is set.
    pub existing: bool,
}

impl Station {
    pub fn new(name: String, technology: Technology, coordinate: Coordinate, capacity: f64) -> Self {
        Self {
            name,
            technology,
            coordinate,
            capacity,
            turbine: None,
            rotor_diameter: None,
            no_turbines: None,
            area: None,
            power_file: None,
            grid_line: None,
            direction: None,
            tilt: None,
            storage_hours: None,
            hub_height: None,
            zone: None,
            existing: false,
        }
    }

    /// Waypoints from the station outward, parsed from the `grid_line`
    /// field. The format is whitespace-separated `lat,lon` pairs; malformed
    /// entries are dropped rather than failing the station.
    pub fn grid_line_waypoints(&self) -> Option<Vec<Coordinate>> {
        let raw = self.grid_line.as_deref()?;
        let points: Vec<Coordinate> = raw
            .split_whitespace()
            .filter_map(|pair| {
                let (lat, lon) = pair.split_once(',')?;
                Some(Coordinate::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?))
            })
            .collect();
        if points.is_empty() {
            None
        } else {
            Some(points)
        }
    }
}

/// A named demand sink that terminates routing paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadCentre {
    pub name: String,
    pub coordinate: Coordinate,
}

impl LoadCentre {
    pub fn new(name: String, coordinate: Coordinate) -> Self {
        Self { name, coordinate }
    }
}
