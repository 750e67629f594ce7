use std::collections::HashMap;

use rayon::prelude::*;

use crate::config::expression::CostRow;
use crate::config::settings::Config;
use crate::core::geodesy::{point_to_segment, within_polygon, Coordinate, SegmentMetric};
use crate::models::segment::Segment;
use crate::models::station::LoadCentre;

/// The closest available splice point for a new station: the foot of the
/// perpendicular on `segment`'s arc number `arc`.
#[derive(Debug, Clone)]
pub struct Connection {
    pub distance_km: f64,
    pub point: Coordinate,
    pub segment: usize,
    pub arc: usize,
}

/// Immutable catalogue of transmission segments plus the parametric cost
/// tables. Loaded once; the connector appends tails and the router updates
/// peak counters, nothing else mutates it.
#[derive(Debug, Clone)]
pub struct Grid {
    pub segments: Vec<Segment>,
    pub load_centres: Vec<LoadCentre>,
    s_lines: Vec<CostRow>,
    d_lines: Vec<CostRow>,
    substation_costs: HashMap<String, f64>,
    pub line_loss: f64,
    pub boundary: Vec<Coordinate>,
    metric: SegmentMetric,
}

impl Grid {
    pub fn new(config: &Config, segments: Vec<Segment>) -> Self {
        Self {
            segments,
            load_centres: config.load_centres.clone(),
            s_lines: config.s_lines.clone(),
            d_lines: config.d_lines.clone(),
            substation_costs: config.substation_costs.clone(),
            line_loss: config.line_loss,
            boundary: config.map_polygon.clone(),
            metric: if config.dummy_fix {
                SegmentMetric::Planar
            } else {
                SegmentMetric::Spherical
            },
        }
    }

    /// Append a connector-built tail; the tail becomes a valid splicing
    /// target for subsequent stations.
    pub fn add_tail(&mut self, tail: Segment) -> usize {
        self.segments.push(tail);
        self.segments.len() - 1
    }

    /// Smallest row meeting the load, or the largest row when the load
    /// exceeds every breakpoint.
    fn pick(table: &[CostRow], load: f64) -> Option<&CostRow> {
        table
            .iter()
            .find(|row| row.breakpoint_mw >= load)
            .or_else(|| table.last())
    }

    /// Parametric line cost in $/km plus the line-class tag.
    ///
    /// A pure-renewable request draws from the single-circuit table, a
    /// fully or predominantly dispatchable one from the dispatchable
    /// table; a mixed request sums one row from each, keeping the tag of
    /// the larger class.
    pub fn line_cost(&self, peak_load: f64, peak_dispatchable: f64) -> Option<(f64, String)> {
        if peak_dispatchable == 0.0 {
            let row = Self::pick(&self.s_lines, peak_load)?;
            return Some((row.cost_per_km, row.tag.clone()));
        }
        if peak_load == peak_dispatchable || peak_load > 2.0 * peak_dispatchable {
            let row = Self::pick(&self.d_lines, peak_load)?;
            return Some((row.cost_per_km, row.tag.clone()));
        }

        let d_row = Self::pick(&self.d_lines, peak_dispatchable)?;
        let s_row = Self::pick(&self.s_lines, peak_load - peak_dispatchable)?;
        let tag = if d_row.breakpoint_mw >= s_row.breakpoint_mw {
            d_row.tag.clone()
        } else {
            s_row.tag.clone()
        };
        Some((d_row.cost_per_km + s_row.cost_per_km, tag))
    }

    pub fn substation_cost(&self, tag: &str) -> f64 {
        self.substation_costs.get(tag).copied().unwrap_or(0.0)
    }

    /// Globally nearest point on any segment arc to `p`, skipping the
    /// excluded segment indices and any foot outside the map polygon.
    /// Scans arcs in parallel; ties resolve to the lowest segment then arc
    /// index, so the result is deterministic.
    pub fn nearest_connection(&self, p: &Coordinate, exclude: &[usize]) -> Option<Connection> {
        let metric = self.metric;
        let boundary = &self.boundary;
        self.segments
            .par_iter()
            .enumerate()
            .filter(|(idx, _)| !exclude.contains(idx))
            .flat_map_iter(|(idx, segment)| {
                segment.points.windows(2).enumerate().map(move |(arc, w)| {
                    let (distance_km, point) = point_to_segment(p, &w[0], &w[1], metric);
                    Connection {
                        distance_km,
                        point,
                        segment: idx,
                        arc,
                    }
                })
            })
            .filter(|c| within_polygon(&c.point, boundary))
            .min_by(|a, b| {
                a.distance_km
                    .total_cmp(&b.distance_km)
                    .then(a.segment.cmp(&b.segment))
                    .then(a.arc.cmp(&b.arc))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::expression::parse_cost_table;
    use crate::config::expression::parse_price_list;

    fn grid_with_tables() -> Grid {
        let prices = parse_price_list("SWER=1K, 132kV=5K, 330kV=20K").unwrap();
        let mut config = Config::default();
        config.s_lines =
            parse_cost_table("33 = 1 * SWER, 132 = 1 * 132kV, 330 = 1 * 330kV", &prices).unwrap();
        config.d_lines =
            parse_cost_table("132 = 2 * 132kV, 330 = 2 * 330kV", &prices).unwrap();
        config.substation_costs = parse_price_list("SWER=50K, 132kV=2M").unwrap();
        Grid::new(&config, Vec::new())
    }

    #[test]
    fn single_circuit_lookup() {
        let grid = grid_with_tables();
        let (cost, tag) = grid.line_cost(120.0, 0.0).unwrap();
        assert_eq!(cost, 5000.0);
        assert_eq!(tag, "132kV");

        let (cost, tag) = grid.line_cost(20.0, 0.0).unwrap();
        assert_eq!(cost, 1000.0);
        assert_eq!(tag, "SWER");
    }

    #[test]
    fn dispatchable_lookup() {
        let grid = grid_with_tables();
        let (cost, tag) = grid.line_cost(120.0, 120.0).unwrap();
        assert_eq!(cost, 10000.0);
        assert_eq!(tag, "132kV");

        // Mostly dispatchable: the dispatchable table still applies
        let (cost, tag) = grid.line_cost(300.0, 100.0).unwrap();
        assert_eq!(cost, 40000.0);
        assert_eq!(tag, "330kV");
    }

    #[test]
    fn mixed_lookup_sums_both_tables() {
        let grid = grid_with_tables();
        // 90 MW of which 50 dispatchable: 132kV double circuit + 132kV single
        let (cost, tag) = grid.line_cost(90.0, 50.0).unwrap();
        assert_eq!(cost, 15000.0);
        assert_eq!(tag, "132kV");
    }

    #[test]
    fn oversize_load_falls_back_to_largest_class() {
        let grid = grid_with_tables();
        let (cost, tag) = grid.line_cost(5000.0, 0.0).unwrap();
        assert_eq!(cost, 20000.0);
        assert_eq!(tag, "330kV");
    }

    #[test]
    fn substation_lookup_defaults_to_zero() {
        let grid = grid_with_tables();
        assert_eq!(grid.substation_cost("132kV"), 2e6);
        assert_eq!(grid.substation_cost("500kV"), 0.0);
    }

    #[test]
    fn nearest_connection_finds_interior_foot() {
        let mut grid = grid_with_tables();
        grid.segments.push(Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        ));
        let station = Coordinate::new(-31.5, 116.5);
        let connection = grid.nearest_connection(&station, &[]).unwrap();
        assert_eq!(connection.segment, 0);
        assert_eq!(connection.arc, 0);
        assert!((connection.distance_km - 55.46).abs() < 0.01);
        assert!((connection.point.lon - 116.5).abs() < 1e-3);
    }

    #[test]
    fn nearest_connection_honours_exclusions() {
        let mut grid = grid_with_tables();
        grid.segments.push(Segment::trunk(
            "Near".to_string(),
            String::new(),
            vec![Coordinate::new(-31.4, 116.0), Coordinate::new(-31.4, 117.0)],
            false,
        ));
        grid.segments.push(Segment::trunk(
            "Far".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        ));
        let station = Coordinate::new(-31.5, 116.5);
        let connection = grid.nearest_connection(&station, &[0]).unwrap();
        assert_eq!(connection.segment, 1);
    }

    #[test]
    fn nearest_connection_respects_map_polygon() {
        let mut config = Config::default();
        config.map_polygon = vec![
            Coordinate::new(-30.0, 115.0),
            Coordinate::new(-30.0, 116.4),
            Coordinate::new(-33.0, 116.4),
            Coordinate::new(-33.0, 115.0),
        ];
        let mut grid = Grid::new(&config, Vec::new());
        grid.segments.push(Segment::trunk(
            "Outside".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 117.0), Coordinate::new(-31.0, 118.0)],
            false,
        ));
        let station = Coordinate::new(-31.5, 116.5);
        assert!(grid.nearest_connection(&station, &[]).is_none());
    }
}
