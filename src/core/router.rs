use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::config::settings::Config;
use crate::core::connector::Splice;
use crate::core::geodesy::{distance, Coordinate};
use crate::core::grid::Grid;
use crate::models::station::Station;
use crate::utils::logging::StatusLog;
use crate::utils::progress::ProgressHooks;

/// Undirected weighted graph over the augmented segment catalogue.
/// Vertices are canonical coordinates interned to dense indices; the edge
/// index remembers which segment produced each edge, most recent segment
/// winning.
#[derive(Debug, Default)]
pub struct RouteGraph {
    node_index: HashMap<String, usize>,
    nodes: Vec<Coordinate>,
    adjacency: Vec<Vec<(usize, f64)>>,
    edge_segments: HashMap<(usize, usize), usize>,
}

impl RouteGraph {
    /// Materialise the graph from every arc of every segment, inject the
    /// splice-foot edges onto each spliced trunk arc, and intern the load
    /// centres so they exist even when no segment touches them.
    pub fn build(grid: &Grid, splices: &[Option<Splice>]) -> Self {
        let mut graph = RouteGraph::default();

        for (idx, segment) in grid.segments.iter().enumerate() {
            for (a, b) in segment.arcs() {
                let ai = graph.intern(a);
                let bi = graph.intern(b);
                graph.add_edge(ai, bi, distance(a, b), idx);
            }
        }

        for splice in splices.iter().flatten() {
            let Some((segment, arc)) = splice.trunk_arc else {
                continue;
            };
            let foot = graph.intern(&splice.connection);
            let trunk = &grid.segments[segment];
            let a = trunk.points[arc];
            let b = trunk.points[arc + 1];
            let ai = graph.intern(&a);
            let bi = graph.intern(&b);
            graph.add_edge(foot, ai, distance(&splice.connection, &a), segment);
            graph.add_edge(foot, bi, distance(&splice.connection, &b), segment);
        }

        for centre in &grid.load_centres {
            graph.intern(&centre.coordinate);
        }

        graph
    }

    fn intern(&mut self, c: &Coordinate) -> usize {
        let key = c.key();
        if let Some(&idx) = self.node_index.get(&key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.node_index.insert(key, idx);
        self.nodes.push(*c);
        self.adjacency.push(Vec::new());
        idx
    }

    fn add_edge(&mut self, a: usize, b: usize, km: f64, segment: usize) {
        if a == b {
            return;
        }
        self.adjacency[a].push((b, km));
        self.adjacency[b].push((a, km));
        let key = (a.min(b), a.max(b));
        self.edge_segments.insert(key, segment);
    }

    pub fn node(&self, c: &Coordinate) -> Option<usize> {
        self.node_index.get(&c.key()).copied()
    }

    pub fn segment_of_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_segments.get(&(a.min(b), a.max(b))).copied()
    }
}

/// Min-heap entry; ties on distance resolve by insertion sequence.
#[derive(Debug, PartialEq)]
struct HeapEntry {
    dist: f64,
    seq: u64,
    node: usize,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .dist
            .total_cmp(&self.dist)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Routing outcome for one station.
#[derive(Debug, Clone)]
pub struct StationRoute {
    pub station: String,
    /// False when no path exists: the station still participates in the
    /// energy balance but contributes zero grid cost.
    pub reachable: bool,
    /// Whether attribution ran for this station.
    pub traced: bool,
    /// Direct tail length in km.
    pub grid_len: f64,
    /// Total traced length to the load centre in km.
    pub grid_path_len: f64,
    pub load_centre: Option<String>,
    pub segments: Vec<usize>,
}

impl StationRoute {
    fn untraced(station: &Station, grid_len: f64) -> Self {
        Self {
            station: station.name.clone(),
            reachable: true,
            traced: false,
            grid_len,
            grid_path_len: 0.0,
            load_centre: None,
            segments: Vec::new(),
        }
    }

    fn unreachable(station: &Station, grid_len: f64) -> Self {
        Self {
            station: station.name.clone(),
            reachable: false,
            traced: true,
            grid_len,
            grid_path_len: 0.0,
            load_centre: None,
            segments: Vec::new(),
        }
    }
}

/// Dijkstra with a lazy-deletion binary heap, stopping once any load
/// centre is settled. Returns (settled target, distances, predecessors).
fn shortest_to_any(
    graph: &RouteGraph,
    source: usize,
    targets: &HashMap<usize, String>,
) -> Option<(usize, Vec<f64>, Vec<Option<usize>>)> {
    let n = graph.nodes.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut done = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist[source] = 0.0;
    heap.push(HeapEntry {
        dist: 0.0,
        seq,
        node: source,
    });

    while let Some(entry) = heap.pop() {
        if done[entry.node] {
            continue;
        }
        done[entry.node] = true;

        if targets.contains_key(&entry.node) {
            return Some((entry.node, dist, prev));
        }

        for &(next, km) in &graph.adjacency[entry.node] {
            let candidate = dist[entry.node] + km;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(entry.node);
                seq += 1;
                heap.push(HeapEntry {
                    dist: candidate,
                    seq,
                    node: next,
                });
            }
        }
    }
    None
}

/// Trace one station to its nearest load centre and accumulate peak load,
/// peak dispatchable and line loss on every segment the path touches.
pub fn trace_station(
    graph: &RouteGraph,
    grid: &mut Grid,
    station: &Station,
    splice: &Splice,
    config: &Config,
) -> StationRoute {
    let targets: HashMap<usize, String> = grid
        .load_centres
        .iter()
        .filter_map(|centre| graph.node(&centre.coordinate).map(|idx| (idx, centre.name.clone())))
        .collect();

    let Some(source) = graph.node(&station.coordinate) else {
        return StationRoute::unreachable(station, splice.grid_len);
    };

    // Station sitting on a load centre: empty path, no attribution
    if let Some(name) = targets.get(&source) {
        let mut route = StationRoute::untraced(station, splice.grid_len);
        route.traced = true;
        route.load_centre = Some(name.clone());
        return route;
    }

    let Some((settled, dist, prev)) = shortest_to_any(graph, source, &targets) else {
        return StationRoute::unreachable(station, splice.grid_len);
    };

    // Reconstruct station -> load centre
    let mut path = Vec::new();
    let mut cursor = Some(settled);
    while let Some(node) = cursor {
        path.push(node);
        cursor = prev[node];
    }
    path.reverse();

    // With several load centres the path may pass through one on its way
    // to the settled target; the first centre met walking out from the
    // station is the true endpoint.
    let end = path
        .iter()
        .position(|node| targets.contains_key(node))
        .unwrap_or(path.len() - 1);
    path.truncate(end + 1);
    let endpoint = path[end];

    let mut touched = BTreeSet::new();
    for pair in path.windows(2) {
        if let Some(segment) = graph.segment_of_edge(pair[0], pair[1]) {
            touched.insert(segment);
        }
    }

    let is_dispatchable = config.is_dispatchable(&station.technology);
    for &idx in &touched {
        let segment = &mut grid.segments[idx];
        segment.peak_load += station.capacity;
        segment.peak_loss += station.capacity * grid.line_loss * segment.length_km;
        if is_dispatchable {
            segment.peak_dispatchable += station.capacity;
            segment.dispatchable = true;
        }
    }

    StationRoute {
        station: station.name.clone(),
        reachable: true,
        traced: true,
        grid_len: splice.grid_len,
        grid_path_len: crate::config::constants::round2(dist[endpoint]),
        load_centre: targets.get(&endpoint).cloned(),
        segments: touched.into_iter().collect(),
    }
}

/// Route every spliced station in catalogue order. Attribution accumulates
/// into shared segment counters, so this is strictly sequential.
pub fn trace_all(
    grid: &mut Grid,
    stations: &[Station],
    splices: &[Option<Splice>],
    config: &Config,
    hooks: &ProgressHooks,
    log: &mut StatusLog,
) -> (Vec<StationRoute>, bool) {
    let graph = RouteGraph::build(grid, splices);
    let total = stations.len();
    let mut routes = Vec::with_capacity(total);

    for (idx, station) in stations.iter().enumerate() {
        if hooks.cancelled() {
            return (routes, true);
        }
        hooks.report(idx, total);

        let Some(splice) = splices.get(idx).and_then(Option::as_ref) else {
            routes.push(StationRoute::unreachable(station, 0.0));
            continue;
        };
        if station.existing && !config.trace_existing {
            routes.push(StationRoute::untraced(station, splice.grid_len));
            continue;
        }

        let route = trace_station(&graph, grid, station, splice, config);
        if !route.reachable {
            log.push(format!(
                "Station '{}' is unreachable from any load centre; grid cost set to zero",
                station.name
            ));
        }
        routes.push(route);
    }
    hooks.report(total, total);

    (routes, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connector::splice_all;
    use crate::models::segment::Segment;
    use crate::models::station::{LoadCentre, Technology};

    fn station(name: &str, lat: f64, lon: f64, technology: Technology) -> Station {
        Station::new(name.to_string(), technology, Coordinate::new(lat, lon), 100.0)
    }

    fn run_pipeline(
        config: &Config,
        trunks: Vec<Segment>,
        stations: &[Station],
    ) -> (Grid, Vec<StationRoute>) {
        let mut grid = Grid::new(config, trunks);
        let mut log = StatusLog::new();
        let (splices, _) = splice_all(&mut grid, stations, &ProgressHooks::none(), &mut log);
        let (routes, _) = trace_all(
            &mut grid,
            stations,
            &splices,
            config,
            &ProgressHooks::none(),
            &mut log,
        );
        (grid, routes)
    }

    #[test]
    fn single_station_route_attributes_trunk() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let stations = vec![station("Mid Wind", -31.5, 116.5, Technology::Wind)];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        let route = &routes[0];
        assert!(route.reachable);
        assert!((route.grid_len - 55.46).abs() < 0.01);
        // Tail plus foot-to-load-centre along the trunk
        assert!((route.grid_path_len - (55.46 + 47.63)).abs() < 0.05);
        assert_eq!(route.load_centre.as_deref(), Some("LC"));

        let trunk = &grid.segments[0];
        assert_eq!(trunk.peak_load, 100.0);
        assert_eq!(trunk.peak_dispatchable, 0.0);
        let tail = &grid.segments[1];
        assert_eq!(tail.peak_load, 100.0);
    }

    #[test]
    fn dispatchable_station_marks_segments() {
        let mut config = Config::default();
        config.line_loss = 0.001;
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let stations = vec![station("Bio", -31.5, 116.5, Technology::Biomass)];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        assert!(routes[0].reachable);
        let trunk = &grid.segments[0];
        assert_eq!(trunk.peak_dispatchable, 100.0);
        assert!(trunk.dispatchable);
        // capacity x line_loss x segment length
        assert!((trunk.peak_loss - 100.0 * 0.001 * trunk.length_km).abs() < 1e-9);
    }

    #[test]
    fn fossil_station_counts_as_dispatchable() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        // Not in the configured dispatchable list, dispatchable by family
        let stations = vec![station(
            "Gas Peaker",
            -31.5,
            116.5,
            Technology::Fossil("Gas".to_string()),
        )];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        assert!(routes[0].reachable);
        let trunk = &grid.segments[0];
        assert_eq!(trunk.peak_dispatchable, 100.0);
        assert!(trunk.dispatchable);
    }

    #[test]
    fn two_load_centres_truncate_attribution() {
        let mut config = Config::default();
        config.load_centres = vec![
            LoadCentre::new("LC1".to_string(), Coordinate::new(-31.0, 116.0)),
            LoadCentre::new("LC2".to_string(), Coordinate::new(-31.0, 117.5)),
        ];
        let trunks = vec![
            Segment::trunk(
                "A-B".to_string(),
                String::new(),
                vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 116.5)],
                false,
            ),
            Segment::trunk(
                "B-C".to_string(),
                String::new(),
                vec![Coordinate::new(-31.0, 116.5), Coordinate::new(-31.0, 117.0)],
                false,
            ),
            Segment::trunk(
                "C-D".to_string(),
                String::new(),
                vec![Coordinate::new(-31.0, 117.0), Coordinate::new(-31.0, 117.5)],
                false,
            ),
        ];
        // Connects onto B-C close to B; LC1 via B is nearer than LC2 via C
        let stations = vec![station("Near B", -31.3, 116.6, Technology::Wind)];
        let (grid, routes) = run_pipeline(&config, trunks, &stations);

        let route = &routes[0];
        assert_eq!(route.load_centre.as_deref(), Some("LC1"));
        assert_eq!(grid.segments[0].peak_load, 100.0); // A-B
        assert_eq!(grid.segments[1].peak_load, 100.0); // B-C carries the foot edges
        assert_eq!(grid.segments[2].peak_load, 0.0); // C-D untouched
    }

    #[test]
    fn station_on_load_centre_has_empty_path() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let stations = vec![station("AtLC", -31.0, 117.0, Technology::Wind)];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        let route = &routes[0];
        assert!(route.reachable);
        assert_eq!(route.grid_path_len, 0.0);
        assert_eq!(grid.segments[0].peak_load, 0.0);
    }

    #[test]
    fn unreachable_station_is_flagged() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "Island".to_string(),
            Coordinate::new(-20.0, 130.0),
        )];
        // Trunk nowhere near the load centre and not connected to it
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let stations = vec![station("Stranded", -31.5, 116.5, Technology::Wind)];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        let route = &routes[0];
        assert!(!route.reachable);
        assert_eq!(route.grid_path_len, 0.0);
        // Counters untouched
        assert_eq!(grid.segments[0].peak_load, 0.0);
    }

    #[test]
    fn existing_stations_skip_tracing_unless_enabled() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let mut existing = station("Old", -31.5, 116.5, Technology::Wind);
        existing.existing = true;
        let stations = vec![existing];

        let (grid, routes) = run_pipeline(&config, vec![trunk.clone()], &stations);
        assert!(!routes[0].traced);
        assert_eq!(grid.segments[0].peak_load, 0.0);

        config.trace_existing = true;
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);
        assert!(routes[0].traced);
        assert_eq!(grid.segments[0].peak_load, 100.0);
    }

    #[test]
    fn peak_load_bounded_by_summed_capacity() {
        let mut config = Config::default();
        config.load_centres = vec![LoadCentre::new(
            "LC".to_string(),
            Coordinate::new(-31.0, 117.0),
        )];
        let trunk = Segment::trunk(
            "Trunk".to_string(),
            String::new(),
            vec![Coordinate::new(-31.0, 116.0), Coordinate::new(-31.0, 117.0)],
            false,
        );
        let stations = vec![
            station("One", -31.5, 116.5, Technology::Wind),
            station("Two", -31.4, 116.2, Technology::FixedPv),
            station("Three", -31.2, 116.8, Technology::Biomass),
        ];
        let (grid, routes) = run_pipeline(&config, vec![trunk], &stations);

        assert!(routes.iter().all(|r| r.reachable));
        let total_capacity: f64 = stations.iter().map(|s| s.capacity).sum();
        for segment in &grid.segments {
            assert!(segment.peak_load <= total_capacity + 1e-9);
        }
        // All three paths share the trunk
        assert_eq!(grid.segments[0].peak_load, 300.0);
        assert_eq!(grid.segments[0].peak_dispatchable, 100.0);
    }
}
