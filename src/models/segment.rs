use serde::{Deserialize, Serialize};

use crate::core::geodesy::{polyline_length, Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Part of the original network.
    Trunk,
    /// Created by the connector to join a single station to the grid.
    Tail,
}

/// What a tail segment splices into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upstream {
    /// Trunk segments have no upstream.
    None,
    /// Spliced onto an existing segment by index.
    Segment(usize),
    /// Connected straight to a load centre.
    LoadCentre,
    /// Connected to another station when no segment or load centre was in
    /// range.
    Station,
}

/// A transmission line: an ordered polyline of at least two coordinates
/// plus the electrical attributes accumulated during path attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    /// Opaque style tag carried through from the source file.
    pub style: String,
    pub points: Vec<Coordinate>,
    pub length_km: f64,
    pub kind: SegmentKind,
    pub upstream: Upstream,
    pub dispatchable: bool,
    pub peak_load: f64,
    pub peak_dispatchable: f64,
    pub peak_loss: f64,
}

impl Segment {
    pub fn trunk(name: String, style: String, points: Vec<Coordinate>, dispatchable: bool) -> Self {
        let length_km = polyline_length(&points);
        Self {
            name,
            style,
            points,
            length_km,
            kind: SegmentKind::Trunk,
            upstream: Upstream::None,
            dispatchable,
            peak_load: 0.0,
            peak_dispatchable: 0.0,
            peak_loss: 0.0,
        }
    }

    /// A tail is normally two vertices, the station and a point on a trunk;
    /// explicit grid-line waypoints may add interior vertices.
    pub fn tail(name: String, points: Vec<Coordinate>, upstream: Upstream) -> Self {
        let length_km = polyline_length(&points);
        Self {
            name,
            style: String::new(),
            points,
            length_km,
            kind: SegmentKind::Tail,
            upstream,
            dispatchable: false,
            peak_load: 0.0,
            peak_dispatchable: 0.0,
            peak_loss: 0.0,
        }
    }

    pub fn is_tail(&self) -> bool {
        self.kind == SegmentKind::Tail
    }

    /// Vertex pairs of the polyline.
    pub fn arcs(&self) -> impl Iterator<Item = (&Coordinate, &Coordinate)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunk_length_is_cumulative() {
        let seg = Segment::trunk(
            "Northern 132kV".to_string(),
            "#line132".to_string(),
            vec![
                Coordinate::new(-31.0, 116.0),
                Coordinate::new(-31.0, 116.5),
                Coordinate::new(-31.0, 117.0),
            ],
            false,
        );
        // Two half-degree arcs along the -31 parallel
        assert!((seg.length_km - 95.25).abs() < 0.02);
        assert_eq!(seg.arcs().count(), 2);
        assert_eq!(seg.kind, SegmentKind::Trunk);
        assert_eq!(seg.upstream, Upstream::None);
    }

    #[test]
    fn zero_length_tail_is_valid() {
        let p = Coordinate::new(-31.0, 116.0);
        let tail = Segment::tail("Station A".to_string(), vec![p, p], Upstream::Segment(0));
        assert_eq!(tail.length_km, 0.0);
        assert!(tail.is_tail());
    }
}
