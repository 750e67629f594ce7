use serde::{Deserialize, Serialize};

use crate::config::constants::{round2, round6, EARTH_RADIUS_KM};

/// A WGS-84 latitude/longitude pair in decimal degrees. Coordinates are
/// stored to 6 decimal places; latitude is clamped to [-90, 90] and
/// longitude to [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        let lat = round6(lat.clamp(-90.0, 90.0));
        let lon = round6(lon.clamp(-180.0, 180.0));
        Self { lat, lon }
    }

    /// Canonical string form used to key routing-graph vertices. Two
    /// coordinates that round to the same 6 decimal places share a vertex.
    pub fn key(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(self, other)
    }
}

/// Which point-to-segment formula to use. `Planar` is the operator-selected
/// `dummy_fix` fallback; `Spherical` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMetric {
    Spherical,
    Planar,
}

/// Great-circle distance in km via the haversine formula.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `a` to `b` in radians, in (-pi, pi].
pub fn bearing(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x)
}

/// Point reached by travelling `km` from `a` along an initial great-circle
/// bearing (radians).
pub fn destination(a: &Coordinate, bearing_rad: f64, km: f64) -> Coordinate {
    let lat1 = a.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let ang = km / EARTH_RADIUS_KM;

    let lat2 = (lat1.sin() * ang.cos() + lat1.cos() * ang.sin() * bearing_rad.cos()).asin();
    let lon2 = lon1
        + (bearing_rad.sin() * ang.sin() * lat1.cos()).atan2(ang.cos() - lat1.sin() * lat2.sin());

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Minimum distance in km from `p` to the great-circle arc from `a` to `b`,
/// together with the closest point on the arc. When the cross-track foot
/// falls outside the arc the nearer endpoint is returned instead.
pub fn point_to_segment(
    p: &Coordinate,
    a: &Coordinate,
    b: &Coordinate,
    metric: SegmentMetric,
) -> (f64, Coordinate) {
    match metric {
        SegmentMetric::Spherical => point_to_segment_spherical(p, a, b),
        SegmentMetric::Planar => point_to_segment_planar(p, a, b),
    }
}

fn point_to_segment_spherical(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> (f64, Coordinate) {
    let d12 = distance(a, b);
    if d12 == 0.0 {
        return (distance(a, p), *a);
    }

    let d13 = distance(a, p) / EARTH_RADIUS_KM;
    let t13 = bearing(a, p);
    let t12 = bearing(a, b);

    // Foot behind the start of the arc
    let relative = t13 - t12;
    if relative.cos() < 0.0 {
        return (distance(a, p), *a);
    }

    let cross_track = (d13.sin() * relative.sin()).asin();
    // Rounding can push the ratio a hair past 1 when p sits on the arc
    let along_track = (d13.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos() * EARTH_RADIUS_KM;

    // Foot beyond the end of the arc
    if along_track > d12 {
        return (distance(b, p), *b);
    }

    let foot = destination(a, t12, along_track);
    (distance(p, &foot), foot)
}

/// Planar fallback: project to radians and use Euclidean projection onto
/// the chord, then measure the result with the haversine so callers always
/// see km.
fn point_to_segment_planar(p: &Coordinate, a: &Coordinate, b: &Coordinate) -> (f64, Coordinate) {
    let (px, py) = (p.lon.to_radians(), p.lat.to_radians());
    let (ax, ay) = (a.lon.to_radians(), a.lat.to_radians());
    let (bx, by) = (b.lon.to_radians(), b.lat.to_radians());

    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };

    let foot = Coordinate::new(
        (ay + t * dy).to_degrees(),
        (ax + t * dx).to_degrees(),
    );
    (distance(p, &foot), foot)
}

/// Ray-cast point-in-polygon test against the map bounding ring. An empty
/// ring is treated as unbounded.
pub fn within_polygon(p: &Coordinate, ring: &[Coordinate]) -> bool {
    if ring.is_empty() {
        return true;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (vi, vj) = (&ring[i], &ring[j]);
        if (vi.lat > p.lat) != (vj.lat > p.lat) {
            let crossing = (vj.lon - vi.lon) * (p.lat - vi.lat) / (vj.lat - vi.lat) + vi.lon;
            if p.lon < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Cumulative great-circle length of a polyline, rounded to 2 decimal
/// places as persisted segment lengths are.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    let total: f64 = points.windows(2).map(|w| distance(&w[0], &w[1])).sum();
    round2(total)
}
