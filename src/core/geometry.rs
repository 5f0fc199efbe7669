use geo::{
    coord, Area, BooleanOps, Centroid, Coord, EuclideanDistance, Geometry, GeometryCollection,
    LineString, MultiPolygon, Point, Polygon,
};
use serde_json::Value;
use thiserror::Error;

use crate::models::{GeoShape, LocationSpec};

/// UTM zone of the planar projection (EPSG:32633, meters).
const UTM_ZONE: u8 = 33;

/// Vertices per full circle when approximating buffer arcs.
const ARC_SEGMENTS: usize = 32;

/// Errors raised while resolving a location payload into geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Neither the path nor the transport lines resolve to a supported,
    /// non-degenerate shape.
    #[error("location resolves to no supported geometry")]
    UnknownGeometryKind,
}

/// An item geometry in a planar, distance-true frame.
///
/// Produced by [`normalize`] and friends; all coordinates have already been
/// reprojected from WGS84 lon/lat to UTM, so linear distances and areas are
/// in meters.
#[derive(Debug, Clone, Default)]
pub struct NormalizedGeometry {
    points: Vec<Point<f64>>,
    lines: Vec<LineString<f64>>,
}

impl NormalizedGeometry {
    fn is_empty(&self) -> bool {
        self.points.is_empty() && self.lines.is_empty()
    }

    fn merge(mut self, other: NormalizedGeometry) -> NormalizedGeometry {
        self.points.extend(other.points);
        self.lines.extend(other.lines);
        self
    }

    /// Reproject every coordinate from lon/lat into the UTM frame.
    fn project(self) -> NormalizedGeometry {
        NormalizedGeometry {
            points: self
                .points
                .into_iter()
                .map(|p| Point::from(project_coord(p.0)))
                .collect(),
            lines: self
                .lines
                .into_iter()
                .map(|l| LineString::from(l.0.into_iter().map(project_coord).collect::<Vec<_>>()))
                .collect(),
        }
    }

    /// Shortest distance between the two geometries, 0 when they touch or
    /// intersect.
    pub fn min_distance(&self, other: &NormalizedGeometry) -> f64 {
        let mut best = f64::INFINITY;
        for p in &self.points {
            for q in &other.points {
                best = best.min(p.euclidean_distance(q));
            }
            for l in &other.lines {
                best = best.min(p.euclidean_distance(l));
            }
        }
        for l in &self.lines {
            for q in &other.points {
                best = best.min(q.euclidean_distance(l));
            }
            for m in &other.lines {
                best = best.min(l.euclidean_distance(m));
            }
        }
        if best.is_finite() {
            best
        } else {
            0.0
        }
    }

    /// Geometric centroid of all parts.
    pub fn centroid(&self) -> Option<Point<f64>> {
        let mut geoms: Vec<Geometry<f64>> = Vec::with_capacity(self.points.len() + self.lines.len());
        geoms.extend(self.points.iter().map(|p| Geometry::Point(*p)));
        geoms.extend(self.lines.iter().map(|l| Geometry::LineString(l.clone())));
        GeometryCollection(geoms).centroid()
    }

    /// Expand the geometry into the polygon of everything within `radius`
    /// meters: circles around points, capsules along line segments, all
    /// unioned together.
    pub fn buffer(&self, radius: f64) -> MultiPolygon<f64> {
        let mut parts: Vec<Polygon<f64>> = Vec::new();
        for p in &self.points {
            parts.push(circle(p.0, radius));
        }
        for line in &self.lines {
            if line.0.len() < 2 {
                if let Some(c) = line.0.first() {
                    parts.push(circle(*c, radius));
                }
                continue;
            }
            for segment in line.0.windows(2) {
                parts.push(capsule(segment[0], segment[1], radius));
            }
        }
        union_all(parts)
    }
}

/// Distance between the centroids of two geometries.
pub fn centroid_distance(a: &NormalizedGeometry, b: &NormalizedGeometry) -> f64 {
    match (a.centroid(), b.centroid()) {
        (Some(ca), Some(cb)) => ca.euclidean_distance(&cb),
        _ => 0.0,
    }
}

/// Jaccard-style overlap of the two buffered geometries:
/// `overlap / (areaA + areaB - overlap)`, bounded in [0, 1].
pub fn buffered_overlap_ratio(
    a: &NormalizedGeometry,
    b: &NormalizedGeometry,
    radius: f64,
) -> f64 {
    let buffer_a = a.buffer(radius);
    let buffer_b = b.buffer(radius);

    let overlap = buffer_a.intersection(&buffer_b).unsigned_area();
    let union = buffer_a.unsigned_area() + buffer_b.unsigned_area() - overlap;
    if union <= 0.0 {
        return 0.0;
    }
    (overlap / union).clamp(0.0, 1.0)
}

/// Resolve a location payload into one unified, projected geometry.
///
/// When both the path and the transport lines are present the result is
/// their union; when only one resolves, that one is returned. Fails when
/// nothing resolves to a supported shape.
pub fn normalize(location: &LocationSpec) -> Result<NormalizedGeometry, GeometryError> {
    let path = location.path.as_ref().and_then(resolve_path);
    let lines = location
        .public_transport_lines
        .as_deref()
        .and_then(resolve_transport_lines);

    let merged = match (path, lines) {
        (Some(p), Some(l)) => p.merge(l),
        (Some(p), None) => p,
        (None, Some(l)) => l,
        (None, None) => return Err(GeometryError::UnknownGeometryKind),
    };
    if merged.is_empty() {
        return Err(GeometryError::UnknownGeometryKind);
    }
    Ok(merged.project())
}

/// The projected path sub-geometry alone; `None` when the item has no
/// resolvable path. Absence of a sub-view is not an error.
pub fn normalize_path(location: &LocationSpec) -> Option<NormalizedGeometry> {
    location
        .path
        .as_ref()
        .and_then(resolve_path)
        .map(NormalizedGeometry::project)
}

/// The projected transport-lines sub-geometry alone.
pub fn normalize_transport_lines(location: &LocationSpec) -> Option<NormalizedGeometry> {
    location
        .public_transport_lines
        .as_deref()
        .and_then(resolve_transport_lines)
        .map(NormalizedGeometry::project)
}

/// Supported path kinds are `Point` and `MultiLineString`; anything else
/// resolves to nothing, which only becomes an error if no other part of the
/// location resolves either.
fn resolve_path(shape: &GeoShape) -> Option<NormalizedGeometry> {
    match shape.kind.as_str() {
        "Point" => {
            let position = parse_position(&shape.coordinates)?;
            Some(NormalizedGeometry {
                points: vec![Point::from(position)],
                lines: Vec::new(),
            })
        }
        "MultiLineString" => {
            let lines: Vec<LineString<f64>> = shape
                .coordinates
                .as_array()?
                .iter()
                .filter_map(parse_line)
                .collect();
            if lines.is_empty() {
                return None;
            }
            Some(NormalizedGeometry {
                points: Vec::new(),
                lines,
            })
        }
        _ => None,
    }
}

/// Transport lines carry their coordinate sequences directly; malformed
/// entries are dropped.
fn resolve_transport_lines(shapes: &[GeoShape]) -> Option<NormalizedGeometry> {
    let lines: Vec<LineString<f64>> = shapes
        .iter()
        .filter_map(|shape| parse_line(&shape.coordinates))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(NormalizedGeometry {
        points: Vec::new(),
        lines,
    })
}

fn parse_position(value: &Value) -> Option<Coord<f64>> {
    let parts = value.as_array()?;
    let x = parts.first()?.as_f64()?;
    let y = parts.get(1)?.as_f64()?;
    Some(coord! { x: x, y: y })
}

fn parse_line(value: &Value) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = value
        .as_array()?
        .iter()
        .map(parse_position)
        .collect::<Option<Vec<_>>>()?;
    if coords.len() < 2 {
        return None;
    }
    Some(LineString::from(coords))
}

fn project_coord(c: Coord<f64>) -> Coord<f64> {
    let (northing, easting, _convergence) = utm::to_utm_wgs84(c.y, c.x, UTM_ZONE);
    coord! { x: easting, y: northing }
}

fn circle(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = (0..=ARC_SEGMENTS)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / ARC_SEGMENTS as f64;
            coord! {
                x: center.x + radius * theta.cos(),
                y: center.y + radius * theta.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Buffer of one line segment: a rectangle with semicircular caps, walked
/// counter-clockwise as a single ring.
fn capsule(a: Coord<f64>, b: Coord<f64>, radius: f64) -> Polygon<f64> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx.hypot(dy) < f64::EPSILON {
        return circle(a, radius);
    }

    let heading = dy.atan2(dx);
    let half = ARC_SEGMENTS / 2;
    let mut ring: Vec<Coord<f64>> = Vec::with_capacity(ARC_SEGMENTS + 2);
    for i in 0..=half {
        let theta = heading - std::f64::consts::FRAC_PI_2
            + std::f64::consts::PI * i as f64 / half as f64;
        ring.push(coord! {
            x: b.x + radius * theta.cos(),
            y: b.y + radius * theta.sin(),
        });
    }
    for i in 0..=half {
        let theta = heading + std::f64::consts::FRAC_PI_2
            + std::f64::consts::PI * i as f64 / half as f64;
        ring.push(coord! {
            x: a.x + radius * theta.cos(),
            y: a.y + radius * theta.sin(),
        });
    }
    Polygon::new(LineString::from(ring), vec![])
}

fn union_all(parts: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut merged = MultiPolygon::new(Vec::new());
    for (i, part) in parts.into_iter().enumerate() {
        let part = MultiPolygon::new(vec![part]);
        merged = if i == 0 { part } else { merged.union(&part) };
    }
    merged
}
