//! Geometry derivation and footprint assembly.
//!
//! Turns decoded coordinate pairs into `geo` geometries and assembles the
//! network footprint:
//!
//! 1. Each reach contributes a ribbon polygon traced around its cross
//!    sections (first cut line, left ends, last cut line, right ends)
//! 2. Each junction contributes the convex hull of the terminal cut lines of
//!    the reaches it connects
//! 3. Every polygon is repaired, then everything is unioned

mod crs;

use geo::{Area, BooleanOps, ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};

pub use crs::{LengthUnit, LinearUnit, ReferenceSystem};

/// Denominator below which two offset segments are treated as parallel
const PARALLEL_EPSILON: f64 = 1e-12;

/// Build a line from decoded coordinate pairs; empty if there are none
pub fn line_from_pairs(pairs: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(pairs.to_vec())
}

/// Planar length of a line in its own units
pub fn planar_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|segment| segment.dx().hypot(segment.dy())).sum()
}

/// Offset a line sideways by `distance`.
///
/// Positive distances move to the left of the line direction, negative to
/// the right. Interior vertices use mitred joins; parallel consecutive
/// segments share their offset vertex.
pub fn offset_curve(line: &LineString<f64>, distance: f64) -> LineString<f64> {
    let coords: Vec<Coord<f64>> = {
        let mut coords: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
        for coord in line.coords() {
            if coords.last() != Some(coord) {
                coords.push(*coord);
            }
        }
        coords
    };

    if coords.len() < 2 || distance == 0.0 {
        return LineString::new(coords);
    }

    let shifted: Vec<(Coord<f64>, Coord<f64>)> = coords
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let length = dx.hypot(dy);
            let normal = Coord {
                x: -dy / length * distance,
                y: dx / length * distance,
            };
            (a + normal, b + normal)
        })
        .collect();

    let mut out = Vec::with_capacity(coords.len());
    out.push(shifted[0].0);
    for pair in shifted.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        out.push(line_intersection(first, second).unwrap_or(first.1));
    }
    if let Some(last) = shifted.last() {
        out.push(last.1);
    }

    LineString::new(out)
}

/// Intersection of two infinite lines given by point pairs
fn line_intersection(
    (p1, p2): (Coord<f64>, Coord<f64>),
    (p3, p4): (Coord<f64>, Coord<f64>),
) -> Option<Coord<f64>> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let denominator = d1.x * d2.y - d1.y * d2.x;
    if denominator.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = ((p3.x - p1.x) * d2.y - (p3.y - p1.y) * d2.x) / denominator;
    Some(p1 + d1 * t)
}

/// Ribbon polygon around consecutive cross-section cut lines, ordered
/// upstream to downstream.
///
/// Lines with fewer than two points are skipped. Returns `None` when fewer
/// than two lines remain.
pub fn cross_section_ribbon<'a>(
    lines: impl IntoIterator<Item = &'a LineString<f64>>,
) -> Option<Polygon<f64>> {
    let lines: Vec<&LineString<f64>> = lines.into_iter().filter(|l| l.0.len() >= 2).collect();
    let (first, last) = match lines.as_slice() {
        [first, .., last] => (*first, *last),
        _ => return None,
    };

    let mut ring: Vec<Coord<f64>> = first.0.iter().rev().copied().collect();
    ring.extend(lines.iter().filter_map(|l| l.0.first().copied()));
    ring.extend(last.0.iter().copied());
    ring.extend(lines.iter().rev().filter_map(|l| l.0.last().copied()));

    Some(Polygon::new(LineString::new(ring), vec![]))
}

/// Convex hull around the points of several lines; `None` for fewer than
/// three points
pub fn hull_of_lines<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Option<Polygon<f64>> {
    let points: Vec<Point<f64>> = lines
        .into_iter()
        .flat_map(|line| line.points())
        .collect();
    if points.len() < 3 {
        return None;
    }
    Some(MultiPoint::new(points).convex_hull())
}

/// Repair a polygon so it can take part in boolean operations.
///
/// Self-intersecting rings are resolved into their valid parts; zero-area
/// results come back empty.
pub fn make_valid(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    if polygon.exterior().0.len() < 4 {
        return MultiPolygon::new(vec![]);
    }
    let repaired =
        MultiPolygon::new(vec![polygon.clone()]).union(&MultiPolygon::new(Vec::<Polygon<f64>>::new()));
    MultiPolygon::new(
        repaired
            .into_iter()
            .filter(|part| part.unsigned_area() > 0.0)
            .collect(),
    )
}

/// Union any number of polygons after repairing each one
pub fn union_all<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> MultiPolygon<f64> {
    polygons
        .into_iter()
        .map(make_valid)
        .filter(|valid| !valid.0.is_empty())
        .fold(MultiPolygon::new(vec![]), |acc, valid| {
            if acc.0.is_empty() {
                valid
            } else {
                acc.union(&valid)
            }
        })
}
