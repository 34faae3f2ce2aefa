use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in lot-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

/// Axis-aligned detector box in `x1, y1, x2, y2` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_xyxy(xyxy: [f64; 4]) -> Self {
        Self::new(xyxy[0], xyxy[1], xyxy[2], xyxy[3])
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, other: &Self) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    pub fn iou(&self, other: &Self) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        polygon_from_points(&[
            Point::new(self.x1, self.y1),
            Point::new(self.x2, self.y1),
            Point::new(self.x2, self.y2),
            Point::new(self.x1, self.y2),
        ])
    }
}

/// Builds a closed polygon from an open or closed ring of points. No validation.
pub fn polygon_from_points(points: &[Point]) -> Polygon<f64> {
    let ring: LineString<f64> = points.iter().copied().map(Coord::from).collect();
    Polygon::new(ring, Vec::new())
}

/// Valid under `geo`'s OGC rules and encloses a positive area.
pub fn is_usable(poly: &Polygon<f64>) -> bool {
    poly.is_valid() && poly.unsigned_area() > 0.0
}

pub fn is_finite_polygon(poly: &Polygon<f64>) -> bool {
    poly.exterior()
        .coords()
        .chain(poly.interiors().iter().flat_map(|r| r.coords()))
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RepairFailure {
    #[error("fewer than 3 points")]
    TooFewPoints,
    #[error("non-finite coordinate")]
    NonFinite,
    #[error("repair produced no polygon")]
    Empty,
}

/// Outcome of turning a raw point ring into a simple polygon.
#[derive(Debug, Clone, PartialEq)]
pub enum PolygonRepair {
    /// The ring was already valid; returned untouched.
    Valid(Polygon<f64>),
    /// The ring self-intersected and was resolved into `parts` simple pieces;
    /// `polygon` is the largest of them.
    Repaired { polygon: Polygon<f64>, parts: usize },
    Invalid(RepairFailure),
}

impl PolygonRepair {
    pub fn into_result(self) -> Result<Polygon<f64>, RepairFailure> {
        match self {
            PolygonRepair::Valid(polygon) | PolygonRepair::Repaired { polygon, .. } => Ok(polygon),
            PolygonRepair::Invalid(reason) => Err(reason),
        }
    }
}

pub fn repair_polygon(points: &[Point]) -> PolygonRepair {
    if points.len() < 3 {
        return PolygonRepair::Invalid(RepairFailure::TooFewPoints);
    }
    if !points.iter().all(Point::is_finite) {
        return PolygonRepair::Invalid(RepairFailure::NonFinite);
    }

    let poly = polygon_from_points(points);
    if is_usable(&poly) {
        return PolygonRepair::Valid(poly);
    }

    // Self-union resolves crossings into disjoint simple regions.
    let resolved = poly.union(&MultiPolygon::<f64>::new(Vec::new()));
    let parts: Vec<Polygon<f64>> = resolved
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .collect();
    let count = parts.len();

    match largest_part(parts) {
        Some(polygon) if is_usable(&polygon) => PolygonRepair::Repaired {
            polygon,
            parts: count,
        },
        _ => PolygonRepair::Invalid(RepairFailure::Empty),
    }
}

fn largest_part(parts: Vec<Polygon<f64>>) -> Option<Polygon<f64>> {
    parts
        .into_iter()
        .map(|p| (p.unsigned_area(), p))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, p)| p)
}
