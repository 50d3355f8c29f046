// src/geometry/shape.rs

use geo::line_measures::Distance;
use geo::{BoundingRect, Euclidean, Intersects, Length};
use geo_types::{Coord, Geometry, LineString, Point, Polygon, Rect};

/// Planar shape operations used by the resolver and the proximity graph.
pub trait Shape {
    /// Axis-aligned envelope, `None` for an empty shape.
    fn bounds(&self) -> Option<Rect<f64>>;

    /// Center of the envelope.
    fn envelope_center(&self) -> Option<Point<f64>>;

    /// Planar length in CRS units. Polygons contribute their ring
    /// perimeters, points contribute nothing.
    fn planar_length(&self) -> f64;

    fn intersects_shape(&self, other: &Geometry<f64>) -> bool;

    fn distance_to(&self, other: &Geometry<f64>) -> f64;

    /// Outward expansion by `distance` (round joins and caps).
    fn buffer(&self, distance: f64) -> Buffered<'_>;
}

/// A shape expanded by a fixed distance.
///
/// The buffer is kept implicit: a point lies inside it exactly when its
/// distance to the base shape is at most `distance`, so intersection with
/// another shape reduces to a distance test.
#[derive(Debug, Clone, Copy)]
pub struct Buffered<'a> {
    base: &'a Geometry<f64>,
    distance: f64,
}

impl<'a> Buffered<'a> {
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let rect = self.base.bounds()?;
        let d = self.distance;
        Some(Rect::new(
            Coord { x: rect.min().x - d, y: rect.min().y - d },
            Coord { x: rect.max().x + d, y: rect.max().y + d },
        ))
    }

    pub fn intersects(&self, other: &Geometry<f64>) -> bool {
        if self.base.intersects_shape(other) {
            return true;
        }
        self.distance > 0.0 && self.base.distance_to(other) <= self.distance
    }
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.length::<Euclidean>()
}

fn polygon_perimeter(polygon: &Polygon<f64>) -> f64 {
    ring_length(polygon.exterior()) + polygon.interiors().iter().map(ring_length).sum::<f64>()
}

impl Shape for Geometry<f64> {
    fn bounds(&self) -> Option<Rect<f64>> {
        self.bounding_rect()
    }

    fn envelope_center(&self) -> Option<Point<f64>> {
        self.bounds().map(|r| Point::from(r.center()))
    }

    fn planar_length(&self) -> f64 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
            Geometry::Line(line) => line.length::<Euclidean>(),
            Geometry::LineString(ls) => ls.length::<Euclidean>(),
            Geometry::MultiLineString(mls) => mls.length::<Euclidean>(),
            Geometry::Polygon(polygon) => polygon_perimeter(polygon),
            Geometry::MultiPolygon(mp) => mp.iter().map(polygon_perimeter).sum(),
            Geometry::Rect(rect) => polygon_perimeter(&rect.to_polygon()),
            Geometry::Triangle(tri) => polygon_perimeter(&tri.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.iter().map(|g| g.planar_length()).sum(),
        }
    }

    fn intersects_shape(&self, other: &Geometry<f64>) -> bool {
        self.intersects(other)
    }

    fn distance_to(&self, other: &Geometry<f64>) -> f64 {
        Euclidean::distance(self, other)
    }

    fn buffer(&self, distance: f64) -> Buffered<'_> {
        Buffered { base: self, distance: distance.max(0.0) }
    }
}
