//! Geometry primitives for solid reconstruction
//!
//! Solids in a VMF file are stored as unordered sets of bounding planes;
//! the polygons are never written. This module provides the pieces needed
//! to rebuild them: planes from point triples, half-space clipping of
//! polygons, normal equivalence within tolerance, and axis-aligned
//! bounding boxes.
//!
//! All comparisons are tolerance-based. Map coordinates are hammer units
//! in the thousands, so an absolute epsilon is appropriate.

use crate::error::{Error, Result};
use nalgebra::Vector3;

/// A point or direction in map space
pub type Point = Vector3<f64>;

/// Absolute tolerance for coordinate and normal comparisons
pub const EPSILON: f64 = 0.0001;

/// Radius of the seed polygon used when intersecting planes
///
/// Any solid larger than this in hammer units cannot be reconstructed, but
/// the Source engine caps maps well below it.
const SEED_RADIUS: f64 = 1_000_000.0;

/// An infinite plane in normal/distance form: `normal . x = distance`
///
/// The normal points out of the solid the plane bounds. Once a face exists
/// its plane is derived data and never independently mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit outward normal
    pub normal: Vector3<f64>,
    /// Distance from the origin along the normal
    pub distance: f64,
}

impl Plane {
    /// Construct a plane from three ordered points
    ///
    /// The winding follows the VMF convention: the normal is
    /// `(p3 - p1) x (p2 - p1)`, pointing towards the viewer when the points
    /// read counter-clockwise. Collinear points are a geometry error.
    pub fn from_points(p1: Point, p2: Point, p3: Point) -> Result<Self> {
        let ab = p2 - p1;
        let ac = p3 - p1;
        let cross = ac.cross(&ab);
        let len = cross.norm();
        if len < EPSILON {
            return Err(Error::Geometry(
                "collinear points do not define a plane".to_string(),
            ));
        }
        let normal = cross / len;
        Ok(Self {
            normal,
            distance: normal.dot(&p1),
        })
    }

    /// Signed distance from the plane; positive is on the normal side
    pub fn signed_distance(&self, point: &Point) -> f64 {
        self.normal.dot(point) - self.distance
    }

    /// Whether a point lies on the plane within tolerance
    pub fn contains(&self, point: &Point) -> bool {
        self.signed_distance(point).abs() <= EPSILON
    }

    /// Whether two planes have equivalent normals (parallel, same
    /// orientation, within tolerance)
    pub fn normal_equivalent(&self, other: &Plane) -> bool {
        (self.normal - other.normal).amax() <= EPSILON
    }

    /// A point on the plane closest to the origin
    pub fn point_on_plane(&self) -> Point {
        self.normal * self.distance
    }

    /// The coordinate axis closest to this plane's normal
    ///
    /// Ties resolve in X, Y, Z order, matching the axis preference Hammer
    /// uses for world-aligned textures.
    pub fn closest_axis(&self) -> Vector3<f64> {
        let a = self.normal.map(f64::abs);
        if a.x >= a.y && a.x >= a.z {
            Vector3::x()
        } else if a.y >= a.z {
            Vector3::y()
        } else {
            Vector3::z()
        }
    }
}

/// Whether two points are equivalent within tolerance
pub fn points_equivalent(a: &Point, b: &Point) -> bool {
    (a - b).amax() <= EPSILON
}

/// Build a large counter-clockwise quad lying on a plane
///
/// The quad is wound counter-clockwise with respect to the plane normal,
/// the winding every face polygon must carry. Clipping preserves winding,
/// so this seeds the plane-intersection solver.
pub fn seed_polygon(plane: &Plane) -> Vec<Point> {
    // Pick a reference direction not parallel to the normal
    let reference = if plane.closest_axis() == Vector3::z() {
        -Vector3::y()
    } else {
        -Vector3::z()
    };
    let u = reference.cross(&plane.normal).normalize();
    let v = plane.normal.cross(&u);
    let center = plane.point_on_plane();
    let r = SEED_RADIUS;
    vec![
        center - u * r - v * r,
        center + u * r - v * r,
        center + u * r + v * r,
        center - u * r + v * r,
    ]
}

/// Clip a polygon against a plane, keeping the half-space behind it
///
/// "Behind" is the side the normal points away from, i.e. the interior of
/// a solid whose planes have outward normals. Vertices on the plane within
/// tolerance are kept. Returns an empty polygon when nothing survives.
pub fn clip_polygon(vertices: &[Point], plane: &Plane) -> Vec<Point> {
    let mut result = Vec::with_capacity(vertices.len() + 1);
    let n = vertices.len();
    for i in 0..n {
        let current = vertices[i];
        let next = vertices[(i + 1) % n];
        let d_current = plane.signed_distance(&current);
        let d_next = plane.signed_distance(&next);

        if d_current <= EPSILON {
            result.push(current);
        }
        // Edge crosses the plane: emit the intersection point
        if (d_current > EPSILON && d_next < -EPSILON)
            || (d_current < -EPSILON && d_next > EPSILON)
        {
            let t = d_current / (d_current - d_next);
            result.push(current + (next - current) * t);
        }
    }
    dedup_vertices(result)
}

/// Drop consecutive near-coincident vertices introduced by clipping
fn dedup_vertices(vertices: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(vertices.len());
    for v in vertices {
        if out.last().is_none_or(|last| !points_equivalent(last, &v)) {
            out.push(v);
        }
    }
    if out.len() > 1 && points_equivalent(&out[0], out.last().unwrap()) {
        out.pop();
    }
    out
}

/// Whether a polygon is degenerate (fewer than three distinct vertices or
/// effectively zero area)
pub fn polygon_is_degenerate(vertices: &[Point]) -> bool {
    if vertices.len() < 3 {
        return true;
    }
    let mut area2 = Vector3::zeros();
    for i in 1..vertices.len() - 1 {
        let a = vertices[i] - vertices[0];
        let b = vertices[i + 1] - vertices[0];
        area2 += a.cross(&b);
    }
    area2.norm() < EPSILON
}

/// Recover a polygon's plane from its vertex winding
///
/// Uses the first vertex triple spanning a non-degenerate triangle. Returns
/// a geometry error when the polygon is degenerate.
pub fn polygon_plane(vertices: &[Point]) -> Result<Plane> {
    for i in 1..vertices.len().saturating_sub(1) {
        if let Ok(plane) = Plane::from_points(vertices[0], vertices[i + 1], vertices[i]) {
            return Ok(plane);
        }
    }
    Err(Error::Geometry(
        "degenerate polygon has no plane".to_string(),
    ))
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Point,
    /// Maximum corner
    pub max: Point,
}

impl BoundingBox {
    /// The smallest box containing all the given points, or `None` when
    /// the iterator is empty
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.expand(&p);
        }
        Some(bbox)
    }

    /// Grow the box to contain a point
    pub fn expand(&mut self, point: &Point) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// The smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// The center of the box
    pub fn center(&self) -> Point {
        (self.min + self.max) / 2.0
    }
}

/// Union of two optional bounding boxes
pub fn union_opt(a: Option<BoundingBox>, b: Option<BoundingBox>) -> Option<BoundingBox> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
