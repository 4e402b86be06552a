//! Displacement surface types
//!
//! A displacement refines one quadrilateral face into a dense grid of
//! control points, each offset from the flat quad by a normal and distance.
//! The grid is square with side `2^power + 1` for power 2, 3 or 4.

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Plane, Point, points_equivalent};
use nalgebra::Vector3;

/// Smallest supported displacement power (5x5 grid)
pub const MIN_POWER: u32 = 2;
/// Largest supported displacement power (17x17 grid)
pub const MAX_POWER: u32 = 4;

/// One control point of a displacement grid
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementPoint {
    /// Direction of the primary displacement
    pub normal: Vector3<f64>,
    /// Length of the primary displacement
    pub distance: f64,
    /// Direction of the per-point offset
    pub offset_normal: Vector3<f64>,
    /// Length of the per-point offset
    pub offset_distance: f64,
    /// Blend alpha for two-texture displacement surfaces (0-255)
    pub alpha: f64,
    /// World-space position, valid after [`Displacement::calculate_points`]
    pub location: Point,
}

impl DisplacementPoint {
    /// The primary displacement vector
    pub fn displacement(&self) -> Vector3<f64> {
        self.normal * self.distance
    }

    /// The offset displacement vector
    pub fn offset_displacement(&self) -> Vector3<f64> {
        self.offset_normal * self.offset_distance
    }
}

impl Default for DisplacementPoint {
    fn default() -> Self {
        Self {
            normal: Vector3::zeros(),
            distance: 0.0,
            offset_normal: Vector3::zeros(),
            offset_distance: 0.0,
            alpha: 0.0,
            location: Point::zeros(),
        }
    }
}

/// A height-mapped refinement of one quadrilateral face
#[derive(Debug, Clone, PartialEq)]
pub struct Displacement {
    power: u32,
    /// The polygon corner the grid origin corresponds to
    pub start_position: Point,
    /// Uniform elevation along the face normal
    pub elevation: f64,
    /// Whether the surface was built with the subdivision tool
    pub sub_div: bool,
    points: Vec<DisplacementPoint>,
}

impl Displacement {
    /// Create a flat displacement of the given power (clamped to 2..=4)
    pub fn new(power: u32) -> Self {
        let power = power.clamp(MIN_POWER, MAX_POWER);
        let size = (1usize << power) + 1;
        Self {
            power,
            start_position: Point::zeros(),
            elevation: 0.0,
            sub_div: false,
            points: vec![DisplacementPoint::default(); size * size],
        }
    }

    /// The power level (2, 3 or 4)
    pub fn power(&self) -> u32 {
        self.power
    }

    /// Resize the grid for a new power, discarding existing points
    pub fn set_power(&mut self, power: u32) {
        let power = power.clamp(MIN_POWER, MAX_POWER);
        let size = (1usize << power) + 1;
        self.power = power;
        self.points = vec![DisplacementPoint::default(); size * size];
    }

    /// Number of grid cells along one edge (`2^power`)
    pub fn resolution(&self) -> usize {
        1 << self.power
    }

    /// Number of control points along one edge (`2^power + 1`, always odd)
    pub fn size(&self) -> usize {
        self.resolution() + 1
    }

    /// All control points in row-major order
    pub fn points(&self) -> &[DisplacementPoint] {
        &self.points
    }

    /// The control point at (row, column)
    pub fn point(&self, row: usize, col: usize) -> &DisplacementPoint {
        &self.points[row * self.size() + col]
    }

    /// Mutable access to the control point at (row, column)
    pub fn point_mut(&mut self, row: usize, col: usize) -> &mut DisplacementPoint {
        let size = self.size();
        &mut self.points[row * size + col]
    }

    /// Project the flat quad onto the grid's world-space positions
    ///
    /// Requires the owning face's plane and its four polygon corners; the
    /// corner nearest `start_position` becomes grid cell (0, 0). Runs after
    /// the face's plane and vertices are assigned; until then the point
    /// locations are unusable.
    pub fn calculate_points(&mut self, plane: &Plane, vertices: &[Point]) -> Result<()> {
        if vertices.len() != 4 {
            return Err(Error::Geometry(format!(
                "displacement face must be a quadrilateral, found {} vertices",
                vertices.len()
            )));
        }
        // Rotate the corners so the start position leads
        let start = vertices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (*a - self.start_position).norm();
                let db = (*b - self.start_position).norm();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        let corner = |i: usize| vertices[(start + i) % 4];
        let (c0, c1, c2, c3) = (corner(0), corner(1), corner(2), corner(3));

        let res = self.resolution() as f64;
        let size = self.size();
        for row in 0..size {
            let t = row as f64 / res;
            // Interpolate along the two edges leaving the start corner,
            // then across between them
            let edge_a = c0 + (c3 - c0) * t;
            let edge_b = c1 + (c2 - c1) * t;
            for col in 0..size {
                let s = col as f64 / res;
                let flat = edge_a + (edge_b - edge_a) * s;
                let point = self.point_mut(row, col);
                point.location = flat + point.displacement() + point.offset_displacement();
            }
        }
        // Elevation lifts every point uniformly along the face normal
        if self.elevation != 0.0 {
            let lift = plane.normal * self.elevation;
            for point in &mut self.points {
                point.location += lift;
            }
        }
        Ok(())
    }

    /// Whether the start position coincides with one of the given corners
    pub fn start_position_matches(&self, vertices: &[Point]) -> bool {
        vertices
            .iter()
            .any(|v| points_equivalent(v, &self.start_position))
    }

    /// The bounding box over the projected point locations
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter().map(|p| p.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size_per_power() {
        for (power, size) in [(2u32, 5usize), (3, 9), (4, 17)] {
            let disp = Displacement::new(power);
            assert_eq!(disp.size(), size);
            assert_eq!(disp.points().len(), size * size);
        }
    }

    #[test]
    fn test_power_clamped() {
        assert_eq!(Displacement::new(0).power(), 2);
        assert_eq!(Displacement::new(9).power(), 4);
    }

    #[test]
    fn test_calculate_points_flat_quad() {
        let mut disp = Displacement::new(2);
        disp.start_position = Point::new(0.0, 0.0, 0.0);
        let plane = Plane {
            normal: Vector3::z(),
            distance: 0.0,
        };
        let quad = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(64.0, 0.0, 0.0),
            Point::new(64.0, 64.0, 0.0),
            Point::new(0.0, 64.0, 0.0),
        ];
        disp.calculate_points(&plane, &quad).unwrap();
        // Grid origin sits at the start corner
        assert!(points_equivalent(&disp.point(0, 0).location, &quad[0]));
        // A flat displacement stays on the plane
        for p in disp.points() {
            assert!(p.location.z.abs() < 1e-9);
        }
    }

    #[test]
    fn test_calculate_points_applies_distance_and_elevation() {
        let mut disp = Displacement::new(2);
        disp.elevation = 8.0;
        disp.start_position = Point::new(0.0, 0.0, 0.0);
        for row in 0..disp.size() {
            for col in 0..disp.size() {
                let p = disp.point_mut(row, col);
                p.normal = Vector3::z();
                p.distance = 4.0;
            }
        }
        let plane = Plane {
            normal: Vector3::z(),
            distance: 0.0,
        };
        let quad = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(64.0, 0.0, 0.0),
            Point::new(64.0, 64.0, 0.0),
            Point::new(0.0, 64.0, 0.0),
        ];
        disp.calculate_points(&plane, &quad).unwrap();
        for p in disp.points() {
            assert!((p.location.z - 12.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_quad_rejected() {
        let mut disp = Displacement::new(2);
        let plane = Plane {
            normal: Vector3::z(),
            distance: 0.0,
        };
        let triangle = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(64.0, 0.0, 0.0),
            Point::new(0.0, 64.0, 0.0),
        ];
        assert!(disp.calculate_points(&plane, &triangle).is_err());
    }
}
