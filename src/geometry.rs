//! Geometry primitives shared by the registration engine.
//!
//! Points and vectors are [`nalgebra`] types in `f64` so values persisted as JSON doubles
//! round-trip without loss. The world is Y-up; every rotation handled by this crate is a
//! rotation about the Y axis, represented by [`YawRotation`].

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// A 3D point in world coordinates.
pub type Point3 = nalgebra::Point3<f64>;

/// A 3D displacement.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Tolerance used when checking that a stored matrix has the expected structure.
pub const STRUCTURE_TOLERANCE: f64 = 1e-6;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// A box of the given extents centered on `center`.
    pub fn from_center_size(center: Point3, size: Vector3) -> Self {
        let half = size / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Enclosed volume. Inverted boxes have zero volume.
    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x.max(0.0) * size.y.max(0.0) * size.z.max(0.0)
    }
}

/// Rotation about the vertical (Y) axis.
///
/// Stored as the `(cos θ, sin θ)` pair rather than an angle, so composing rotations is a
/// matrix product and never wraps around. The matching 4×4 form is
/// `[[c,0,s,0],[0,1,0,0],[-s,0,c,0],[0,0,0,1]]`, which maps `(x, z)` to
/// `(c·x + s·z, -s·x + c·z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawRotation {
    cos: f64,
    sin: f64,
}

impl Default for YawRotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl YawRotation {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    pub fn from_angle(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { cos, sin }
    }

    pub fn cos(&self) -> f64 {
        self.cos
    }

    pub fn sin(&self) -> f64 {
        self.sin
    }

    /// The rotation angle in `(-π, π]`. Only needed for display.
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// Matrix product `self × other`.
    pub fn then(&self, other: &Self) -> Self {
        Self {
            cos: self.cos * other.cos - self.sin * other.sin,
            sin: self.sin * other.cos + self.cos * other.sin,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }

    pub fn rotate_point(&self, p: &Point3) -> Point3 {
        Point3::new(
            self.cos * p.x + self.sin * p.z,
            p.y,
            -self.sin * p.x + self.cos * p.z,
        )
    }

    pub fn rotate_vector(&self, v: &Vector3) -> Vector3 {
        self.rotate_point(&Point3::from(*v)).coords
    }

    pub fn is_identity(&self) -> bool {
        self.cos == 1.0 && self.sin == 0.0
    }

    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let (c, s) = (self.cos, self.sin);
        Matrix4::new(
            c, 0.0, s, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            -s, 0.0, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Reads the `(cos, sin)` pair of a stored Y-rotation from `m[(0, 0)]` and `m[(0, 2)]`.
    ///
    /// The pair is taken verbatim, without renormalizing, so a load/save cycle reproduces
    /// the same numbers. Matrices written by single-precision clients drift away from a
    /// unit rotation; use [`is_yaw_matrix`](Self::is_yaw_matrix) to detect that.
    pub fn from_matrix4(m: &Matrix4<f64>) -> Self {
        Self {
            cos: m[(0, 0)],
            sin: m[(0, 2)],
        }
    }

    /// True when `m` is a unit rotation about Y within [`STRUCTURE_TOLERANCE`].
    pub fn is_yaw_matrix(m: &Matrix4<f64>) -> bool {
        let rotation = Self::from_matrix4(m);
        (rotation.cos.hypot(rotation.sin) - 1.0).abs() <= STRUCTURE_TOLERANCE
            && approx_eq_matrix(m, &rotation.to_matrix4())
    }
}

/// Mean of a set of points. Returns the origin for an empty slice.
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

pub fn distance_squared(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm_squared()
}

/// Translation-only homogeneous matrix.
pub fn translation_matrix(t: &Vector3) -> Matrix4<f64> {
    Matrix4::new_translation(t)
}

/// Element-wise comparison within [`STRUCTURE_TOLERANCE`].
pub fn approx_eq_matrix(a: &Matrix4<f64>, b: &Matrix4<f64>) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= STRUCTURE_TOLERANCE)
}

/// Row-major nested array, the on-disk layout of a matrix.
pub fn matrix_to_rows(m: &Matrix4<f64>) -> [[f64; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

pub fn matrix_from_rows(rows: &[[f64; 4]; 4]) -> Matrix4<f64> {
    Matrix4::from_fn(|r, c| rows[r][c])
}
