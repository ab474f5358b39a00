//! Plain value types for 3D pose.
//!
//! Rotations are kept as 3x3 matrices (row-major on the wire) so that repeated
//! re-parenting composes exactly instead of accumulating Euler round-trips.
//! Composition is rigid: position and rotation only. Scale is carried per node
//! but never folded into a parent's frame.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Point3
// ============================================================================

/// A position or direction in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<DVec3> for Point3 {
    fn from(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<(f64, f64, f64)> for Point3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

// ============================================================================
// Rotation helpers
// ============================================================================

/// Rotation matrix for the Euler angles `omega` (about X), `phi` (about Y) and
/// `kappa` (about Z), applied in that order: `Rz * Ry * Rx`.
pub fn rotation_matrix_from_euler(omega: f64, phi: f64, kappa: f64) -> DMat3 {
    DMat3::from_rotation_z(kappa) * DMat3::from_rotation_y(phi) * DMat3::from_rotation_x(omega)
}

/// Row-major nested array, the layout renderers expect for `R`.
pub fn matrix_rows(m: &DMat3) -> [[f64; 3]; 3] {
    m.transpose().to_cols_array_2d()
}

/// Inverse of [`matrix_rows`].
pub fn matrix_from_rows(rows: [[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(&rows).transpose()
}

// ============================================================================
// Pose
// ============================================================================

/// Local pose of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point3,
    pub rotation: DMat3,
    pub scale: Point3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Point3::ZERO,
            rotation: DMat3::IDENTITY,
            scale: Point3::ONE,
        }
    }
}

impl Pose {
    /// Express `local` (given relative to `self`) in the frame `self` lives in.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose {
            position: (self.rotation * local.position.to_dvec3() + self.position.to_dvec3()).into(),
            rotation: self.rotation * local.rotation,
            scale: local.scale,
        }
    }

    /// Express `self` (a world pose) relative to the world pose `frame`.
    ///
    /// Exact inverse of [`Pose::compose`] because rotations are orthonormal.
    pub fn relative_to(&self, frame: &Pose) -> Pose {
        let inverse = frame.rotation.transpose();
        Pose {
            position: (inverse * (self.position.to_dvec3() - frame.position.to_dvec3())).into(),
            rotation: inverse * self.rotation,
            scale: self.scale,
        }
    }

    pub fn rotation_rows(&self) -> [[f64; 3]; 3] {
        matrix_rows(&self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rotation_matrix_from_euler() {
        let (omega, phi, kappa) = (0.1_f64, 0.2_f64, 0.3_f64);
        let rx = [
            [1.0, 0.0, 0.0],
            [0.0, omega.cos(), -omega.sin()],
            [0.0, omega.sin(), omega.cos()],
        ];
        let ry = [
            [phi.cos(), 0.0, phi.sin()],
            [0.0, 1.0, 0.0],
            [-phi.sin(), 0.0, phi.cos()],
        ];
        let rz = [
            [kappa.cos(), -kappa.sin(), 0.0],
            [kappa.sin(), kappa.cos(), 0.0],
            [0.0, 0.0, 1.0],
        ];
        let expected = matrix_from_rows(rz) * matrix_from_rows(ry) * matrix_from_rows(rx);
        let actual = rotation_matrix_from_euler(omega, phi, kappa);

        let (e, a) = (matrix_rows(&expected), matrix_rows(&actual));
        for row in 0..3 {
            for col in 0..3 {
                assert!(approx(e[row][col], a[row][col]), "mismatch at {row},{col}");
            }
        }
    }

    #[test]
    fn test_matrix_rows_layout() {
        // 90 degrees about Z maps +X to +Y, so the second row starts with 1.
        let rows = matrix_rows(&DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2));
        assert!(approx(rows[0][1], -1.0));
        assert!(approx(rows[1][0], 1.0));
    }

    #[test]
    fn test_compose_then_relative_roundtrip() {
        let parent = Pose {
            position: Point3::new(1.0, 2.0, 3.0),
            rotation: rotation_matrix_from_euler(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            scale: Point3::ONE,
        };
        let local = Pose {
            position: Point3::new(1.0, 0.0, 0.0),
            ..Pose::default()
        };

        let world = parent.compose(&local);
        assert!(approx(world.position.x, 1.0));
        assert!(approx(world.position.y, 3.0));
        assert!(approx(world.position.z, 3.0));

        let back = world.relative_to(&parent);
        assert!(approx(back.position.x, 1.0));
        assert!(approx(back.position.y, 0.0));
        assert!(approx(back.position.z, 0.0));
    }
}
