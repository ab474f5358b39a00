//! Scene camera model.
//!
//! The controller keeps one authoritative [`SceneCamera`]. It is a cache: the
//! renderer may move its live camera through user navigation (orbit controls)
//! without telling the server. [`LiveCamera`] is what the renderer reports
//! when asked, and it is never written back into the cache.
//!
//! Camera updates are partial. Every field of [`CameraMove`] is optional and an
//! omitted field keeps its last known value; nothing ever resets to a default.

use serde::{Deserialize, Serialize};

use crate::transform::Point3;

/// Animation duration used by [`CameraMove`] when none is given.
pub const DEFAULT_MOVE_DURATION: f64 = 0.5;

// ============================================================================
// Projection
// ============================================================================

/// Projection parameters, tagged by camera type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// `fov` is the vertical field of view in degrees.
    Perspective { fov: f64, near: f64, far: f64 },
    /// `size` is the vertical extent of the view volume. Horizontal extent
    /// follows the viewport aspect ratio.
    Orthographic { size: f64, near: f64, far: f64 },
}

impl Projection {
    pub fn perspective() -> Self {
        Projection::Perspective {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn orthographic() -> Self {
        Projection::Orthographic {
            size: 10.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Projection::Perspective { .. } => "perspective",
            Projection::Orthographic { .. } => "orthographic",
        }
    }

    pub fn near(&self) -> f64 {
        match *self {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f64 {
        match *self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective()
    }
}

// ============================================================================
// Scene Camera
// ============================================================================

/// Authoritative camera pose plus projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneCamera {
    #[serde(flatten)]
    pub projection: Projection,
    pub position: Point3,
    pub look_at: Point3,
    pub up: Point3,
}

impl Default for SceneCamera {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}

impl SceneCamera {
    /// Camera with the given projection, slightly behind and above the origin,
    /// looking at the origin with Z up.
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            position: Point3::new(0.0, -3.0, 5.0),
            look_at: Point3::ZERO,
            up: Point3::new(0.0, 0.0, 1.0),
        }
    }

    /// Merge a partial update. Omitted fields keep their previous value.
    pub fn apply(&mut self, update: &CameraMove) {
        fn merge(slot: &mut f64, value: Option<f64>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        merge(&mut self.position.x, update.x);
        merge(&mut self.position.y, update.y);
        merge(&mut self.position.z, update.z);
        merge(&mut self.look_at.x, update.look_at_x);
        merge(&mut self.look_at.y, update.look_at_y);
        merge(&mut self.look_at.z, update.look_at_z);
        merge(&mut self.up.x, update.up_x);
        merge(&mut self.up.y, update.up_y);
        merge(&mut self.up.z, update.up_z);
    }
}

// ============================================================================
// Partial camera update
// ============================================================================

/// A partial camera pose. Build with the chained setters:
///
/// ```
/// use scenesync::camera::CameraMove;
/// let update = CameraMove::new().position(1.0, 2.0, 3.0).look_at(0.0, 0.0, 1.0);
/// assert_eq!(update.up_z, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraMove {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub look_at_x: Option<f64>,
    pub look_at_y: Option<f64>,
    pub look_at_z: Option<f64>,
    pub up_x: Option<f64>,
    pub up_y: Option<f64>,
    pub up_z: Option<f64>,
}

impl CameraMove {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x(mut self, v: f64) -> Self {
        self.x = Some(v);
        self
    }

    pub fn y(mut self, v: f64) -> Self {
        self.y = Some(v);
        self
    }

    pub fn z(mut self, v: f64) -> Self {
        self.z = Some(v);
        self
    }

    pub fn position(self, x: f64, y: f64, z: f64) -> Self {
        self.x(x).y(y).z(z)
    }

    pub fn look_at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.look_at_x = Some(x);
        self.look_at_y = Some(y);
        self.look_at_z = Some(z);
        self
    }

    pub fn up(mut self, x: f64, y: f64, z: f64) -> Self {
        self.up_x = Some(x);
        self.up_y = Some(y);
        self.up_z = Some(z);
        self
    }
}

// ============================================================================
// Live camera (renderer-reported)
// ============================================================================

/// Camera state reported by a renderer in answer to `get_camera`.
///
/// Only position and up vector are required; renderers that track a look-at
/// target, Euler rotation or projection report those too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveCamera {
    pub position: Point3,
    pub up: Point3,
    #[serde(default)]
    pub look_at: Option<Point3>,
    #[serde(default)]
    pub rotation: Option<Point3>,
    #[serde(default)]
    pub projection: Option<Projection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = SceneCamera::default();
        assert_eq!(camera.projection, Projection::perspective());
        assert_eq!(camera.position, Point3::new(0.0, -3.0, 5.0));
        assert_eq!(camera.look_at, Point3::ZERO);
        assert_eq!(camera.up, Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_partial_update_keeps_omitted_fields() {
        let mut camera = SceneCamera::default();
        camera.apply(&CameraMove::new().position(1.0, 2.0, 3.0));
        camera.apply(&CameraMove::new().z(10.0));

        assert_eq!(camera.position, Point3::new(1.0, 2.0, 10.0));
        assert_eq!(camera.up, Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_empty_update_is_noop() {
        let mut camera = SceneCamera::new(Projection::orthographic());
        let before = camera;
        camera.apply(&CameraMove::default());
        assert_eq!(camera, before);
    }

    #[test]
    fn test_camera_serializes_projection_inline() {
        let json = serde_json::to_value(SceneCamera::default()).unwrap();
        assert_eq!(json["type"], "perspective");
        assert_eq!(json["fov"], 75.0);
        assert_eq!(json["position"]["z"], 5.0);
    }

    #[test]
    fn test_live_camera_minimal_payload() {
        let live: LiveCamera = serde_json::from_value(serde_json::json!({
            "position": {"x": 1.0, "y": 2.0, "z": 3.0},
            "up": {"x": 0.0, "y": 0.0, "z": 1.0}
        }))
        .unwrap();
        assert_eq!(live.position, Point3::new(1.0, 2.0, 3.0));
        assert!(live.projection.is_none());
    }
}
