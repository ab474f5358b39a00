//! Declarative scene definitions.
//!
//! A definition is a JSON document holding the scene configuration, an
//! optional initial camera pose and a tree of objects:
//!
//! ```json
//! {
//!   "config": {"width": 800, "height": 600},
//!   "camera": {"x": 2, "y": -4, "z": 3},
//!   "objects": [
//!     {"type": "group", "name": "table", "children": [
//!       {"type": "box", "width": 1, "height": 1, "depth": 0.1, "position": [0, 0, 1]}
//!     ]}
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::camera::CameraMove;
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::object::{Material, ObjectId, ObjectKind};
use crate::scene::SceneController;
use crate::transform::Point3;

/// Scale as a single factor or per axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    Uniform(f64),
    Axes(Point3),
}

/// One object of a definition plus its children.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectSpec {
    #[serde(flatten)]
    pub kind: ObjectKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<Point3>,
    /// Euler angles `[omega, phi, kappa]` in radians.
    #[serde(default)]
    pub rotation: Option<[f64; 3]>,
    #[serde(default)]
    pub scale: Option<ScaleSpec>,
    #[serde(default)]
    pub material: Option<Material>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub draggable: Option<bool>,
    #[serde(default)]
    pub children: Vec<ObjectSpec>,
}

impl ObjectSpec {
    /// Create this object (and its subtree) under the controller's current
    /// scope.
    pub fn spawn(&self, scene: &mut SceneController) -> Result<ObjectId, SceneError> {
        let mut node = scene.create(self.kind.clone());
        if let Some(name) = &self.name {
            node = node.with_name(name.clone());
        }
        if let Some(p) = self.position {
            node = node.move_to(p.x, p.y, p.z);
        }
        if let Some([omega, phi, kappa]) = self.rotation {
            node = node.rotate(omega, phi, kappa);
        }
        match self.scale {
            Some(ScaleSpec::Uniform(factor)) => node = node.scale(factor),
            Some(ScaleSpec::Axes(s)) => node = node.scale_xyz(s.x, s.y, s.z),
            None => {}
        }
        if let Some(material) = &self.material {
            node = node.material(material.color.as_deref(), material.opacity, material.side);
        }
        if let Some(visible) = self.visible {
            node = node.visible(visible);
        }
        if let Some(draggable) = self.draggable {
            node = node.draggable(draggable);
        }
        let id = node.id().clone();

        if !self.children.is_empty() {
            scene.scope(&id, |scene| {
                self.children
                    .iter()
                    .try_for_each(|child| child.spawn(scene).map(|_| ()))
            })??;
        }
        Ok(id)
    }

    /// Number of objects this spec creates, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ObjectSpec::count).sum::<usize>()
    }
}

/// A complete scene definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SceneDefinition {
    #[serde(default)]
    pub config: SceneConfig,
    #[serde(default)]
    pub camera: Option<CameraMove>,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
}

impl SceneDefinition {
    /// Load a definition from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene definition {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid scene definition {:?}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(content).context("Failed to parse scene definition")?;
        definition.config.validate()?;
        Ok(definition)
    }

    /// Total number of objects the definition creates.
    pub fn object_count(&self) -> usize {
        self.objects.iter().map(ObjectSpec::count).sum()
    }

    /// Build a controller populated with every object of the definition.
    pub fn build(&self) -> Result<SceneController> {
        let mut scene = SceneController::new(self.config.clone());
        if let Some(camera) = self.camera {
            scene.move_camera(camera, 0.0);
        }
        for spec in &self.objects {
            spec.spawn(&mut scene)?;
        }
        log::info!("built scene with {} objects", scene.object_count());
        Ok(scene)
    }
}
