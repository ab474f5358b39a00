//! Object nodes: identity, kind parameters, pose and visual attributes.
//!
//! Nodes live in the [`SceneGraph`](crate::scene_graph::SceneGraph) arena.
//! `parent` and `children` hold identities only, so a node never keeps another
//! node (or the controller) alive.

use std::borrow::Borrow;
use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::transform::{Point3, Pose};

// ============================================================================
// Identity
// ============================================================================

/// Identity of an object, unique within one scene controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ObjectId> for ObjectId {
    fn from(id: &ObjectId) -> Self {
        id.clone()
    }
}

// ============================================================================
// Kinds
// ============================================================================

/// The closed set of node kinds. `Group` is the only non-renderable kind.
///
/// Field order of each variant is the positional argument order on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Group,
    Box {
        width: f64,
        height: f64,
        depth: f64,
        #[serde(default)]
        wireframe: bool,
    },
    Sphere {
        radius: f64,
        #[serde(default = "default_width_segments")]
        width_segments: u32,
        #[serde(default = "default_sphere_height_segments")]
        height_segments: u32,
        #[serde(default)]
        wireframe: bool,
    },
    Cylinder {
        top_radius: f64,
        bottom_radius: f64,
        height: f64,
        #[serde(default = "default_radial_segments")]
        radial_segments: u32,
        #[serde(default = "default_one_segment")]
        height_segments: u32,
        #[serde(default)]
        wireframe: bool,
    },
    Ring {
        inner_radius: f64,
        outer_radius: f64,
        #[serde(default = "default_radial_segments")]
        theta_segments: u32,
        #[serde(default = "default_one_segment")]
        phi_segments: u32,
        #[serde(default)]
        theta_start: f64,
        #[serde(default = "default_full_turn")]
        theta_length: f64,
        #[serde(default)]
        wireframe: bool,
    },
    QuadraticBezierTube {
        start: Point3,
        mid: Point3,
        end: Point3,
        #[serde(default = "default_tubular_segments")]
        tubular_segments: u32,
        #[serde(default = "default_unit")]
        radius: f64,
        #[serde(default = "default_radial_segments")]
        radial_segments: u32,
        #[serde(default)]
        closed: bool,
        #[serde(default)]
        wireframe: bool,
    },
    Extrusion {
        outline: Vec<[f64; 2]>,
        height: f64,
        #[serde(default)]
        wireframe: bool,
    },
    Line {
        start: Point3,
        end: Point3,
    },
    Curve {
        start: Point3,
        control1: Point3,
        control2: Point3,
        end: Point3,
        #[serde(default = "default_num_points")]
        num_points: u32,
    },
    Text {
        text: String,
        #[serde(default)]
        style: String,
    },
    Text3d {
        text: String,
        #[serde(default)]
        style: String,
    },
    Texture {
        url: String,
        coordinates: Vec<Vec<Option<[f64; 3]>>>,
    },
    PointCloud {
        points: Vec<[f64; 3]>,
        #[serde(default)]
        colors: Option<Vec<[f64; 3]>>,
        #[serde(default = "default_unit")]
        point_size: f64,
    },
    AxesHelper {
        length: f64,
    },
    SpotLight {
        #[serde(default = "default_light_color")]
        color: String,
        #[serde(default = "default_unit")]
        intensity: f64,
        #[serde(default)]
        distance: f64,
        #[serde(default = "default_spot_angle")]
        angle: f64,
        #[serde(default)]
        penumbra: f64,
        #[serde(default = "default_unit")]
        decay: f64,
    },
    Stl {
        url: String,
        #[serde(default)]
        wireframe: bool,
    },
    Gltf {
        url: String,
    },
}

fn default_width_segments() -> u32 {
    32
}

fn default_sphere_height_segments() -> u32 {
    16
}

fn default_radial_segments() -> u32 {
    8
}

fn default_one_segment() -> u32 {
    1
}

fn default_tubular_segments() -> u32 {
    64
}

fn default_num_points() -> u32 {
    20
}

fn default_unit() -> f64 {
    1.0
}

fn default_full_turn() -> f64 {
    2.0 * PI
}

fn default_spot_angle() -> f64 {
    PI / 3.0
}

fn default_light_color() -> String {
    "#ffffff".to_string()
}

impl ObjectKind {
    pub fn cuboid(width: f64, height: f64, depth: f64) -> Self {
        ObjectKind::Box {
            width,
            height,
            depth,
            wireframe: false,
        }
    }

    pub fn sphere(radius: f64) -> Self {
        ObjectKind::Sphere {
            radius,
            width_segments: default_width_segments(),
            height_segments: default_sphere_height_segments(),
            wireframe: false,
        }
    }

    pub fn cylinder(top_radius: f64, bottom_radius: f64, height: f64) -> Self {
        ObjectKind::Cylinder {
            top_radius,
            bottom_radius,
            height,
            radial_segments: default_radial_segments(),
            height_segments: default_one_segment(),
            wireframe: false,
        }
    }

    pub fn ring(inner_radius: f64, outer_radius: f64) -> Self {
        ObjectKind::Ring {
            inner_radius,
            outer_radius,
            theta_segments: default_radial_segments(),
            phi_segments: default_one_segment(),
            theta_start: 0.0,
            theta_length: default_full_turn(),
            wireframe: false,
        }
    }

    pub fn quadratic_bezier_tube(start: Point3, mid: Point3, end: Point3) -> Self {
        ObjectKind::QuadraticBezierTube {
            start,
            mid,
            end,
            tubular_segments: default_tubular_segments(),
            radius: default_unit(),
            radial_segments: default_radial_segments(),
            closed: false,
            wireframe: false,
        }
    }

    pub fn extrusion(outline: Vec<[f64; 2]>, height: f64) -> Self {
        ObjectKind::Extrusion {
            outline,
            height,
            wireframe: false,
        }
    }

    pub fn line(start: Point3, end: Point3) -> Self {
        ObjectKind::Line { start, end }
    }

    pub fn curve(start: Point3, control1: Point3, control2: Point3, end: Point3) -> Self {
        ObjectKind::Curve {
            start,
            control1,
            control2,
            end,
            num_points: default_num_points(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ObjectKind::Text {
            text: text.into(),
            style: String::new(),
        }
    }

    pub fn text3d(text: impl Into<String>) -> Self {
        ObjectKind::Text3d {
            text: text.into(),
            style: String::new(),
        }
    }

    pub fn point_cloud(points: Vec<[f64; 3]>) -> Self {
        ObjectKind::PointCloud {
            points,
            colors: None,
            point_size: default_unit(),
        }
    }

    pub fn axes_helper(length: f64) -> Self {
        ObjectKind::AxesHelper { length }
    }

    pub fn spot_light() -> Self {
        ObjectKind::SpotLight {
            color: default_light_color(),
            intensity: default_unit(),
            distance: 0.0,
            angle: default_spot_angle(),
            penumbra: 0.0,
            decay: default_unit(),
        }
    }

    /// Wire name of the kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Group => "group",
            ObjectKind::Box { .. } => "box",
            ObjectKind::Sphere { .. } => "sphere",
            ObjectKind::Cylinder { .. } => "cylinder",
            ObjectKind::Ring { .. } => "ring",
            ObjectKind::QuadraticBezierTube { .. } => "quadratic_bezier_tube",
            ObjectKind::Extrusion { .. } => "extrusion",
            ObjectKind::Line { .. } => "line",
            ObjectKind::Curve { .. } => "curve",
            ObjectKind::Text { .. } => "text",
            ObjectKind::Text3d { .. } => "text3d",
            ObjectKind::Texture { .. } => "texture",
            ObjectKind::PointCloud { .. } => "point_cloud",
            ObjectKind::AxesHelper { .. } => "axes_helper",
            ObjectKind::SpotLight { .. } => "spot_light",
            ObjectKind::Stl { .. } => "stl",
            ObjectKind::Gltf { .. } => "gltf",
        }
    }

    pub fn is_renderable(&self) -> bool {
        !matches!(self, ObjectKind::Group)
    }

    /// Kind parameters as positional wire arguments.
    pub fn args(&self) -> Vec<Value> {
        match self {
            ObjectKind::Group => Vec::new(),
            ObjectKind::Box {
                width,
                height,
                depth,
                wireframe,
            } => vec![json!(width), json!(height), json!(depth), json!(wireframe)],
            ObjectKind::Sphere {
                radius,
                width_segments,
                height_segments,
                wireframe,
            } => vec![
                json!(radius),
                json!(width_segments),
                json!(height_segments),
                json!(wireframe),
            ],
            ObjectKind::Cylinder {
                top_radius,
                bottom_radius,
                height,
                radial_segments,
                height_segments,
                wireframe,
            } => vec![
                json!(top_radius),
                json!(bottom_radius),
                json!(height),
                json!(radial_segments),
                json!(height_segments),
                json!(wireframe),
            ],
            ObjectKind::Ring {
                inner_radius,
                outer_radius,
                theta_segments,
                phi_segments,
                theta_start,
                theta_length,
                wireframe,
            } => vec![
                json!(inner_radius),
                json!(outer_radius),
                json!(theta_segments),
                json!(phi_segments),
                json!(theta_start),
                json!(theta_length),
                json!(wireframe),
            ],
            ObjectKind::QuadraticBezierTube {
                start,
                mid,
                end,
                tubular_segments,
                radius,
                radial_segments,
                closed,
                wireframe,
            } => vec![
                json!(start.to_array()),
                json!(mid.to_array()),
                json!(end.to_array()),
                json!(tubular_segments),
                json!(radius),
                json!(radial_segments),
                json!(closed),
                json!(wireframe),
            ],
            ObjectKind::Extrusion {
                outline,
                height,
                wireframe,
            } => vec![json!(outline), json!(height), json!(wireframe)],
            ObjectKind::Line { start, end } => vec![json!(start.to_array()), json!(end.to_array())],
            ObjectKind::Curve {
                start,
                control1,
                control2,
                end,
                num_points,
            } => vec![
                json!(start.to_array()),
                json!(control1.to_array()),
                json!(control2.to_array()),
                json!(end.to_array()),
                json!(num_points),
            ],
            ObjectKind::Text { text, style } | ObjectKind::Text3d { text, style } => {
                vec![json!(text), json!(style)]
            }
            ObjectKind::Texture { url, coordinates } => vec![json!(url), json!(coordinates)],
            ObjectKind::PointCloud {
                points,
                colors,
                point_size,
            } => vec![json!(points), json!(colors), json!(point_size)],
            ObjectKind::AxesHelper { length } => vec![json!(length)],
            ObjectKind::SpotLight {
                color,
                intensity,
                distance,
                angle,
                penumbra,
                decay,
            } => vec![
                json!(color),
                json!(intensity),
                json!(distance),
                json!(angle),
                json!(penumbra),
                json!(decay),
            ],
            ObjectKind::Stl { url, wireframe } => vec![json!(url), json!(wireframe)],
            ObjectKind::Gltf { url } => vec![json!(url)],
        }
    }
}

// ============================================================================
// Material
// ============================================================================

/// Which faces of a mesh are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Front,
    Back,
    Both,
}

/// Visual attributes shared by every renderable kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// CSS colour string; `None` leaves the renderer's default.
    pub color: Option<String>,
    pub opacity: f64,
    pub side: Side,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Some("#ffffff".to_string()),
            opacity: 1.0,
            side: Side::Front,
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A single node of the scene tree.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub(crate) id: ObjectId,
    pub(crate) name: Option<String>,
    pub(crate) kind: ObjectKind,
    pub(crate) pose: Pose,
    pub(crate) material: Material,
    pub(crate) visible: bool,
    pub(crate) draggable: bool,
    /// `None` means the implicit scene root.
    pub(crate) parent: Option<ObjectId>,
    /// Creation (or attach) order.
    pub(crate) children: Vec<ObjectId>,
}

impl ObjectNode {
    pub(crate) fn new(id: ObjectId, kind: ObjectKind, parent: Option<ObjectId>) -> Self {
        Self {
            id,
            name: None,
            kind,
            pose: Pose::default(),
            material: Material::default(),
            visible: true,
            draggable: false,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn position(&self) -> Point3 {
        self.pose.position
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Full serialized state, as sent in `create` and `snapshot`.
    pub fn data(&self) -> NodeData {
        NodeData {
            kind: self.kind.type_name(),
            id: self.id.clone(),
            parent_id: self.parent.clone(),
            args: self.kind.args(),
            name: self.name.clone(),
            color: self.material.color.clone(),
            opacity: self.material.opacity,
            side: self.material.side,
            x: self.pose.position.x,
            y: self.pose.position.y,
            z: self.pose.position.z,
            rotation: self.pose.rotation_rows(),
            sx: self.pose.scale.x,
            sy: self.pose.scale.y,
            sz: self.pose.scale.z,
            visible: self.visible,
            draggable: self.draggable,
        }
    }
}

/// Wire representation of a node. `parent_id` is `null` for scene-root children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: ObjectId,
    pub parent_id: Option<ObjectId>,
    pub args: Vec<Value>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub opacity: f64,
    pub side: Side,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    pub sx: f64,
    pub sy: f64,
    pub sz: f64,
    pub visible: bool,
    pub draggable: bool,
}
