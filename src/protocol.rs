//! Outbound wire protocol (server → renderer).
//!
//! Every message is a named operation with positional arguments:
//!
//! ```json
//! {"name": "move", "args": ["4", 1.0, 2.0, 3.0]}
//! {"name": "get_camera", "args": [], "request_id": 7}
//! ```
//!
//! Fire-and-forget operations are [`Command`]s. Operations whose caller waits
//! for an answer are [`Query`]s and carry a `request_id` the renderer echoes
//! back in a `response` event.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::camera::SceneCamera;
use crate::config::SceneConfig;
use crate::object::{NodeData, ObjectId};
use crate::transform::Point3;

// ============================================================================
// Gizmo and clipping value types
// ============================================================================

/// Manipulation mode of a transform gizmo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

/// Coordinate space a gizmo operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GizmoSpace {
    Local,
    World,
}

/// Gizmo handle axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Clipping plane `nx*x + ny*y + nz*z + d = 0`. Geometry on the negative side
/// is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlane {
    pub nx: f64,
    pub ny: f64,
    pub nz: f64,
    pub d: f64,
}

impl ClipPlane {
    /// Plane with the given normal (normalised here) and signed offset.
    pub fn new(normal: Point3, d: f64) -> Self {
        let n = normal.to_dvec3().normalize_or_zero();
        Self {
            nx: n.x,
            ny: n.y,
            nz: n.z,
            d,
        }
    }
}

/// Orientation inset overlay options. Unset fields keep the renderer's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxesInset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Edge length in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
    #[serde(rename = "marginX", skip_serializing_if = "Option::is_none")]
    pub margin_x: Option<u32>,
    #[serde(rename = "marginY", skip_serializing_if = "Option::is_none")]
    pub margin_y: Option<u32>,
    /// `bottom-left`, `bottom-right`, `top-left` or `top-right`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// Axis label options for the orientation inset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxesLabels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// CSS font string, e.g. `bold 32px sans-serif`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(rename = "colorX", skip_serializing_if = "Option::is_none")]
    pub color_x: Option<String>,
    #[serde(rename = "colorY", skip_serializing_if = "Option::is_none")]
    pub color_y: Option<String>,
    #[serde(rename = "colorZ", skip_serializing_if = "Option::is_none")]
    pub color_z: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

// ============================================================================
// Commands
// ============================================================================

/// Full state replay for a (re)connecting renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub props: SceneConfig,
    pub camera: SceneCamera,
    /// Parents always precede their children.
    pub nodes: Vec<NodeData>,
}

/// Fully resolved camera move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTarget {
    pub position: Point3,
    pub look_at: Point3,
    pub up: Point3,
    /// Seconds. `0` means jump immediately.
    pub duration: f64,
}

/// Fire-and-forget operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Snapshot(Box<Snapshot>),
    Create(Box<NodeData>),
    Delete(ObjectId),
    Move(ObjectId, Point3),
    /// Partial property update, keys as in [`NodeData`].
    SetProperties(ObjectId, Map<String, Value>),
    Attach(ObjectId, ObjectId),
    Detach(ObjectId),
    MoveCamera(CameraTarget),
    EnableGizmo {
        id: ObjectId,
        mode: GizmoMode,
        size: Option<f64>,
        visible_axes: Option<Vec<Axis>>,
    },
    DisableGizmo(ObjectId),
    SetGizmoMode(ObjectId, GizmoMode),
    SetGizmoSize(ObjectId, f64),
    SetGizmoSpace(ObjectId, GizmoSpace),
    /// Rotation snap angle in radians.
    SetGizmoSnap(ObjectId, f64),
    SetClippingPlanes(ObjectId, Vec<ClipPlane>),
    ClearClippingPlanes(ObjectId),
    SetOrbitEnabled(bool),
    SetAxesInset(AxesInset),
    SetAxesLabels(AxesLabels),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Snapshot(_) => "snapshot",
            Command::Create(_) => "create",
            Command::Delete(_) => "delete",
            Command::Move(..) => "move",
            Command::SetProperties(..) => "set_properties",
            Command::Attach(..) => "attach",
            Command::Detach(_) => "detach",
            Command::MoveCamera(_) => "move_camera",
            Command::EnableGizmo { .. } => "enable_gizmo",
            Command::DisableGizmo(_) => "disable_gizmo",
            Command::SetGizmoMode(..) => "set_gizmo_mode",
            Command::SetGizmoSize(..) => "set_gizmo_size",
            Command::SetGizmoSpace(..) => "set_gizmo_space",
            Command::SetGizmoSnap(..) => "set_gizmo_snap",
            Command::SetClippingPlanes(..) => "set_clipping_planes",
            Command::ClearClippingPlanes(_) => "clear_clipping_planes",
            Command::SetOrbitEnabled(_) => "set_orbit_enabled",
            Command::SetAxesInset(_) => "set_axes_inset",
            Command::SetAxesLabels(_) => "set_axes_labels",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Command::Snapshot(snapshot) => vec![json!(snapshot)],
            Command::Create(node) => vec![json!(node)],
            Command::Delete(id) | Command::Detach(id) | Command::DisableGizmo(id) => {
                vec![json!(id)]
            }
            Command::ClearClippingPlanes(id) => vec![json!(id)],
            Command::Move(id, p) => vec![json!(id), json!(p.x), json!(p.y), json!(p.z)],
            Command::SetProperties(id, props) => vec![json!(id), Value::Object(props.clone())],
            Command::Attach(id, parent) => vec![json!(id), json!(parent)],
            Command::MoveCamera(t) => vec![
                json!(t.position.x),
                json!(t.position.y),
                json!(t.position.z),
                json!(t.look_at.x),
                json!(t.look_at.y),
                json!(t.look_at.z),
                json!(t.up.x),
                json!(t.up.y),
                json!(t.up.z),
                json!(t.duration),
            ],
            Command::EnableGizmo {
                id,
                mode,
                size,
                visible_axes,
            } => vec![json!(id), json!(mode), json!(size), json!(visible_axes)],
            Command::SetGizmoMode(id, mode) => vec![json!(id), json!(mode)],
            Command::SetGizmoSize(id, v) | Command::SetGizmoSnap(id, v) => vec![json!(id), json!(v)],
            Command::SetGizmoSpace(id, space) => vec![json!(id), json!(space)],
            Command::SetClippingPlanes(id, planes) => vec![json!(id), json!(planes)],
            Command::SetOrbitEnabled(flag) => vec![json!(flag)],
            Command::SetAxesInset(opts) => vec![json!(opts)],
            Command::SetAxesLabels(opts) => vec![json!(opts)],
        }
    }

    /// Object the command targets, if any.
    pub fn target(&self) -> Option<&ObjectId> {
        match self {
            Command::Delete(id)
            | Command::Move(id, _)
            | Command::SetProperties(id, _)
            | Command::Attach(id, _)
            | Command::Detach(id)
            | Command::EnableGizmo { id, .. }
            | Command::DisableGizmo(id)
            | Command::SetGizmoMode(id, _)
            | Command::SetGizmoSize(id, _)
            | Command::SetGizmoSpace(id, _)
            | Command::SetGizmoSnap(id, _)
            | Command::SetClippingPlanes(id, _)
            | Command::ClearClippingPlanes(id) => Some(id),
            Command::Create(node) => Some(&node.id),
            Command::Snapshot(_)
            | Command::MoveCamera(_)
            | Command::SetOrbitEnabled(_)
            | Command::SetAxesInset(_)
            | Command::SetAxesLabels(_) => None,
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Operations answered by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    GetCamera,
    HasGizmo(ObjectId),
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::GetCamera => "get_camera",
            Query::HasGizmo(_) => "has_gizmo",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            Query::GetCamera => Vec::new(),
            Query::HasGizmo(id) => vec![json!(id)],
        }
    }
}

// ============================================================================
// Message envelope
// ============================================================================

/// Everything a renderer link transports.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Command(Command),
    Query { request_id: u64, query: Query },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(command) => command.name(),
            Message::Query { query, .. } => query.name(),
        }
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Message::Command(command) => Some(command),
            Message::Query { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!(self)
    }
}

#[derive(Serialize)]
struct WireMessage {
    name: &'static str,
    args: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<u64>,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Message::Command(command) => WireMessage {
                name: command.name(),
                args: command.args(),
                request_id: None,
            },
            Message::Query { request_id, query } => WireMessage {
                name: query.name(),
                args: query.args(),
                request_id: Some(*request_id),
            },
        };
        wire.serialize(serializer)
    }
}
