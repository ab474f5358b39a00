//! Inbound events (renderer → server).
//!
//! Renderers send `{"event": <name>, "args": {...}}`. [`SceneEvent::decode`]
//! turns one such event into a fully typed value or a
//! [`SceneError::ProtocolDecode`] that rejects just that event.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::ConnectionId;
use crate::error::SceneError;
use crate::object::ObjectId;
use crate::protocol::GizmoMode;
use crate::transform::Point3;

// ============================================================================
// Click
// ============================================================================

/// Click sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickType {
    Click,
    #[serde(rename = "dblclick")]
    DoubleClick,
}

impl ClickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickType::Click => "click",
            ClickType::DoubleClick => "dblclick",
        }
    }
}

/// Keyboard modifiers held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

/// One ray intersection, in the order the renderer reported it (nearest first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickHit {
    pub object_id: ObjectId,
    pub object_name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ClickHit {
    pub fn point(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickEvent {
    pub connection: ConnectionId,
    pub click_type: ClickType,
    pub button: i64,
    pub modifiers: Modifiers,
    pub hits: Vec<ClickHit>,
    /// Intersection of the click ray with the `z = 0` plane, when it crosses it.
    pub ground_point: Option<Point3>,
    pub screen_x: Option<f64>,
    pub screen_y: Option<f64>,
    pub client_x: Option<f64>,
    pub client_y: Option<f64>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
}

// ============================================================================
// Drag
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPhase {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DragEvent {
    pub connection: ConnectionId,
    pub phase: DragPhase,
    pub object_id: ObjectId,
    pub object_name: String,
    /// Proposed position. Only committed on [`DragPhase::End`].
    pub position: Point3,
}

// ============================================================================
// Transform (gizmo)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPhase {
    /// Continuous updates while the gizmo is being dragged.
    Moving,
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformEvent {
    pub connection: ConnectionId,
    pub phase: TransformPhase,
    pub object_id: ObjectId,
    pub object_name: String,
    /// Position in the parent's frame.
    pub position: Point3,
    /// World position, present only when the renderer reports all of `wx`,
    /// `wy` and `wz`.
    pub world_position: Option<Point3>,
    /// Euler angles `rx`, `ry`, `rz` in radians.
    pub rotation: Point3,
    pub mode: GizmoMode,
}

// ============================================================================
// Decoding
// ============================================================================

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Initialization acknowledgment.
    Init,
    Click(ClickEvent),
    Drag(DragEvent),
    Transform(TransformEvent),
    /// Answer to a round-trip query.
    Response { request_id: u64, value: Value },
}

#[derive(Deserialize)]
struct RawPoint {
    x: f64,
    y: f64,
    z: f64,
}

impl From<RawPoint> for Point3 {
    fn from(p: RawPoint) -> Self {
        Point3::new(p.x, p.y, p.z)
    }
}

#[derive(Deserialize)]
struct RawHit {
    object_id: ObjectId,
    #[serde(default)]
    object_name: Option<String>,
    point: RawPoint,
}

#[derive(Deserialize)]
struct RawClick {
    #[serde(default = "default_click_type")]
    click_type: ClickType,
    #[serde(default)]
    button: i64,
    #[serde(default)]
    alt_key: bool,
    #[serde(default)]
    ctrl_key: bool,
    #[serde(default)]
    meta_key: bool,
    #[serde(default)]
    shift_key: bool,
    hits: Vec<RawHit>,
    #[serde(default)]
    ground_point: Option<RawPoint>,
    screen_x: Option<f64>,
    screen_y: Option<f64>,
    client_x: Option<f64>,
    client_y: Option<f64>,
    offset_x: Option<f64>,
    offset_y: Option<f64>,
}

fn default_click_type() -> ClickType {
    ClickType::Click
}

#[derive(Deserialize)]
struct RawDrag {
    object_id: ObjectId,
    #[serde(default)]
    object_name: Option<String>,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize)]
struct RawTransform {
    object_id: ObjectId,
    #[serde(default)]
    object_name: Option<String>,
    x: f64,
    y: f64,
    z: f64,
    wx: Option<f64>,
    wy: Option<f64>,
    wz: Option<f64>,
    rx: f64,
    ry: f64,
    rz: f64,
    mode: GizmoMode,
}

#[derive(Deserialize)]
struct RawResponse {
    request_id: u64,
    #[serde(default)]
    value: Value,
}

/// Sub-type carried inside `drag` and `transform` payloads.
#[derive(Deserialize)]
struct RawSubtype {
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn parse<T: DeserializeOwned>(event: &str, args: &Value) -> Result<T, SceneError> {
    T::deserialize(args).map_err(|e| SceneError::decode(event, e))
}

fn subtype(event: &str, args: &Value) -> Result<Option<String>, SceneError> {
    if !args.is_object() {
        return Ok(None);
    }
    Ok(parse::<RawSubtype>(event, args)?.kind)
}

impl SceneEvent {
    /// Decode an inbound event by name. `click3d`, `dragstart` and `dragend`
    /// are accepted as aliases, and the generic `drag` / `transform` events
    /// may carry their sub-type in `args.type`.
    pub fn decode(connection: ConnectionId, event: &str, args: &Value) -> Result<Self, SceneError> {
        match event {
            "init" => Ok(SceneEvent::Init),
            "click" | "click3d" => decode_click(connection, event, args).map(SceneEvent::Click),
            "drag_start" | "dragstart" => decode_drag(connection, event, args, DragPhase::Start),
            "drag_end" | "dragend" => decode_drag(connection, event, args, DragPhase::End),
            "drag" => match subtype(event, args)?.as_deref() {
                Some("dragstart") | Some("drag_start") => {
                    decode_drag(connection, event, args, DragPhase::Start)
                }
                Some("dragend") | Some("drag_end") => decode_drag(connection, event, args, DragPhase::End),
                other => Err(SceneError::decode(event, format!("unknown drag type {other:?}"))),
            },
            "transform" => {
                let phase = match subtype(event, args)?.as_deref() {
                    None | Some("transform") => TransformPhase::Moving,
                    Some("transform_start") => TransformPhase::Start,
                    Some("transform_end") => TransformPhase::End,
                    Some(other) => {
                        return Err(SceneError::decode(event, format!("unknown transform type `{other}`")))
                    }
                };
                decode_transform(connection, event, args, phase)
            }
            "transform_start" => decode_transform(connection, event, args, TransformPhase::Start),
            "transform_end" => decode_transform(connection, event, args, TransformPhase::End),
            "response" => {
                let raw: RawResponse = parse(event, args)?;
                Ok(SceneEvent::Response {
                    request_id: raw.request_id,
                    value: raw.value,
                })
            }
            other => Err(SceneError::decode(other, "unknown event")),
        }
    }

    /// Canonical event name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SceneEvent::Init => "init",
            SceneEvent::Click(_) => "click",
            SceneEvent::Drag(e) => match e.phase {
                DragPhase::Start => "drag_start",
                DragPhase::End => "drag_end",
            },
            SceneEvent::Transform(e) => match e.phase {
                TransformPhase::Moving => "transform",
                TransformPhase::Start => "transform_start",
                TransformPhase::End => "transform_end",
            },
            SceneEvent::Response { .. } => "response",
        }
    }
}

fn decode_click(connection: ConnectionId, event: &str, args: &Value) -> Result<ClickEvent, SceneError> {
    let raw: RawClick = parse(event, args)?;
    Ok(ClickEvent {
        connection,
        click_type: raw.click_type,
        button: raw.button,
        modifiers: Modifiers {
            alt: raw.alt_key,
            ctrl: raw.ctrl_key,
            meta: raw.meta_key,
            shift: raw.shift_key,
        },
        hits: raw
            .hits
            .into_iter()
            .map(|hit| ClickHit {
                object_id: hit.object_id,
                object_name: hit.object_name.unwrap_or_default(),
                x: hit.point.x,
                y: hit.point.y,
                z: hit.point.z,
            })
            .collect(),
        ground_point: raw.ground_point.map(Point3::from),
        screen_x: raw.screen_x,
        screen_y: raw.screen_y,
        client_x: raw.client_x,
        client_y: raw.client_y,
        offset_x: raw.offset_x,
        offset_y: raw.offset_y,
    })
}

fn decode_drag(
    connection: ConnectionId,
    event: &str,
    args: &Value,
    phase: DragPhase,
) -> Result<SceneEvent, SceneError> {
    let raw: RawDrag = parse(event, args)?;
    Ok(SceneEvent::Drag(DragEvent {
        connection,
        phase,
        object_id: raw.object_id,
        object_name: raw.object_name.unwrap_or_default(),
        position: Point3::new(raw.x, raw.y, raw.z),
    }))
}

fn decode_transform(
    connection: ConnectionId,
    event: &str,
    args: &Value,
    phase: TransformPhase,
) -> Result<SceneEvent, SceneError> {
    let raw: RawTransform = parse(event, args)?;
    let world_position = match (raw.wx, raw.wy, raw.wz) {
        (Some(x), Some(y), Some(z)) => Some(Point3::new(x, y, z)),
        _ => None,
    };
    Ok(SceneEvent::Transform(TransformEvent {
        connection,
        phase,
        object_id: raw.object_id,
        object_name: raw.object_name.unwrap_or_default(),
        position: Point3::new(raw.x, raw.y, raw.z),
        world_position,
        rotation: Point3::new(raw.rx, raw.ry, raw.rz),
        mode: raw.mode,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONN: ConnectionId = ConnectionId(1);

    #[test]
    fn test_decode_click_example() {
        let args = json!({
            "click_type": "click",
            "button": 0,
            "hits": [{"object_id": "a", "object_name": "A", "point": {"x": 1, "y": 0, "z": 0}}]
        });
        let SceneEvent::Click(click) = SceneEvent::decode(CONN, "click", &args).unwrap() else {
            panic!("expected a click");
        };

        assert_eq!(
            click.hits,
            vec![ClickHit {
                object_id: ObjectId::new("a"),
                object_name: "A".to_string(),
                x: 1.0,
                y: 0.0,
                z: 0.0,
            }]
        );
        assert_eq!(click.ground_point, None);
        assert_eq!(click.button, 0);
        assert_eq!(click.modifiers, Modifiers::default());
    }

    #[test]
    fn test_decode_click_with_ground_point_and_coordinates() {
        let args = json!({
            "click_type": "dblclick",
            "button": 2,
            "alt_key": false, "ctrl_key": true, "meta_key": false, "shift_key": true,
            "hits": [],
            "ground_point": {"x": 0.5, "y": -1.0, "z": 0.0},
            "screen_x": 10.0, "screen_y": 20.0,
            "offset_x": 3.0, "offset_y": 4.0
        });
        let SceneEvent::Click(click) = SceneEvent::decode(CONN, "click3d", &args).unwrap() else {
            panic!("expected a click");
        };

        assert_eq!(click.click_type, ClickType::DoubleClick);
        assert!(click.modifiers.ctrl && click.modifiers.shift);
        assert!(click.hits.is_empty());
        assert_eq!(click.ground_point, Some(Point3::new(0.5, -1.0, 0.0)));
        assert_eq!(click.offset_y, Some(4.0));
        assert_eq!(click.client_x, None);
    }

    #[test]
    fn test_click_without_hits_is_rejected() {
        let err = SceneEvent::decode(CONN, "click", &json!({"button": 0})).unwrap_err();
        assert!(matches!(err, SceneError::ProtocolDecode { ref event, .. } if event == "click"));
    }

    #[test]
    fn test_decode_drag_aliases() {
        let args = json!({"object_id": "7", "object_name": "ball", "x": 1, "y": 2, "z": 3});
        let start = SceneEvent::decode(CONN, "dragstart", &args).unwrap();
        let end = SceneEvent::decode(CONN, "drag_end", &args).unwrap();
        assert_eq!(start.name(), "drag_start");
        assert_eq!(end.name(), "drag_end");

        let SceneEvent::Drag(drag) = end else {
            panic!("expected a drag");
        };
        assert_eq!(drag.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(drag.object_name, "ball");
    }

    #[test]
    fn test_generic_drag_uses_subtype() {
        let args = json!({"type": "dragend", "object_id": "7", "x": 0, "y": 0, "z": 0});
        let event = SceneEvent::decode(CONN, "drag", &args).unwrap();
        assert_eq!(event.name(), "drag_end");
    }

    #[test]
    fn test_transform_world_position_requires_all_components() {
        let partial = json!({
            "object_id": "3", "x": 1, "y": 2, "z": 3,
            "wx": 4, "wy": 5,
            "rx": 0, "ry": 0, "rz": 0.5, "mode": "rotate"
        });
        let SceneEvent::Transform(t) = SceneEvent::decode(CONN, "transform_end", &partial).unwrap() else {
            panic!("expected a transform");
        };
        assert_eq!(t.world_position, None);
        assert_eq!(t.mode, GizmoMode::Rotate);
        assert_eq!(t.rotation.z, 0.5);
        assert_eq!(t.object_name, "");

        let mut full = partial.clone();
        full["wz"] = json!(6);
        full["type"] = json!("transform");
        let SceneEvent::Transform(t) = SceneEvent::decode(CONN, "transform", &full).unwrap() else {
            panic!("expected a transform");
        };
        assert_eq!(t.phase, TransformPhase::Moving);
        assert_eq!(t.world_position, Some(Point3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(SceneEvent::decode(CONN, "keydown", &Value::Null).is_err());
    }

    #[test]
    fn test_init_needs_no_payload() {
        assert_eq!(SceneEvent::decode(CONN, "init", &Value::Null).unwrap(), SceneEvent::Init);
    }
}
