//! The scene controller.
//!
//! [`SceneController`] is the single authoritative owner of one scene: the
//! node registry with its context stack, the camera cache, the renderer
//! connections and the handler lists. It is mutated through `&mut self` only,
//! which gives every scene one sequential timeline.
//!
//! ```
//! use scenesync::prelude::*;
//!
//! let mut scene = SceneController::default();
//! let table = scene.group().with_name("table").id().clone();
//! scene
//!     .scope(&table, |scene| {
//!         scene.add_box(1.0, 1.0, 0.1).move_to(0.0, 0.0, 1.0);
//!         scene.add_sphere(0.2).color("#f00").draggable(true);
//!     })
//!     .unwrap();
//!
//! assert_eq!(scene.object_count(), 3);
//! assert_eq!(scene.delete(table.as_str()).unwrap(), 3);
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use glam::DMat3;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::camera::{CameraMove, LiveCamera, SceneCamera};
use crate::config::SceneConfig;
use crate::connection::{ConnectionId, ConnectionState, Connections, RendererLink, Reply};
use crate::error::SceneError;
use crate::events::{ClickEvent, DragEvent, DragPhase, SceneEvent, TransformEvent, TransformPhase};
use crate::handlers::{DispatchReport, HandlerList};
use crate::object::{ObjectId, ObjectKind, ObjectNode, Side};
use crate::protocol::{
    AxesInset, AxesLabels, Axis, CameraTarget, ClipPlane, Command, GizmoMode, GizmoSpace, Message, Query,
    Snapshot,
};
use crate::scene_graph::{Frame, SceneGraph};
use crate::transform::{matrix_rows, rotation_matrix_from_euler, Point3};

/// Inbound envelope as sent by renderers.
#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    args: Value,
}

pub struct SceneController {
    config: SceneConfig,
    camera: SceneCamera,
    graph: SceneGraph,
    connections: Connections,
    click_handlers: HandlerList<ClickEvent>,
    drag_start_handlers: HandlerList<DragEvent>,
    drag_end_handlers: HandlerList<DragEvent>,
    transform_handlers: HandlerList<TransformEvent>,
    transform_start_handlers: HandlerList<TransformEvent>,
    transform_end_handlers: HandlerList<TransformEvent>,
}

impl Default for SceneController {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl SceneController {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            camera: SceneCamera::new(config.camera),
            config,
            graph: SceneGraph::new(),
            connections: Connections::default(),
            click_handlers: HandlerList::new("click"),
            drag_start_handlers: HandlerList::new("drag_start"),
            drag_end_handlers: HandlerList::new("drag_end"),
            transform_handlers: HandlerList::new("transform"),
            transform_start_handlers: HandlerList::new("transform_start"),
            transform_end_handlers: HandlerList::new("transform_end"),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The authoritative (cached) camera.
    pub fn camera(&self) -> &SceneCamera {
        &self.camera
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn get(&self, id: &str) -> Option<&ObjectNode> {
        self.graph.get(id)
    }

    pub fn object_count(&self) -> usize {
        self.graph.len()
    }

    /// Fluent handle to an existing node.
    pub fn node(&mut self, id: &str) -> Option<NodeMut<'_>> {
        let id = self.graph.get(id)?.id().clone();
        Some(NodeMut { scene: self, id })
    }

    /// Full state as a freshly initialized renderer receives it.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            props: self.config.clone(),
            camera: self.camera,
            nodes: self.graph.depth_first().into_iter().map(ObjectNode::data).collect(),
        }
    }

    fn broadcast(&mut self, command: Command) -> usize {
        self.connections.broadcast(&Message::Command(command))
    }

    // ========================================================================
    // Object factories
    // ========================================================================

    /// Create a node under the current scope and announce it to every Ready
    /// renderer.
    pub fn create(&mut self, kind: ObjectKind) -> NodeMut<'_> {
        let id = self.graph.create(kind);
        if let Some(node) = self.graph.get(id.as_str()) {
            let data = node.data();
            log::debug!("created {} `{}` under {:?}", data.kind, id, data.parent_id);
            self.broadcast(Command::Create(Box::new(data)));
        }
        NodeMut { scene: self, id }
    }

    pub fn group(&mut self) -> NodeMut<'_> {
        self.create(ObjectKind::Group)
    }

    pub fn add_box(&mut self, width: f64, height: f64, depth: f64) -> NodeMut<'_> {
        self.create(ObjectKind::cuboid(width, height, depth))
    }

    pub fn add_sphere(&mut self, radius: f64) -> NodeMut<'_> {
        self.create(ObjectKind::sphere(radius))
    }

    pub fn add_cylinder(&mut self, top_radius: f64, bottom_radius: f64, height: f64) -> NodeMut<'_> {
        self.create(ObjectKind::cylinder(top_radius, bottom_radius, height))
    }

    pub fn add_line(&mut self, start: impl Into<Point3>, end: impl Into<Point3>) -> NodeMut<'_> {
        self.create(ObjectKind::line(start.into(), end.into()))
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> NodeMut<'_> {
        self.create(ObjectKind::text(text))
    }

    pub fn add_point_cloud(&mut self, points: Vec<[f64; 3]>) -> NodeMut<'_> {
        self.create(ObjectKind::point_cloud(points))
    }

    pub fn add_stl(&mut self, url: impl Into<String>) -> NodeMut<'_> {
        self.create(ObjectKind::Stl {
            url: url.into(),
            wireframe: false,
        })
    }

    pub fn add_gltf(&mut self, url: impl Into<String>) -> NodeMut<'_> {
        self.create(ObjectKind::Gltf { url: url.into() })
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Make `frame` the implicit parent of subsequent creations.
    pub fn enter_scope(&mut self, frame: impl Into<Frame>) -> Result<(), SceneError> {
        self.graph.push_scope(frame.into())
    }

    pub fn exit_scope(&mut self) -> Result<Frame, SceneError> {
        self.graph.pop_scope()
    }

    /// Run `body` with `frame` as the current scope. The caller's stack is
    /// restored afterwards, whether `body` left scopes open or exited more
    /// than it entered.
    pub fn scope<R>(
        &mut self,
        frame: impl Into<Frame>,
        body: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, SceneError> {
        let depth = self.graph.scope_depth();
        let saved = self.graph.scope_frames().to_vec();
        self.graph.push_scope(frame.into())?;
        let out = body(self);
        if self.graph.scope_depth() > depth {
            self.graph.truncate_scopes(depth);
        } else {
            log::debug!("scope body exited past its own frame, restoring {} frames", depth);
            self.graph.restore_scopes(saved);
        }
        Ok(out)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete `id` with its whole subtree. Renderers get one `delete` per
    /// removed node, children first. Returns the number of removed nodes;
    /// unknown identities remove nothing.
    pub fn delete(&mut self, id: &str) -> Result<usize, SceneError> {
        let removed = self.graph.delete(id)?;
        for removed_id in &removed {
            self.broadcast(Command::Delete(removed_id.clone()));
        }
        if !removed.is_empty() {
            log::debug!("deleted `{}` ({} objects)", id, removed.len());
        }
        Ok(removed.len())
    }

    /// Delete every node matching `predicate`, together with its subtree.
    pub fn delete_objects(&mut self, mut predicate: impl FnMut(&ObjectNode) -> bool) -> Result<usize, SceneError> {
        let targets: Vec<ObjectId> = self
            .graph
            .depth_first()
            .into_iter()
            .filter(|node| predicate(*node))
            .map(|node| node.id().clone())
            .collect();

        let mut removed = 0;
        for id in targets {
            removed += self.delete(id.as_str())?;
        }
        Ok(removed)
    }

    /// Delete every object in the scene.
    pub fn clear(&mut self) -> Result<usize, SceneError> {
        let roots = self.graph.children_of(None).to_vec();
        let mut removed = 0;
        for id in roots {
            removed += self.delete(id.as_str())?;
        }
        Ok(removed)
    }

    // ========================================================================
    // Camera
    // ========================================================================

    /// Merge `update` into the camera cache and animate renderers to the
    /// resolved pose over `duration` seconds (`0` jumps).
    pub fn move_camera(&mut self, update: CameraMove, duration: f64) {
        self.camera.apply(&update);
        let target = CameraTarget {
            position: self.camera.position,
            look_at: self.camera.look_at,
            up: self.camera.up,
            duration,
        };
        self.broadcast(Command::MoveCamera(target));
    }

    /// Ask the oldest Ready renderer for its live camera. The answer is not
    /// written back into the cache.
    pub fn get_camera(&mut self) -> Result<Reply<LiveCamera>, SceneError> {
        let target = self.connections.first_ready().ok_or(SceneError::NotConnected)?;
        Ok(self.connections.query(target, Query::GetCamera))
    }

    // ========================================================================
    // Gizmo, clipping and view commands
    // ========================================================================

    pub fn enable_gizmo(
        &mut self,
        id: impl Into<ObjectId>,
        mode: GizmoMode,
        size: Option<f64>,
        visible_axes: Option<Vec<Axis>>,
    ) {
        self.broadcast(Command::EnableGizmo {
            id: id.into(),
            mode,
            size,
            visible_axes,
        });
    }

    pub fn disable_gizmo(&mut self, id: impl Into<ObjectId>) {
        self.broadcast(Command::DisableGizmo(id.into()));
    }

    pub fn set_gizmo_mode(&mut self, id: impl Into<ObjectId>, mode: GizmoMode) {
        self.broadcast(Command::SetGizmoMode(id.into(), mode));
    }

    pub fn set_gizmo_size(&mut self, id: impl Into<ObjectId>, size: f64) {
        self.broadcast(Command::SetGizmoSize(id.into(), size));
    }

    pub fn set_gizmo_space(&mut self, id: impl Into<ObjectId>, space: GizmoSpace) {
        self.broadcast(Command::SetGizmoSpace(id.into(), space));
    }

    /// Snap gizmo rotations to multiples of `radians`.
    pub fn set_gizmo_rotation_snap(&mut self, id: impl Into<ObjectId>, radians: f64) {
        self.broadcast(Command::SetGizmoSnap(id.into(), radians));
    }

    /// Ask the oldest Ready renderer whether `id` has a gizmo attached.
    pub fn has_gizmo(&mut self, id: impl Into<ObjectId>) -> Result<Reply<bool>, SceneError> {
        let target = self.connections.first_ready().ok_or(SceneError::NotConnected)?;
        Ok(self.connections.query(target, Query::HasGizmo(id.into())))
    }

    pub fn set_clipping_planes(&mut self, id: impl Into<ObjectId>, planes: Vec<ClipPlane>) {
        self.broadcast(Command::SetClippingPlanes(id.into(), planes));
    }

    pub fn clear_clipping_planes(&mut self, id: impl Into<ObjectId>) {
        self.broadcast(Command::ClearClippingPlanes(id.into()));
    }

    pub fn set_orbit_enabled(&mut self, enabled: bool) {
        self.broadcast(Command::SetOrbitEnabled(enabled));
    }

    pub fn set_axes_inset(&mut self, inset: AxesInset) {
        self.broadcast(Command::SetAxesInset(inset));
    }

    pub fn set_axes_labels(&mut self, labels: AxesLabels) {
        self.broadcast(Command::SetAxesLabels(labels));
    }

    // ========================================================================
    // Handler registration
    // ========================================================================

    pub fn on_click<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&ClickEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.click_handlers.push(Box::new(handler));
        self
    }

    pub fn on_drag_start<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&DragEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.drag_start_handlers.push(Box::new(handler));
        self
    }

    pub fn on_drag_end<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&DragEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.drag_end_handlers.push(Box::new(handler));
        self
    }

    pub fn on_transform<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&TransformEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.transform_handlers.push(Box::new(handler));
        self
    }

    pub fn on_transform_start<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&TransformEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.transform_start_handlers.push(Box::new(handler));
        self
    }

    pub fn on_transform_end<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&TransformEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.transform_end_handlers.push(Box::new(handler));
        self
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Register a renderer. It receives nothing until it sends `init`.
    pub fn connect(&mut self, link: impl RendererLink + 'static) -> ConnectionId {
        self.connections.connect(Box::new(link))
    }

    /// Forget a renderer. Queries still waiting on it fail.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Result<(), SceneError> {
        self.connections.disconnect(connection)
    }

    pub fn connection_state(&self, connection: ConnectionId) -> ConnectionState {
        self.connections.state(connection)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// True once any renderer has acknowledged initialization.
    pub fn is_initialized(&self) -> bool {
        self.connections.is_any_ready()
    }

    /// Resolves once a renderer has connected and acknowledged initialization.
    ///
    /// Waiters are registered when this is called, not when the future is
    /// first polled. Fails with [`SceneError::SceneClosed`] if the controller
    /// is dropped first.
    pub fn initialized(&mut self) -> BoxFuture<'static, Result<(), SceneError>> {
        self.connections.readiness().wait().boxed()
    }

    // ========================================================================
    // Inbound events
    // ========================================================================

    /// Handle a raw `{"event": ..., "args": ...}` message.
    pub fn handle_message(&mut self, connection: ConnectionId, text: &str) -> Result<DispatchReport, SceneError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| SceneError::decode("<envelope>", e))?;
        self.handle_event(connection, &envelope.event, &envelope.args)
    }

    /// Decode one inbound event, commit what it implies, then dispatch it.
    pub fn handle_event(
        &mut self,
        connection: ConnectionId,
        event: &str,
        args: &Value,
    ) -> Result<DispatchReport, SceneError> {
        if !self.connections.contains(connection) {
            return Err(SceneError::UnknownConnection(connection));
        }
        let event = SceneEvent::decode(connection, event, args).map_err(|e| {
            log::warn!("renderer {}: {}", connection, e);
            e
        })?;

        let mut report = DispatchReport::default();
        match event {
            SceneEvent::Init => self.initialize(connection),
            SceneEvent::Click(click) => {
                if self.config.listens_for(click.click_type.as_str()) {
                    self.click_handlers.dispatch(&click, &mut report);
                } else {
                    log::debug!("ignoring unsubscribed {} event", click.click_type.as_str());
                }
            }
            SceneEvent::Drag(drag) => match drag.phase {
                DragPhase::Start => self.drag_start_handlers.dispatch(&drag, &mut report),
                DragPhase::End => {
                    if self.commit_position(&drag.object_id, drag.position) {
                        self.broadcast(Command::Move(drag.object_id.clone(), drag.position));
                    }
                    self.drag_end_handlers.dispatch(&drag, &mut report);
                }
            },
            SceneEvent::Transform(transform) => match transform.phase {
                TransformPhase::Moving => self.transform_handlers.dispatch(&transform, &mut report),
                TransformPhase::Start => self.transform_start_handlers.dispatch(&transform, &mut report),
                TransformPhase::End => {
                    // Rotation stays with the renderer; handlers still see it.
                    self.commit_position(&transform.object_id, transform.position);
                    self.transform_end_handlers.dispatch(&transform, &mut report);
                }
            },
            SceneEvent::Response { request_id, value } => {
                self.connections.resolve(connection, request_id, value);
            }
        }
        Ok(report)
    }

    /// Answer `init` with a full snapshot. A repeated `init` (renderer reload)
    /// gets a fresh one.
    fn initialize(&mut self, connection: ConnectionId) {
        let snapshot = self.snapshot();
        let count = snapshot.nodes.len();
        let message = Message::Command(Command::Snapshot(Box::new(snapshot)));
        if self.connections.send_to(connection, &message) {
            self.connections.mark_ready(connection);
            log::info!("renderer {} initialized with {} objects", connection, count);
        }
    }

    /// Overwrite a node's stored position. Returns false when the node is gone.
    fn commit_position(&mut self, id: &ObjectId, position: Point3) -> bool {
        match self.graph.get_mut(id.as_str()) {
            Some(node) => {
                node.pose.position = position;
                true
            }
            None => {
                log::debug!("skipping commit for deleted object `{}`", id);
                false
            }
        }
    }
}

impl std::fmt::Debug for SceneController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneController")
            .field("objects", &self.graph.len())
            .field("scope_depth", &self.graph.scope_depth())
            .field("connections", &self.connections)
            .finish()
    }
}

// ============================================================================
// Fluent node handle
// ============================================================================

fn props<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Mutable handle to one live node. Every setter updates the registry and
/// tells Ready renderers.
pub struct NodeMut<'a> {
    scene: &'a mut SceneController,
    id: ObjectId,
}

impl<'a> NodeMut<'a> {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    fn update(self, changes: Map<String, Value>, apply: impl FnOnce(&mut ObjectNode)) -> Self {
        if let Some(node) = self.scene.graph.get_mut(self.id.as_str()) {
            apply(node);
        }
        self.scene.broadcast(Command::SetProperties(self.id.clone(), changes));
        self
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.update(props([("name", json!(name))]), |node| node.name = Some(name))
    }

    pub fn material(self, color: Option<&str>, opacity: f64, side: Side) -> Self {
        let color = color.map(str::to_string);
        let changes = props([
            ("color", json!(color)),
            ("opacity", json!(opacity)),
            ("side", json!(side)),
        ]);
        self.update(changes, |node| {
            node.material.color = color;
            node.material.opacity = opacity;
            node.material.side = side;
        })
    }

    pub fn color(self, color: &str) -> Self {
        self.update(props([("color", json!(color))]), |node| {
            node.material.color = Some(color.to_string())
        })
    }

    pub fn move_to(self, x: f64, y: f64, z: f64) -> Self {
        let position = Point3::new(x, y, z);
        if let Some(node) = self.scene.graph.get_mut(self.id.as_str()) {
            node.pose.position = position;
        }
        self.scene.broadcast(Command::Move(self.id.clone(), position));
        self
    }

    /// Rotate by Euler angles about X, then Y, then Z (radians).
    pub fn rotate(self, omega: f64, phi: f64, kappa: f64) -> Self {
        self.rotate_matrix(rotation_matrix_from_euler(omega, phi, kappa))
    }

    pub fn rotate_matrix(self, rotation: DMat3) -> Self {
        self.update(props([("R", json!(matrix_rows(&rotation)))]), |node| {
            node.pose.rotation = rotation
        })
    }

    pub fn scale(self, factor: f64) -> Self {
        self.scale_xyz(factor, factor, factor)
    }

    pub fn scale_xyz(self, sx: f64, sy: f64, sz: f64) -> Self {
        let changes = props([("sx", json!(sx)), ("sy", json!(sy)), ("sz", json!(sz))]);
        self.update(changes, |node| node.pose.scale = Point3::new(sx, sy, sz))
    }

    pub fn visible(self, visible: bool) -> Self {
        self.update(props([("visible", json!(visible))]), |node| node.visible = visible)
    }

    pub fn draggable(self, draggable: bool) -> Self {
        self.update(props([("draggable", json!(draggable))]), |node| {
            node.draggable = draggable
        })
    }

    /// Re-parent under `parent`, keeping world position and rotation.
    pub fn attach(self, parent: &ObjectId) -> Result<Self, SceneError> {
        self.scene.graph.reparent(self.id.as_str(), Some(parent))?;
        self.scene.broadcast(Command::Attach(self.id.clone(), parent.clone()));
        Ok(self)
    }

    /// Move to the scene root, keeping world position and rotation.
    pub fn detach(self) -> Result<Self, SceneError> {
        self.scene.graph.reparent(self.id.as_str(), None)?;
        self.scene.broadcast(Command::Detach(self.id.clone()));
        Ok(self)
    }

    pub fn delete(self) -> Result<usize, SceneError> {
        self.scene.delete(self.id.as_str())
    }
}
