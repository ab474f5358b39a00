pub mod transform;
pub mod camera;
pub mod object;
pub mod scene_graph;
pub mod error;

// Renderer protocol and connections
pub mod protocol;
pub mod events;
pub mod handlers;
pub mod connection;

pub mod scene;
pub mod config;
pub mod definition;

pub mod cli;

/// Commonly used types.
pub mod prelude {
    pub use crate::camera::{CameraMove, LiveCamera, Projection, SceneCamera, DEFAULT_MOVE_DURATION};
    pub use crate::config::SceneConfig;
    pub use crate::connection::{ChannelLink, ConnectionId, ConnectionState, RendererLink};
    pub use crate::error::SceneError;
    pub use crate::events::{ClickEvent, DragEvent, TransformEvent};
    pub use crate::object::{ObjectId, ObjectKind, Side};
    pub use crate::protocol::{Axis, ClipPlane, GizmoMode, GizmoSpace, Message};
    pub use crate::scene::{NodeMut, SceneController};
    pub use crate::scene_graph::Frame;
    pub use crate::transform::Point3;
}
