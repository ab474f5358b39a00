//! Error taxonomy for the scene controller.
//!
//! No error in this crate is fatal to the process: at worst a single inbound
//! event is rejected, a single handler invocation fails, or a single
//! connection is dropped.

use thiserror::Error;

use crate::connection::ConnectionId;
use crate::object::ObjectId;

#[derive(Debug, Error)]
pub enum SceneError {
    /// Malformed or incomplete inbound payload. Only that event is rejected.
    #[error("malformed `{event}` event: {message}")]
    ProtocolDecode { event: String, message: String },

    /// An operation referenced an object that is not in the registry.
    #[error("unknown object `{0}`")]
    UnknownIdentity(ObjectId),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// A round-trip query needs a renderer, but no connection is ready.
    #[error("no renderer connection is ready")]
    NotConnected,

    /// The connection carrying a query went away before answering.
    #[error("round-trip query `{query}` received no response")]
    RoundTripTimeout { query: &'static str },

    /// The controller was dropped while something was still waiting on it.
    #[error("scene controller was dropped")]
    SceneClosed,

    #[error("scope stack is already at the scene root")]
    ScopeUnderflow,

    /// Deleting this object would orphan an active scope frame.
    #[error("cannot delete `{0}` while it is an active scope")]
    ScopeActive(ObjectId),

    #[error("attaching `{child}` to `{parent}` would create a cycle")]
    Cycle { child: ObjectId, parent: ObjectId },
}

impl SceneError {
    pub(crate) fn decode(event: impl Into<String>, message: impl ToString) -> Self {
        SceneError::ProtocolDecode {
            event: event.into(),
            message: message.to_string(),
        }
    }
}
