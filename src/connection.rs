//! Renderer connections.
//!
//! Each connection moves through `Disconnected → AwaitingInit → Ready`. Only
//! Ready connections receive incremental commands; a connection still awaiting
//! its `init` acknowledgment catches up through the snapshot it gets then.
//!
//! Round-trip queries register a oneshot sender keyed by request id on the
//! connection that carries them. The returned [`Reply`] borrows nothing, so
//! the caller can keep feeding events (including the response) while it waits.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::anyhow;
use futures::channel::{mpsc, oneshot};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::SceneError;
use crate::protocol::{Message, Query};

// ============================================================================
// Identity and state
// ============================================================================

/// Identity of one renderer connection. Allocated in connection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingInit,
    Ready,
}

// ============================================================================
// Links
// ============================================================================

/// Outbound half of a transport to one renderer.
///
/// Links are expected to deliver messages in FIFO order. A send error drops
/// the connection.
pub trait RendererLink: Send {
    fn send(&mut self, message: &Message) -> anyhow::Result<()>;
}

/// Link backed by an unbounded futures channel. The receiving half is handed
/// to whatever drives the actual transport.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelLink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx)
    }
}

impl RendererLink for ChannelLink {
    fn send(&mut self, message: &Message) -> anyhow::Result<()> {
        self.tx
            .unbounded_send(message.clone())
            .map_err(|_| anyhow!("renderer channel closed"))
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Pending answer to a round-trip query.
///
/// Resolves to the decoded response value, to
/// [`SceneError::RoundTripTimeout`] if the connection goes away first, or to
/// [`SceneError::ProtocolDecode`] if the response has the wrong shape.
#[must_use = "a reply does nothing unless awaited"]
pub struct Reply<T> {
    query: &'static str,
    rx: oneshot::Receiver<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply").field("query", &self.query).finish()
    }
}

impl<T: DeserializeOwned> Future for Reply<T> {
    type Output = Result<T, SceneError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let query = self.query;
        match self.rx.poll_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(value)) => {
                Poll::Ready(serde_json::from_value(value).map_err(|e| SceneError::decode(query, e)))
            }
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(SceneError::RoundTripTimeout { query })),
        }
    }
}

/// Waiters registered by `initialized()`. Both halves are registered at call
/// time, so an acknowledgment that arrives before the first poll still counts.
#[derive(Debug)]
pub(crate) struct Readiness {
    connected: Option<oneshot::Receiver<()>>,
    acknowledged: Option<oneshot::Receiver<()>>,
}

impl Readiness {
    pub(crate) async fn wait(self) -> Result<(), SceneError> {
        if let Some(connected) = self.connected {
            connected.await.map_err(|_| SceneError::SceneClosed)?;
        }
        if let Some(acknowledged) = self.acknowledged {
            acknowledged.await.map_err(|_| SceneError::SceneClosed)?;
        }
        Ok(())
    }
}

// ============================================================================
// Connection table
// ============================================================================

struct PendingQuery {
    query: &'static str,
    reply: oneshot::Sender<Value>,
}

struct Connection {
    link: Box<dyn RendererLink>,
    state: ConnectionState,
    pending: HashMap<u64, PendingQuery>,
}

/// Every live connection of one scene controller, oldest first.
#[derive(Default)]
pub(crate) struct Connections {
    table: BTreeMap<ConnectionId, Connection>,
    next_connection: u64,
    next_request: u64,
    connect_waiters: Vec<oneshot::Sender<()>>,
    init_waiters: Vec<oneshot::Sender<()>>,
}

impl Connections {
    pub(crate) fn connect(&mut self, link: Box<dyn RendererLink>) -> ConnectionId {
        self.next_connection += 1;
        let id = ConnectionId(self.next_connection);
        self.table.insert(
            id,
            Connection {
                link,
                state: ConnectionState::AwaitingInit,
                pending: HashMap::new(),
            },
        );
        log::info!("renderer {} connected, awaiting init", id);

        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(());
        }
        id
    }

    /// Remove a connection. Its pending queries fail with `RoundTripTimeout`.
    pub(crate) fn disconnect(&mut self, id: ConnectionId) -> Result<(), SceneError> {
        let connection = self.table.remove(&id).ok_or(SceneError::UnknownConnection(id))?;
        log::info!(
            "renderer {} disconnected ({} pending queries dropped)",
            id,
            connection.pending.len()
        );
        Ok(())
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.table.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn state(&self, id: ConnectionId) -> ConnectionState {
        self.table
            .get(&id)
            .map(|c| c.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub(crate) fn is_any_ready(&self) -> bool {
        self.table.values().any(|c| c.state == ConnectionState::Ready)
    }

    /// Oldest Ready connection.
    pub(crate) fn first_ready(&self) -> Option<ConnectionId> {
        self.table
            .iter()
            .find(|(_, c)| c.state == ConnectionState::Ready)
            .map(|(id, _)| *id)
    }

    pub(crate) fn mark_ready(&mut self, id: ConnectionId) {
        if let Some(connection) = self.table.get_mut(&id) {
            connection.state = ConnectionState::Ready;
            for waiter in self.init_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    #[cfg(test)]
    fn pending_waiters(&self) -> usize {
        self.connect_waiters.len() + self.init_waiters.len()
    }

    pub(crate) fn readiness(&mut self) -> Readiness {
        if self.is_any_ready() {
            return Readiness {
                connected: None,
                acknowledged: None,
            };
        }

        // Waiters whose future was dropped would otherwise pile up.
        self.connect_waiters.retain(|tx| !tx.is_canceled());
        self.init_waiters.retain(|tx| !tx.is_canceled());

        let connected = if self.table.is_empty() {
            let (tx, rx) = oneshot::channel();
            self.connect_waiters.push(tx);
            Some(rx)
        } else {
            None
        };
        let (tx, rx) = oneshot::channel();
        self.init_waiters.push(tx);

        Readiness {
            connected,
            acknowledged: Some(rx),
        }
    }

    /// Send to a single connection regardless of its state. Returns whether
    /// the message was delivered.
    pub(crate) fn send_to(&mut self, id: ConnectionId, message: &Message) -> bool {
        let Some(connection) = self.table.get_mut(&id) else {
            return false;
        };
        match connection.link.send(message) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("dropping renderer {} after failed `{}`: {:#}", id, message.name(), e);
                self.table.remove(&id);
                false
            }
        }
    }

    /// Send to every Ready connection. Returns the number of deliveries.
    pub(crate) fn broadcast(&mut self, message: &Message) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, connection) in self.table.iter_mut() {
            if connection.state != ConnectionState::Ready {
                continue;
            }
            match connection.link.send(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::warn!("dropping renderer {} after failed `{}`: {:#}", id, message.name(), e);
                    failed.push(*id);
                }
            }
        }
        for id in failed {
            self.table.remove(&id);
        }
        delivered
    }

    /// Issue a round-trip query on `id`.
    pub(crate) fn query<T: DeserializeOwned>(&mut self, id: ConnectionId, query: Query) -> Reply<T> {
        self.next_request += 1;
        let request_id = self.next_request;
        let name = query.name();
        let (tx, rx) = oneshot::channel();

        if let Some(connection) = self.table.get_mut(&id) {
            connection.pending.insert(request_id, PendingQuery { query: name, reply: tx });
        }
        // On failure the connection and its pending sender are dropped, which
        // fails the reply.
        self.send_to(id, &Message::Query { request_id, query });

        Reply {
            query: name,
            rx,
            _marker: PhantomData,
        }
    }

    /// Deliver a `response` event to the query it answers.
    pub(crate) fn resolve(&mut self, id: ConnectionId, request_id: u64, value: Value) {
        let pending = self
            .table
            .get_mut(&id)
            .and_then(|c| c.pending.remove(&request_id));
        match pending {
            Some(pending) => {
                if pending.reply.send(value).is_err() {
                    log::debug!("reply to `{}` (request {}) was no longer awaited", pending.query, request_id);
                }
            }
            None => log::warn!("renderer {} answered unknown request {}", id, request_id),
        }
    }
}

impl fmt::Debug for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.iter().map(|(id, c)| (id, c.state)))
            .finish()
    }
}
