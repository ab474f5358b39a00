//! A fake renderer that mirrors which objects it would currently display.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use scenesync::prelude::*;
use scenesync::protocol::{Command, Query};

/// Objects every renderer shows regardless of the scene contents
/// (grid, ground plane, ambient and directional light).
pub const EXTRAS: usize = 4;

#[derive(Default)]
struct MirrorState {
    initialized: bool,
    objects: BTreeSet<ObjectId>,
    log: Vec<Message>,
}

/// Cloning shares the state, so one clone can be handed to the controller
/// while the test inspects another.
#[derive(Clone, Default)]
pub struct Mirror(Arc<Mutex<MirrorState>>);

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer-visible object count, zero before the first snapshot.
    pub fn count(&self) -> usize {
        let state = self.0.lock().unwrap();
        if state.initialized {
            state.objects.len() + EXTRAS
        } else {
            0
        }
    }

    pub fn shows(&self, id: &ObjectId) -> bool {
        self.0.lock().unwrap().objects.contains(id)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().log.iter().map(Message::name).collect()
    }

    /// Names of the logged commands aimed at `id`, oldest first.
    pub fn commands_for(&self, id: &ObjectId) -> Vec<&'static str> {
        let state = self.0.lock().unwrap();
        state
            .log
            .iter()
            .filter_map(Message::as_command)
            .filter(|command| command.target() == Some(id))
            .map(Command::name)
            .collect()
    }

    pub fn last(&self) -> Option<Message> {
        self.0.lock().unwrap().log.last().cloned()
    }

    pub fn clear_log(&self) {
        self.0.lock().unwrap().log.clear();
    }

    /// The most recent round-trip query.
    pub fn last_query(&self) -> Option<(u64, Query)> {
        self.0.lock().unwrap().log.iter().rev().find_map(|m| match m {
            Message::Query { request_id, query } => Some((*request_id, query.clone())),
            Message::Command(_) => None,
        })
    }
}

impl RendererLink for Mirror {
    fn send(&mut self, message: &Message) -> anyhow::Result<()> {
        let mut state = self.0.lock().unwrap();
        match message.as_command() {
            Some(Command::Snapshot(snapshot)) => {
                state.initialized = true;
                state.objects = snapshot.nodes.iter().map(|n| n.id.clone()).collect();
            }
            Some(Command::Create(node)) => {
                state.objects.insert(node.id.clone());
            }
            Some(Command::Delete(id)) => {
                state.objects.remove(id);
            }
            _ => {}
        }
        state.log.push(message.clone());
        Ok(())
    }
}

/// Connect a fresh mirror and complete its handshake.
pub fn ready_mirror(scene: &mut SceneController) -> (ConnectionId, Mirror) {
    let mirror = Mirror::new();
    let id = scene.connect(mirror.clone());
    scene.handle_event(id, "init", &serde_json::Value::Null).unwrap();
    (id, mirror)
}
