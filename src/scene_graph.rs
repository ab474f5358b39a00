//! Registry of live object nodes plus the context stack.
//!
//! The graph owns every node in an id-keyed arena. Tree structure is expressed
//! through identities (`parent`, `children`), never through shared ownership,
//! so deleting a node or dropping the whole graph cannot leak through cycles.
//!
//! The context stack decides the implicit parent of newly created nodes. Its
//! bottom frame is the scene root and can never be popped.

use std::collections::HashMap;

use crate::error::SceneError;
use crate::object::{ObjectId, ObjectKind, ObjectNode};
use crate::transform::Pose;

/// A context stack frame: the scene root or a node acting as parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Root,
    Node(ObjectId),
}

impl Frame {
    fn node(&self) -> Option<&ObjectId> {
        match self {
            Frame::Root => None,
            Frame::Node(id) => Some(id),
        }
    }
}

impl From<ObjectId> for Frame {
    fn from(id: ObjectId) -> Self {
        Frame::Node(id)
    }
}

impl From<&ObjectId> for Frame {
    fn from(id: &ObjectId) -> Self {
        Frame::Node(id.clone())
    }
}

/// The scene tree.
#[derive(Debug)]
pub struct SceneGraph {
    /// All live nodes indexed by identity.
    nodes: HashMap<ObjectId, ObjectNode>,
    /// Children of the implicit scene root, in creation order.
    roots: Vec<ObjectId>,
    stack: Vec<Frame>,
    /// Next identity to hand out. Never decremented, so ids are not reused.
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            stack: vec![Frame::Root],
            next_id: 1,
        }
    }

    fn new_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_id.to_string());
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------------
    // Creation and context stack
    // ------------------------------------------------------------------------

    /// Create a node as the last child of the current top-of-stack frame.
    pub fn create(&mut self, kind: ObjectKind) -> ObjectId {
        let id = self.new_id();
        let parent = self.current_parent().cloned();

        match &parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.push(id.clone());
                }
            }
            None => self.roots.push(id.clone()),
        }

        self.nodes.insert(id.clone(), ObjectNode::new(id.clone(), kind, parent));
        id
    }

    /// The parent new nodes attach to, `None` for the scene root.
    pub fn current_parent(&self) -> Option<&ObjectId> {
        self.stack.last().and_then(Frame::node)
    }

    pub fn scope_depth(&self) -> usize {
        self.stack.len()
    }

    /// Make `frame` the parent for subsequent creations.
    pub fn push_scope(&mut self, frame: Frame) -> Result<(), SceneError> {
        if let Frame::Node(id) = &frame {
            if !self.nodes.contains_key(id) {
                return Err(SceneError::UnknownIdentity(id.clone()));
            }
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Leave the innermost scope. The root frame cannot be popped.
    pub fn pop_scope(&mut self) -> Result<Frame, SceneError> {
        if self.stack.len() <= 1 {
            return Err(SceneError::ScopeUnderflow);
        }
        self.stack.pop().ok_or(SceneError::ScopeUnderflow)
    }

    /// Drop every frame above `depth`. The root frame always survives.
    pub(crate) fn truncate_scopes(&mut self, depth: usize) {
        self.stack.truncate(depth.max(1));
    }

    pub(crate) fn scope_frames(&self) -> &[Frame] {
        &self.stack
    }

    /// Put back a previously saved stack. Frames whose node has been deleted
    /// since are skipped.
    pub(crate) fn restore_scopes(&mut self, frames: Vec<Frame>) {
        let live: Vec<Frame> = frames
            .into_iter()
            .filter(|frame| frame.node().map_or(true, |id| self.nodes.contains_key(id)))
            .collect();
        if live.first() == Some(&Frame::Root) {
            self.stack = live;
        }
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&ObjectNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ObjectNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `parent`, or of the scene root when `None`.
    pub fn children_of(&self, parent: Option<&ObjectId>) -> &[ObjectId] {
        match parent {
            None => &self.roots,
            Some(id) => self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[]),
        }
    }

    /// Ancestors of `id`, nearest first. Empty for root children.
    pub fn ancestors(&self, id: &str) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent.clone());
        while let Some(parent_id) = current {
            current = self.nodes.get(&parent_id).and_then(|n| n.parent.clone());
            chain.push(parent_id);
        }
        chain
    }

    /// True if `id` equals `ancestor` or lies below it.
    pub fn is_within(&self, id: &str, ancestor: &str) -> bool {
        id == ancestor || self.ancestors(id).iter().any(|a| a.as_str() == ancestor)
    }

    /// Every live node, parents before children, siblings in creation order.
    pub fn depth_first(&self) -> Vec<&ObjectNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut pending: Vec<&ObjectId> = self.roots.iter().rev().collect();
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                pending.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// World pose of a node, composed from the scene root down.
    pub fn world_pose(&self, id: &str) -> Option<Pose> {
        let node = self.nodes.get(id)?;
        let mut pose = node.pose;
        for ancestor in self.ancestors(id) {
            if let Some(parent) = self.nodes.get(&ancestor) {
                pose = parent.pose.compose(&pose);
            }
        }
        Some(pose)
    }

    // ------------------------------------------------------------------------
    // Structure changes
    // ------------------------------------------------------------------------

    /// Delete `id` and its whole subtree.
    ///
    /// Returns the removed identities in deletion order (children before their
    /// parent). Deleting an identity that is no longer registered is a no-op.
    pub fn delete(&mut self, id: &str) -> Result<Vec<ObjectId>, SceneError> {
        if !self.nodes.contains_key(id) {
            return Ok(Vec::new());
        }
        if let Some(active) = self
            .stack
            .iter()
            .filter_map(Frame::node)
            .find(|frame| self.is_within(frame.as_str(), id))
        {
            return Err(SceneError::ScopeActive(active.clone()));
        }

        let parent = self.nodes.get(id).and_then(|n| n.parent.clone());
        self.unlink(id, parent.as_ref());

        let mut removed = Vec::new();
        self.remove_subtree(id, &mut removed);
        Ok(removed)
    }

    /// Post-order removal with an explicit stack, so tree depth is bounded
    /// by the heap rather than the call stack.
    fn remove_subtree(&mut self, id: &str, removed: &mut Vec<ObjectId>) {
        let mut pending: Vec<(ObjectId, bool)> = vec![(ObjectId::new(id), false)];
        while let Some((current, expanded)) = pending.pop() {
            if expanded {
                if let Some(node) = self.nodes.remove(&current) {
                    removed.push(node.id);
                }
                continue;
            }
            let children = self
                .nodes
                .get(&current)
                .map(|n| n.children.clone())
                .unwrap_or_default();
            pending.push((current, true));
            pending.extend(children.into_iter().rev().map(|child| (child, false)));
        }
    }

    fn unlink(&mut self, id: &str, parent: Option<&ObjectId>) {
        let siblings = match parent {
            None => &mut self.roots,
            Some(parent_id) => match self.nodes.get_mut(parent_id) {
                Some(parent) => &mut parent.children,
                None => return,
            },
        };
        siblings.retain(|child| child.as_str() != id);
    }

    /// Move `id` under `new_parent` (`None` = scene root), keeping its world
    /// position and rotation.
    pub fn reparent(&mut self, id: &str, new_parent: Option<&ObjectId>) -> Result<(), SceneError> {
        let Some(world) = self.world_pose(id) else {
            return Err(SceneError::UnknownIdentity(ObjectId::new(id)));
        };

        let frame = match new_parent {
            None => Pose::default(),
            Some(parent_id) => {
                if self.is_within(parent_id.as_str(), id) {
                    return Err(SceneError::Cycle {
                        child: ObjectId::new(id),
                        parent: parent_id.clone(),
                    });
                }
                self.world_pose(parent_id.as_str())
                    .ok_or_else(|| SceneError::UnknownIdentity(parent_id.clone()))?
            }
        };

        let old_parent = self.nodes.get(id).and_then(|n| n.parent.clone());
        self.unlink(id, old_parent.as_ref());

        let mut local = world.relative_to(&frame);
        let node_id = match self.nodes.get_mut(id) {
            Some(node) => {
                local.scale = node.pose.scale;
                node.pose = local;
                node.parent = new_parent.cloned();
                node.id.clone()
            }
            None => return Err(SceneError::UnknownIdentity(ObjectId::new(id))),
        };

        match new_parent {
            None => self.roots.push(node_id),
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.push(node_id);
                }
            }
        }
        Ok(())
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
