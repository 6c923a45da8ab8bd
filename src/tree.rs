//! Arena-based storage for the retained scene tree.
//!
//! Nodes live in slots addressed by generational [`NodeId`]s. A child refers
//! to its parent by id only (the back-reference is non-owning), while the
//! parent keeps the ordered list of its children.
//!
//! ## Z-order
//!
//! Index 0 of a child list is the topmost (frontmost) child. Higher indices
//! sit further back, so painting walks children from the last index down to 0
//! and later-drawn children land on top.
//!
//! ## Shared buffers
//!
//! Whenever a subtree is attached or a node's double-buffering changes, the
//! tree recomputes [`NodeFlags::USES_SHARED_BUFFER`] for the affected
//! descendants: a node uses a shared buffer when some proper ancestor is
//! double-buffered.

use std::cell::Cell;

use bitflags::bitflags;
use thiserror::Error;

use crate::geometry::Rect;

bitflags! {
    /// Per-node state consulted by the compositor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u16 {
        /// Node paints every pixel of its bounds
        const OPAQUE               = 1 << 0;
        const VISIBLE              = 1 << 1;
        /// Damage below this node is redirected to start painting here
        const PAINTING_ORIGIN      = 1 << 2;
        /// Node owns an offscreen buffer when buffering is enabled
        const DOUBLE_BUFFERED      = 1 << 3;
        /// Maintained by the tree: an ancestor is double-buffered
        const USES_SHARED_BUFFER   = 1 << 4;
        /// Node is never obscured by its siblings (menus, popups)
        const ALWAYS_ON_TOP        = 1 << 5;
        /// Children may overlap, so sibling occlusion must be checked
        const OVERLAPPING_CHILDREN = 1 << 6;
        /// Displayable boundary (a window surface); upward walks stop here
        const TOP_LEVEL            = 1 << 7;
    }
}

/// How a node relates to the display surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Drawn by the compositor into its parent's surface.
    #[default]
    Lightweight,
    /// Backed by its own native surface; always covers its bounds.
    Heavyweight,
}

/// Unique identifier for a node in a [`SceneTree`].
///
/// `index` addresses a slot, `generation` is bumped every time the slot is
/// reused so a stale id never resolves to a newer node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Combine generation (high bits) and index (low bits) for external use.
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

/// Structural mistakes made through the tree mutation API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0:?} is not in the tree")]
    StaleNode(NodeId),
    #[error("node {0:?} cannot be attached to itself")]
    SelfAttach(NodeId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {child:?} is already attached to {parent:?}")]
    AlreadyAttached { parent: NodeId, child: NodeId },
    #[error("child index {index} out of range for a node with {len} children")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// A rectangular node of the retained tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    id: Option<NodeId>,
    bounds: Rect,
    flags: NodeFlags,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Set only while a paint pass runs through this node
    active_child: Cell<Option<NodeId>>,
}

impl SceneNode {
    /// A visible, transparent, lightweight node with the given bounds
    /// (relative to its future parent).
    pub fn new(bounds: Rect) -> Self {
        Self {
            id: None,
            bounds,
            flags: NodeFlags::VISIBLE,
            kind: NodeKind::Lightweight,
            parent: None,
            children: Vec::new(),
            active_child: Cell::new(None),
        }
    }

    fn with_flag(mut self, flag: NodeFlags, value: bool) -> Self {
        self.flags.set(flag, value);
        self
    }

    pub fn opaque(self, opaque: bool) -> Self {
        self.with_flag(NodeFlags::OPAQUE, opaque)
    }

    pub fn visible(self, visible: bool) -> Self {
        self.with_flag(NodeFlags::VISIBLE, visible)
    }

    pub fn painting_origin(self, origin: bool) -> Self {
        self.with_flag(NodeFlags::PAINTING_ORIGIN, origin)
    }

    pub fn double_buffered(self, buffered: bool) -> Self {
        self.with_flag(NodeFlags::DOUBLE_BUFFERED, buffered)
    }

    pub fn always_on_top(self, on_top: bool) -> Self {
        self.with_flag(NodeFlags::ALWAYS_ON_TOP, on_top)
    }

    pub fn overlapping_children(self, overlapping: bool) -> Self {
        self.with_flag(NodeFlags::OVERLAPPING_CHILDREN, overlapping)
    }

    pub fn top_level(self, top_level: bool) -> Self {
        self.with_flag(NodeFlags::TOP_LEVEL, top_level)
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Id assigned on insertion. `None` until the node is in a tree.
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    /// Bounds in the parent's coordinate space.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Bounds moved to this node's own origin.
    pub fn local_bounds(&self) -> Rect {
        self.bounds.local()
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn node_kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node hides whatever lies beneath its bounds.
    ///
    /// Heavyweight nodes always do; lightweight nodes only when marked opaque.
    pub fn is_opaque(&self) -> bool {
        match self.kind {
            NodeKind::Heavyweight => true,
            NodeKind::Lightweight => self.flags.contains(NodeFlags::OPAQUE),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    pub fn is_painting_origin(&self) -> bool {
        self.flags.contains(NodeFlags::PAINTING_ORIGIN)
    }

    pub fn is_double_buffered(&self) -> bool {
        self.flags.contains(NodeFlags::DOUBLE_BUFFERED)
    }

    pub fn uses_shared_buffer(&self) -> bool {
        self.flags.contains(NodeFlags::USES_SHARED_BUFFER)
    }

    pub fn is_always_on_top(&self) -> bool {
        self.flags.contains(NodeFlags::ALWAYS_ON_TOP)
    }

    pub fn has_overlapping_children(&self) -> bool {
        self.flags.contains(NodeFlags::OVERLAPPING_CHILDREN)
    }

    pub fn is_top_level(&self) -> bool {
        self.flags.contains(NodeFlags::TOP_LEVEL)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in z-order, index 0 topmost.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The child a paint pass is currently drawing through this node.
    pub fn active_child(&self) -> Option<NodeId> {
        self.active_child.get()
    }

    pub(crate) fn set_active_child(&self, child: Option<NodeId>) {
        self.active_child.set(child);
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Owner of every [`SceneNode`].
#[derive(Default)]
pub struct SceneTree {
    slots: Vec<Slot>,
    free_indices: Vec<u32>,
    len: usize,
}

impl std::fmt::Debug for SceneTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTree")
            .field("len", &self.len)
            .field("free", &self.free_indices.len())
            .finish()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a detached node and return its id.
    pub fn insert(&mut self, mut node: SceneNode) -> NodeId {
        // Attachment happens through attach(); a node built elsewhere
        // arrives without links.
        node.parent = None;
        node.children.clear();
        node.active_child.set(None);
        node.flags.remove(NodeFlags::USES_SHARED_BUFFER);

        let id = if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: None,
            });
            NodeId::new(index, 0)
        };

        node.id = Some(id);
        self.slots[id.index as usize].node = Some(node);
        self.len += 1;
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn try_get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.get_mut(id).ok_or(TreeError::StaleNode(id))
    }

    /// Resolve an id reached by following tree links.
    ///
    /// A dangling link means the tree itself is corrupt, which is a bug in
    /// the code that mutated it rather than a condition to recover from.
    pub(crate) fn node(&self, id: NodeId) -> &SceneNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("scene tree inconsistency: link to missing node {id:?}"),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.slots.iter().filter_map(|slot| slot.node.as_ref())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(SceneNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(SceneNode::children).unwrap_or(&[])
    }

    /// Position of `child` in `parent`'s child list.
    ///
    /// Panics when `parent` does not list `child`, which means the tree's
    /// links disagree with each other.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> usize {
        match self.node(parent).children.iter().position(|&c| c == child) {
            Some(index) => index,
            None => panic!(
                "scene tree inconsistency: {child:?} claims parent {parent:?} which does not list it"
            ),
        }
    }

    /// Upper bound on the length of any acyclic upward walk.
    pub(crate) fn walk_limit(&self) -> usize {
        self.len
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            assert!(steps <= self.walk_limit(), "scene tree contains a cycle");
            current = self.get(id).and_then(SceneNode::parent);
        }
        false
    }

    /// Append `child` at the back of `parent`'s z-order.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.get(parent).ok_or(TreeError::StaleNode(parent))?.children.len();
        self.attach_at(parent, child, len)
    }

    /// Insert `child` at `index` of `parent`'s child list (0 = topmost).
    pub fn attach_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<()> {
        if parent == child {
            return Err(TreeError::SelfAttach(child));
        }
        let child_node = self.get(child).ok_or(TreeError::StaleNode(child))?;
        if let Some(existing) = child_node.parent {
            return Err(TreeError::AlreadyAttached {
                parent: existing,
                child,
            });
        }
        let len = self.get(parent).ok_or(TreeError::StaleNode(parent))?.children.len();
        if index > len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }

        self.try_get_mut(parent)?.children.insert(index, child);
        self.try_get_mut(child)?.parent = Some(parent);
        self.refresh_shared_buffer(child);
        log::trace!("attached {:?} under {:?} at {}", child, parent, index);
        Ok(())
    }

    /// Unlink `child` from its parent. Detaching a root is a no-op.
    pub fn detach(&mut self, child: NodeId) -> Result<()> {
        let parent = match self.get(child).ok_or(TreeError::StaleNode(child))?.parent {
            Some(parent) => parent,
            None => return Ok(()),
        };

        let index = self.child_index(parent, child);
        let parent_node = self.try_get_mut(parent)?;
        parent_node.children.remove(index);
        if parent_node.active_child.get() == Some(child) {
            parent_node.active_child.set(None);
        }

        self.try_get_mut(child)?.parent = None;
        self.refresh_shared_buffer(child);
        log::trace!("detached {:?} from {:?}", child, parent);
        Ok(())
    }

    /// Detach `id` and drop it together with its whole subtree.
    ///
    /// Returns the removed ids, `id` first.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.detach(id)?;

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children.iter().rev());
                removed.push(current);
                self.free_indices.push(current.index);
                self.len -= 1;
            }
        }
        Ok(removed)
    }

    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) -> Result<()> {
        self.try_get_mut(id)?.bounds = bounds;
        Ok(())
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        self.try_get_mut(id)?.kind = kind;
        Ok(())
    }

    /// Set or clear user-controlled flags.
    ///
    /// [`NodeFlags::USES_SHARED_BUFFER`] is derived from the tree shape and
    /// is ignored here.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags, value: bool) -> Result<()> {
        let flags = flags - NodeFlags::USES_SHARED_BUFFER;
        let node = self.try_get_mut(id)?;
        let before = node.flags;
        node.flags.set(flags, value);
        let buffering_changed = (before ^ node.flags).contains(NodeFlags::DOUBLE_BUFFERED);

        if buffering_changed {
            let children = node.children.clone();
            for child in children {
                self.refresh_shared_buffer(child);
            }
        }
        Ok(())
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<()> {
        self.set_flags(id, NodeFlags::VISIBLE, visible)
    }

    pub fn set_opaque(&mut self, id: NodeId, opaque: bool) -> Result<()> {
        self.set_flags(id, NodeFlags::OPAQUE, opaque)
    }

    pub fn set_double_buffered(&mut self, id: NodeId, buffered: bool) -> Result<()> {
        self.set_flags(id, NodeFlags::DOUBLE_BUFFERED, buffered)
    }

    /// Recompute USES_SHARED_BUFFER for `root` and everything below it.
    fn refresh_shared_buffer(&mut self, root: NodeId) {
        let inherited = match self.parent(root) {
            Some(parent) => {
                let parent = self.node(parent);
                parent.is_double_buffered() || parent.uses_shared_buffer()
            }
            None => false,
        };

        let mut stack = vec![(root, inherited)];
        while let Some((id, shared)) = stack.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            node.flags.set(NodeFlags::USES_SHARED_BUFFER, shared);
            let below = shared || node.is_double_buffered();
            stack.extend(node.children.iter().map(|&c| (c, below)));
        }
    }

    /// Whether `id` can currently appear on screen: it and every ancestor are
    /// visible and the chain ends at a top-level node.
    pub fn is_showing(&self, id: NodeId) -> bool {
        let mut current = id;
        let mut steps = 0;
        loop {
            let Some(node) = self.get(current) else {
                return false;
            };
            if !node.is_visible() {
                return false;
            }
            if node.is_top_level() {
                return true;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return false,
            }
            steps += 1;
            assert!(steps <= self.walk_limit(), "scene tree contains a cycle");
        }
    }

    /// Drop `child` from `parent`'s list while leaving its parent link.
    #[cfg(test)]
    pub(crate) fn corrupt_unlist_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|&c| c != child);
        }
    }
}
