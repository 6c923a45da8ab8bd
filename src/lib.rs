pub mod clip;
pub mod damage;
pub mod geometry;
pub mod occlusion;
pub mod origin;
pub mod paint;
pub mod paint_stats;
pub mod tree;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use damage::{DamageQueue, DamageRequest};
use geometry::Rect;
use paint::{BufferManager, ImmediatePaintScheduler, NoBuffering, PaintOutcome, Painter, SkipReason};
use tree::{NodeId, SceneTree};

pub mod prelude {
    pub use crate::damage::{DamageQueue, DamageRequest};
    pub use crate::geometry::{Point, Rect};
    pub use crate::paint::{
        BufferManager, BufferedPass, NoBuffering, PaintOutcome, PaintPlan, PaintScope, Painter,
        SkipReason,
    };
    pub use crate::tree::{NodeFlags, NodeId, NodeKind, SceneNode, SceneTree, TreeError};
    pub use crate::{Compositor, CompositorConfig};
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    /// Route paints of double-buffered nodes through the buffer manager
    pub double_buffering: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            double_buffering: true,
        }
    }
}

impl CompositorConfig {
    pub fn double_buffering(mut self, enabled: bool) -> Self {
        self.double_buffering = enabled;
        self
    }
}

/// Owns a scene tree and turns damage on it into paint passes.
///
/// Mutations that change what is on screen go through the compositor so the
/// affected area is queued as damage; [`flush`](Self::flush) paints it.
/// Other threads may push damage through [`damage_queue`](Self::damage_queue).
pub struct Compositor<B: BufferManager = NoBuffering> {
    config: CompositorConfig,
    tree: SceneTree,
    damage: Arc<DamageQueue>,
    buffers: B,
}

impl Compositor<NoBuffering> {
    pub fn new() -> Self {
        Self::with_config(CompositorConfig::default(), NoBuffering)
    }
}

impl Default for Compositor<NoBuffering> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BufferManager> Compositor<B> {
    pub fn with_buffers(buffers: B) -> Self {
        Self::with_config(CompositorConfig::default(), buffers)
    }

    pub fn with_config(config: CompositorConfig, buffers: B) -> Self {
        Self {
            config,
            tree: SceneTree::new(),
            damage: Arc::new(DamageQueue::new()),
            buffers,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Direct access to the tree. Changes made here queue no damage.
    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn buffers(&self) -> &B {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut B {
        &mut self.buffers
    }

    /// Handle for queueing damage from other threads.
    pub fn damage_queue(&self) -> Arc<DamageQueue> {
        self.damage.clone()
    }

    /// Queue `rect` (local to `node`) for repainting.
    ///
    /// The rectangle is clipped to what `node`'s ancestors let through;
    /// nothing is queued when that leaves no area.
    pub fn invalidate(&self, node: NodeId, rect: Rect) {
        if !self.tree.contains(node) {
            log::debug!("ignoring damage on removed node {:?}", node);
            return;
        }
        let clipped = clip::clip_damage(&self.tree, node, rect);
        if clipped.is_empty() {
            log::trace!("damage {:?} on {:?} clipped away", rect, node);
            return;
        }
        self.damage.push(DamageRequest::new(node, clipped));
    }

    /// Queue all of `node` for repainting.
    pub fn repaint(&self, node: NodeId) {
        if let Some(n) = self.tree.get(node) {
            self.invalidate(node, n.local_bounds());
        }
    }

    /// Damage `rect` of `node` as seen from its parent, or `node` itself when
    /// it is a root.
    fn invalidate_in_parent(&self, node: NodeId, rect: Rect) {
        match self.tree.parent(node) {
            Some(parent) => self.invalidate(parent, rect),
            None => self.invalidate(node, rect.local()),
        }
    }

    /// Attach `child` under `parent` and queue it for painting.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> tree::Result<()> {
        self.tree.attach(parent, child)?;
        self.repaint(child);
        Ok(())
    }

    /// Move or resize `node`, damaging both the area it left and the area it
    /// now covers.
    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) -> tree::Result<()> {
        let old = self.tree.get(node).ok_or(tree::TreeError::StaleNode(node))?.bounds();
        if old == bounds {
            return Ok(());
        }
        self.tree.set_bounds(node, bounds)?;
        self.invalidate_in_parent(node, old.union(&bounds));
        Ok(())
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) -> tree::Result<()> {
        let n = self.tree.get(node).ok_or(tree::TreeError::StaleNode(node))?;
        if n.is_visible() == visible {
            return Ok(());
        }
        let bounds = n.bounds();
        self.tree.set_visible(node, visible)?;
        self.invalidate_in_parent(node, bounds);
        Ok(())
    }

    pub fn set_opaque(&mut self, node: NodeId, opaque: bool) -> tree::Result<()> {
        self.tree.set_opaque(node, opaque)?;
        self.repaint(node);
        Ok(())
    }

    /// Remove `node` and its subtree.
    ///
    /// The area it covered is damaged in the parent, buffers kept for
    /// removed double-buffered nodes are released and their queued damage
    /// is dropped.
    pub fn remove(&mut self, node: NodeId) -> tree::Result<Vec<NodeId>> {
        let bounds = self.tree.get(node).ok_or(tree::TreeError::StaleNode(node))?.bounds();
        let parent = self.tree.parent(node);

        let mut buffered = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.tree.get(id) {
                if n.is_double_buffered() {
                    buffered.push(id);
                }
                stack.extend_from_slice(n.children());
            }
        }

        let removed = self.tree.remove(node)?;
        for owner in buffered {
            log::debug!("releasing buffer of removed node {:?}", owner);
            self.buffers.release_buffer(owner);
        }
        self.damage.cancel(&removed);
        if let Some(parent) = parent {
            self.invalidate(parent, bounds);
        }
        Ok(removed)
    }

    /// Paint damage on `node` right away, bypassing the queue.
    pub fn paint_immediately(&mut self, painter: &mut dyn Painter, node: NodeId, rect: Rect) -> PaintOutcome {
        if !self.tree.contains(node) {
            return PaintOutcome::Skipped(SkipReason::NotShowing);
        }
        ImmediatePaintScheduler::new(&self.tree, self.config.double_buffering).paint_immediately(
            painter,
            &mut self.buffers,
            DamageRequest::new(node, rect),
        )
    }

    /// Paint `node` and everything below it inside `clip` (node-local).
    pub fn paint_subtree(&mut self, painter: &mut dyn Painter, node: NodeId, clip: Rect) {
        if !self.tree.contains(node) {
            return;
        }
        paint::paint_subtree(
            &self.tree,
            painter,
            &mut self.buffers,
            self.config.double_buffering,
            node,
            clip,
        );
    }

    /// Paint all queued damage in arrival order. Returns how many requests
    /// drew something.
    pub fn flush(&mut self, painter: &mut dyn Painter) -> usize {
        let pending = self.damage.drain();
        if pending.is_empty() {
            return 0;
        }

        let mut painted = 0;
        for request in &pending {
            if self.paint_immediately(painter, request.origin, request.rect).is_painted() {
                painted += 1;
            }
        }
        log::debug!("flushed {} damage requests, {} painted", pending.len(), painted);
        paint_stats::end_flush();
        painted
    }
}
