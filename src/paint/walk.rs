//! State accumulated by the upward walk of an immediate paint.
//!
//! Each level of the walk is a transition on [`WalkState`]: visit the node,
//! optionally restart the painting root there, then fold its bounds into the
//! damage rectangle.

use crate::geometry::{Point, Rect};
use crate::tree::{NodeId, SceneNode};

use super::PaintPlan;

pub(crate) struct WalkState {
    origin: NodeId,
    path: Vec<NodeId>,
    root_index: usize,
    /// Damage in the space of the last visited node's parent
    rect: Rect,
    /// Whether ancestors clip the damage (false for always-on-top nodes)
    clip_to_ancestors: bool,
    /// Origin-local to current space
    total_offset: Point,
    /// Painting-root-local to current space
    root_offset: Point,
    reached_top_level: bool,
}

impl WalkState {
    pub(crate) fn new(origin: NodeId, rect: Rect, clip_to_ancestors: bool) -> Self {
        Self {
            origin,
            path: Vec::with_capacity(8),
            root_index: 0,
            rect,
            clip_to_ancestors,
            total_offset: Point::ZERO,
            root_offset: Point::ZERO,
            reached_top_level: false,
        }
    }

    pub(crate) fn visit(&mut self, id: NodeId) {
        self.path.push(id);
    }

    pub(crate) fn rect(&self) -> Rect {
        self.rect
    }

    pub(crate) fn painting_root(&self) -> NodeId {
        self.path[self.root_index]
    }

    pub(crate) fn depth(&self) -> usize {
        self.path.len()
    }

    /// Paint from the most recently visited node instead.
    pub(crate) fn restart_at_current(&mut self) {
        self.root_index = self.path.len() - 1;
        self.root_offset = Point::ZERO;
    }

    /// Clip the damage to `node`'s area and move it into the parent's space.
    ///
    /// A top-level node clips but does not translate: its space is the
    /// surface the plan is expressed in.
    pub(crate) fn accumulate(&mut self, node: &SceneNode) {
        let bounds = node.bounds();
        if self.clip_to_ancestors {
            self.rect = self.rect.intersect(&bounds.local());
        }
        if node.is_top_level() {
            self.reached_top_level = true;
            return;
        }
        self.rect = self.rect.offset(bounds.x, bounds.y);
        self.total_offset = self.total_offset.offset(bounds.x, bounds.y);
        self.root_offset = self.root_offset.offset(bounds.x, bounds.y);
    }

    pub(crate) fn reached_top_level(&self) -> bool {
        self.reached_top_level
    }

    /// Finish the walk. `None` when nothing is left to paint.
    ///
    /// `buffer_owner` is resolved by the caller against the final painting
    /// root.
    pub(crate) fn into_plan(self, buffer_owner: Option<NodeId>) -> Option<PaintPlan> {
        if !self.reached_top_level || self.rect.is_empty() {
            return None;
        }
        let surface_clip = self.rect;
        Some(PaintPlan {
            origin: self.origin,
            painting_root: self.painting_root(),
            buffer_owner,
            clip: surface_clip.offset(-self.root_offset.x, -self.root_offset.y),
            offset: Point::new(
                self.total_offset.x - self.root_offset.x,
                self.total_offset.y - self.root_offset.y,
            ),
            surface_clip,
            root_index: self.root_index,
            path: self.path,
        })
    }
}
