//! Immediate painting of a damaged rectangle.
//!
//! A damage request names a node and a rectangle in its space. Before
//! anything is drawn the scheduler works out where painting has to start:
//!
//! 1. Redirect to the nearest painting origin, if any.
//! 2. Drop requests on hidden nodes and empty rectangles.
//! 3. Climb past transparent nodes to the first opaque one.
//! 4. Walk up to the top-level node. At each container whose children may
//!    overlap, classify the damage against the siblings stacked above:
//!    completely hidden ends the request, partially hidden moves the
//!    painting root up to that container. The damage is clipped and
//!    translated level by level.
//! 5. Mark the path from the painting root down so containers can skip
//!    children hidden behind the damaged one, draw (through a buffer when a
//!    double-buffered owner was found), and unmark.

use crate::damage::DamageRequest;
use crate::geometry::{Point, Rect};
use crate::occlusion::{classify, ObscuredState};
use crate::origin::{closest_buffered_ancestor, find_painting_origin, resolve_paint_start};
use crate::paint_stats;
use crate::tree::{NodeId, SceneTree};

use super::subtree::SubtreePainter;
use super::walk::WalkState;
use super::{
    BufferManager, BufferedPass, BufferedPassGuard, PaintOutcome, PaintPlan, Painter, SkipReason,
};

/// Turns damage requests into paint passes over one tree.
#[derive(Debug, Clone, Copy)]
pub struct ImmediatePaintScheduler<'a> {
    tree: &'a SceneTree,
    double_buffering: bool,
}

impl<'a> ImmediatePaintScheduler<'a> {
    pub fn new(tree: &'a SceneTree, double_buffering: bool) -> Self {
        Self {
            tree,
            double_buffering,
        }
    }

    /// Resolve and draw one damage request.
    pub fn paint_immediately(
        &self,
        painter: &mut dyn Painter,
        buffers: &mut dyn BufferManager,
        request: DamageRequest,
    ) -> PaintOutcome {
        match self.plan(request) {
            Ok(plan) => {
                log::debug!(
                    "painting {:?} from {:?} clip={:?} buffer={:?}",
                    request.origin,
                    plan.painting_root,
                    plan.clip,
                    plan.buffer_owner
                );
                self.draw(painter, buffers, &plan);
                PaintOutcome::Painted(plan)
            }
            Err(reason) => {
                log::debug!(
                    "skipped damage {:?} on {:?}: {:?}",
                    request.rect,
                    request.origin,
                    reason
                );
                paint_stats::record_skipped(reason);
                PaintOutcome::Skipped(reason)
            }
        }
    }

    /// Work out what `request` would paint, without drawing.
    pub fn plan(&self, request: DamageRequest) -> Result<PaintPlan, SkipReason> {
        let DamageRequest { origin, rect } = request;

        if let Some((redirect, translated)) = find_painting_origin(self.tree, origin, rect) {
            if redirect != origin {
                log::trace!("damage on {:?} redirected to painting origin {:?}", origin, redirect);
                return self.plan(DamageRequest::new(redirect, translated));
            }
        }

        if !self.tree.is_showing(origin) {
            return Err(SkipReason::NotShowing);
        }
        if rect.is_empty() {
            return Err(SkipReason::EmptyDamage);
        }

        let (start, rect) = resolve_paint_start(self.tree, origin, rect);
        self.walk(start, rect)
    }

    fn walk(&self, start: NodeId, rect: Rect) -> Result<PaintPlan, SkipReason> {
        let tree = self.tree;
        let start_node = tree.node(start);

        // Always-on-top nodes are never covered by siblings and are not
        // clipped by their ancestors.
        let on_top = start_node.is_always_on_top() && start_node.is_opaque();
        let mut rect = rect;
        if on_top {
            rect = rect.intersect(&start_node.local_bounds());
            if rect.is_empty() {
                return Err(SkipReason::ClippedAway);
            }
        }

        let mut walk = WalkState::new(start, rect, !on_top);
        let mut current = Some(start);
        let mut below: Option<NodeId> = None;

        while let Some(id) = current {
            let node = tree.node(id);
            walk.visit(id);

            if let Some(child) = below {
                let index = tree.child_index(id, child);
                if !on_top && node.has_overlapping_children() {
                    let restart = node.is_painting_origin()
                        || match classify(tree, id, index, &walk.rect()) {
                            ObscuredState::NotObscured => false,
                            ObscuredState::PartiallyObscured => true,
                            ObscuredState::CompletelyObscured => {
                                log::trace!("damage hidden by a sibling of {:?} under {:?}", child, id);
                                return Err(SkipReason::Obscured);
                            }
                        };
                    if restart {
                        log::trace!("painting root moved up to {:?}", id);
                        walk.restart_at_current();
                    }
                }
            }

            walk.accumulate(node);

            if node.is_top_level() {
                break;
            }
            below = Some(id);
            current = node.parent();
            assert!(walk.depth() <= tree.walk_limit(), "scene tree contains a cycle");
        }

        let reached = walk.reached_top_level();
        let buffer_owner = closest_buffered_ancestor(tree, walk.painting_root(), self.double_buffering);
        walk.into_plan(buffer_owner).ok_or(if reached {
            SkipReason::ClippedAway
        } else {
            SkipReason::Detached
        })
    }

    fn draw(&self, painter: &mut dyn Painter, buffers: &mut dyn BufferManager, plan: &PaintPlan) {
        let _marks = ActiveChildMarks::mark(self.tree, plan);
        let mut subtree = SubtreePainter::new(self.tree, painter, self.double_buffering);

        match plan.buffer_owner {
            Some(owner) => {
                let pass = BufferedPass {
                    root: plan.painting_root,
                    owner,
                    clip: plan.clip,
                };
                let mut pass_guard = BufferedPassGuard::begin(buffers);
                pass_guard.paint(&pass, &mut |tile| {
                    subtree.paint(None, pass.root, tile, Point::ZERO);
                });
                paint_stats::record_painted_buffered();
            }
            None => {
                subtree.paint(Some(buffers), plan.painting_root, plan.clip, Point::ZERO);
                paint_stats::record_painted_direct();
            }
        }
    }
}

/// `active_child` markers set along a plan's path, restored on drop.
struct ActiveChildMarks<'a> {
    tree: &'a SceneTree,
    marked: Vec<(NodeId, Option<NodeId>)>,
}

impl<'a> ActiveChildMarks<'a> {
    fn mark(tree: &'a SceneTree, plan: &PaintPlan) -> Self {
        let mut marked = Vec::new();
        if plan.painting_root != plan.origin {
            for index in (1..=plan.root_index).rev() {
                let id = plan.path[index];
                let node = tree.node(id);
                marked.push((id, node.active_child()));
                node.set_active_child(Some(plan.path[index - 1]));
            }
        }
        Self { tree, marked }
    }
}

impl Drop for ActiveChildMarks<'_> {
    fn drop(&mut self) {
        for (id, previous) in self.marked.drain(..).rev() {
            if let Some(node) = self.tree.get(id) {
                node.set_active_child(previous);
            }
        }
    }
}
