//! Steady-state painting of a node and everything below it.

use crate::geometry::{Point, Rect};
use crate::occlusion::{classify, rectangle_fully_obscured, ObscuredState};
use crate::paint_stats;
use crate::tree::{NodeId, SceneTree};

use super::{BufferManager, BufferedPass, BufferedPassGuard, PaintScope, Painter};

/// Paint `node` and its visible descendants inside `clip` (node-local).
/// A hidden `node` paints nothing.
///
/// Used when `node` is already known to be the right place to paint from,
/// such as an external request to flush a rectangle of a window. A
/// double-buffered node is routed through `buffers` when buffering is
/// enabled.
pub fn paint_subtree(
    tree: &SceneTree,
    painter: &mut dyn Painter,
    buffers: &mut dyn BufferManager,
    double_buffering: bool,
    node: NodeId,
    clip: Rect,
) {
    let mut subtree = SubtreePainter::new(tree, painter, double_buffering);
    subtree.paint(Some(buffers), node, clip, Point::ZERO);
}

pub(crate) struct SubtreePainter<'a, 'p> {
    tree: &'a SceneTree,
    painter: &'p mut dyn Painter,
    double_buffering: bool,
}

impl<'a, 'p> SubtreePainter<'a, 'p> {
    pub(crate) fn new(tree: &'a SceneTree, painter: &'p mut dyn Painter, double_buffering: bool) -> Self {
        Self {
            tree,
            painter,
            double_buffering,
        }
    }

    /// Paint one node. `buffers` is `None` while an ancestor's buffered pass
    /// is already absorbing the drawing.
    pub(crate) fn paint(
        &mut self,
        buffers: Option<&mut (dyn BufferManager + '_)>,
        id: NodeId,
        clip: Rect,
        translation: Point,
    ) {
        let tree = self.tree;
        let node = tree.node(id);
        if !node.is_visible() {
            return;
        }
        let local = node.local_bounds();
        if local.is_empty() {
            return;
        }
        let clip = clip.intersect(&local);
        if clip.is_empty() {
            return;
        }

        match buffers {
            Some(buffers) if self.double_buffering && node.is_double_buffered() => {
                let pass = BufferedPass {
                    root: id,
                    owner: id,
                    clip,
                };
                let mut pass_guard = BufferedPassGuard::begin(buffers);
                pass_guard.paint(&pass, &mut |tile| {
                    self.paint_unbuffered(None, id, tile.intersect(&local), translation);
                });
            }
            buffers => self.paint_unbuffered(buffers, id, clip, translation),
        }
    }

    fn paint_unbuffered(
        &mut self,
        buffers: Option<&mut (dyn BufferManager + '_)>,
        id: NodeId,
        clip: Rect,
        translation: Point,
    ) {
        if clip.is_empty() {
            return;
        }
        let tree = self.tree;
        let node = tree.node(id);

        if !rectangle_fully_obscured(tree, id, &clip) {
            let scope = PaintScope { clip, translation };
            self.painter.draw_content(node, &scope);
            self.painter.draw_decoration(node, &scope);
            paint_stats::record_node_painted();
        }

        self.paint_children(buffers, id, clip, translation);
    }

    /// Paint children back to front: from the last index down to 0.
    fn paint_children(
        &mut self,
        mut buffers: Option<&mut (dyn BufferManager + '_)>,
        id: NodeId,
        clip: Rect,
        translation: Point,
    ) {
        let tree = self.tree;
        let node = tree.node(id);
        let children = node.children();
        if children.is_empty() {
            return;
        }

        // An opaque active child hides everything stacked behind it
        let start = node
            .active_child()
            .filter(|&active| tree.node(active).is_opaque())
            .and_then(|active| children.iter().position(|&c| c == active))
            .unwrap_or(children.len() - 1);
        let check_siblings = node.has_overlapping_children();

        for index in (0..=start).rev() {
            let child_id = children[index];
            let child = tree.node(child_id);
            if !child.is_visible() {
                continue;
            }
            let bounds = child.bounds();
            if !clip.intersects(&bounds) {
                continue;
            }
            let visible = clip.intersect(&bounds);
            if check_siblings
                && index > 0
                && classify(tree, id, index, &visible) == ObscuredState::CompletelyObscured
            {
                paint_stats::record_child_obscured();
                continue;
            }

            self.paint(
                buffers.as_deref_mut(),
                child_id,
                visible.offset(-bounds.x, -bounds.y),
                translation.offset(bounds.x, bounds.y),
            );
        }
    }
}
