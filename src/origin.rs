//! Upward resolutions that decide where a paint pass starts.

use crate::geometry::Rect;
use crate::tree::{NodeId, SceneTree};

/// The nearest node, starting with `node` itself, that insists on painting
/// damage from below it, together with `rect` translated into its space.
///
/// The walk stops at a top-level node.
pub fn find_painting_origin(tree: &SceneTree, node: NodeId, rect: Rect) -> Option<(NodeId, Rect)> {
    let mut current = node;
    let mut rect = rect;
    let mut steps = 0;

    loop {
        let n = tree.node(current);
        if n.is_painting_origin() {
            return Some((current, rect));
        }
        if n.is_top_level() {
            return None;
        }
        let parent = n.parent()?;
        rect = rect.offset(n.bounds().x, n.bounds().y);
        current = parent;

        steps += 1;
        assert!(steps <= tree.walk_limit(), "scene tree contains a cycle");
    }
}

/// Move a damage request up to the node painting must start from.
///
/// A transparent node cannot repaint itself alone because whatever shows
/// through it has to be drawn first, so the walk climbs while the node is
/// non-opaque. It stops at an opaque node, a painting origin, a top-level
/// node, or a root.
pub fn resolve_paint_start(tree: &SceneTree, node: NodeId, rect: Rect) -> (NodeId, Rect) {
    let mut current = node;
    let mut rect = rect;
    let mut steps = 0;

    loop {
        let n = tree.node(current);
        if n.is_opaque() || n.is_painting_origin() || n.is_top_level() {
            return (current, rect);
        }
        match n.parent() {
            Some(parent) => {
                rect = rect.offset(n.bounds().x, n.bounds().y);
                current = parent;
            }
            None => return (current, rect),
        }

        steps += 1;
        assert!(steps <= tree.walk_limit(), "scene tree contains a cycle");
    }
}

/// The node whose offscreen buffer absorbs a paint started at `node`.
///
/// Painting starts where [`resolve_paint_start`] ends; the owner is the
/// [`closest_buffered_ancestor`] of that point. Returns `None` when buffering
/// is disabled or nothing qualifies.
///
/// This is the owner before sibling occlusion is considered. When an
/// overlapping container moves the painting root up, the scheduler asks
/// [`closest_buffered_ancestor`] again for the new root.
pub fn find_buffer_owner(tree: &SceneTree, node: NodeId, enabled: bool) -> Option<NodeId> {
    if !enabled {
        return None;
    }

    let (start, _) = resolve_paint_start(tree, node, Rect::ZERO);
    let terminal = tree.node(start);
    if !terminal.is_double_buffered() && !terminal.uses_shared_buffer() {
        return None;
    }
    closest_buffered_ancestor(tree, start, enabled)
}

/// The closest double-buffered node at or above `node`, up to and including
/// the top-level boundary.
pub fn closest_buffered_ancestor(tree: &SceneTree, node: NodeId, enabled: bool) -> Option<NodeId> {
    if !enabled {
        return None;
    }

    let mut current = Some(node);
    let mut steps = 0;
    while let Some(id) = current {
        let n = tree.node(id);
        if n.is_double_buffered() {
            return Some(id);
        }
        if n.is_top_level() {
            break;
        }
        current = n.parent();

        steps += 1;
        assert!(steps <= tree.walk_limit(), "scene tree contains a cycle");
    }
    None
}
