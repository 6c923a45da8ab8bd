//! Effective clip of a node through all of its ancestors.

use crate::geometry::Rect;
use crate::tree::{NodeId, SceneTree};

/// The part of `node` that could ever be visible through its ancestors, in
/// `node`'s local space.
///
/// Starts from the node's own `(0, 0, w, h)` and intersects it with each
/// ancestor's local rectangle, stopping at a root or a top-level node. The
/// result never has negative size; a node clipped away entirely yields an
/// empty rectangle.
pub fn compute_ancestor_clip(tree: &SceneTree, node: NodeId) -> Rect {
    let start = tree.node(node);
    let mut clip = start.local_bounds();
    if start.is_top_level() {
        return clip;
    }

    // Position of `node`'s origin in the current ancestor's space
    let mut dx = start.bounds().x;
    let mut dy = start.bounds().y;
    let mut current = start.parent();
    let mut steps = 0;

    while let Some(ancestor_id) = current {
        let ancestor = tree.node(ancestor_id);
        let in_node_space = ancestor.local_bounds().offset(-dx, -dy);
        clip = clip.intersect(&in_node_space);

        if ancestor.is_top_level() {
            break;
        }
        dx += ancestor.bounds().x;
        dy += ancestor.bounds().y;
        current = ancestor.parent();

        steps += 1;
        assert!(steps <= tree.walk_limit(), "scene tree contains a cycle");
    }

    clip
}

/// Restrict a damage rectangle (local to `node`) to what its ancestors let
/// through.
pub fn clip_damage(tree: &SceneTree, node: NodeId, rect: Rect) -> Rect {
    rect.intersect(&compute_ancestor_clip(tree, node))
}
