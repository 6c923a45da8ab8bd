//! Single-level occlusion queries.
//!
//! Both queries look only at the direct children of one container. The
//! scheduler and the subtree painter call them once per level as they walk.

use crate::geometry::Rect;
use crate::tree::{NodeId, SceneTree};

/// How much of a rectangle is hidden by siblings stacked above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObscuredState {
    NotObscured,
    PartiallyObscured,
    CompletelyObscured,
}

/// Whether `rect` (in `container`'s space) is hidden by one of its children.
///
/// The first visible child, in index order, whose bounds contain `rect`
/// decides the answer: its opacity. Used to skip drawing a container's own
/// content when a child will cover it anyway.
pub fn rectangle_fully_obscured(tree: &SceneTree, container: NodeId, rect: &Rect) -> bool {
    tree.node(container)
        .children()
        .iter()
        .map(|&child| tree.node(child))
        .find(|child| child.is_visible() && child.bounds().contains_rect(rect))
        .map(|child| child.is_opaque())
        .unwrap_or(false)
}

/// Classify `rect` (in `container`'s space) against the siblings stacked
/// above the child at `child_index`.
///
/// Siblings are scanned front-most last: from `child_index - 1` down to 0.
/// An opaque sibling containing `rect` ends the scan immediately. Overlap
/// marks the result partial but the scan continues, since a sibling further
/// up may still cover everything. Once partial, transparent siblings are not
/// inspected at all.
pub fn classify(
    tree: &SceneTree,
    container: NodeId,
    child_index: usize,
    rect: &Rect,
) -> ObscuredState {
    let children = tree.node(container).children();
    let mut state = ObscuredState::NotObscured;

    for &sibling_id in children[..child_index.min(children.len())].iter().rev() {
        let sibling = tree.node(sibling_id);
        if !sibling.is_visible() {
            continue;
        }
        let opaque = sibling.is_opaque();
        if !opaque && state == ObscuredState::PartiallyObscured {
            continue;
        }

        let bounds = sibling.bounds();
        if opaque && bounds.contains_rect(rect) {
            return ObscuredState::CompletelyObscured;
        }
        if state == ObscuredState::NotObscured && bounds.intersects(rect) {
            state = ObscuredState::PartiallyObscured;
        }
    }

    state
}
