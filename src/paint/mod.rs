//! Paint passes and the collaborators they drive.
//!
//! The compositor never touches pixels. It decides which node to paint from,
//! through which clip, and whether an offscreen buffer sits in between, then
//! calls out to a [`Painter`] for the drawing and to a [`BufferManager`] for
//! the buffering.

mod immediate;
mod subtree;
mod walk;

pub use immediate::ImmediatePaintScheduler;
pub use subtree::paint_subtree;

use crate::geometry::{Point, Rect};
use crate::tree::{NodeId, SceneNode};

/// Where a node is being drawn during a paint pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintScope {
    /// Drawing must stay inside this rectangle (node-local)
    pub clip: Rect,
    /// The node's origin in the painting root's space
    pub translation: Point,
}

/// Draws a node's own appearance (the style delegate side).
pub trait Painter {
    /// Fill the node's content: background, text, images.
    fn draw_content(&mut self, node: &SceneNode, scope: &PaintScope);

    /// Draw the node's border or other decoration on top of its content.
    fn draw_decoration(&mut self, _node: &SceneNode, _scope: &PaintScope) {}
}

/// One buffered paint: `root`'s subtree rendered through `owner`'s surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedPass {
    pub root: NodeId,
    pub owner: NodeId,
    /// Region to repaint, in `root`'s space
    pub clip: Rect,
}

/// Owner of offscreen surfaces.
///
/// Whether a cached surface is reused or a fresh one allocated, and how the
/// result reaches the display, is entirely up to the implementation.
pub trait BufferManager {
    fn begin_buffered_pass(&mut self);

    /// Render `pass.root`'s subtree into the owner's buffer and composite it.
    ///
    /// `render` draws the subtree restricted to the rectangle it is given
    /// (in `pass.root`'s space). Implementations may call it once with
    /// `pass.clip` or once per tile.
    fn paint_through_buffer(&mut self, pass: &BufferedPass, render: &mut dyn FnMut(Rect));

    fn end_buffered_pass(&mut self);

    /// `owner` left the tree; drop any surface kept for it.
    fn release_buffer(&mut self, _owner: NodeId) {}
}

/// A [`BufferManager`] without offscreen surfaces: renders straight through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuffering;

impl BufferManager for NoBuffering {
    fn begin_buffered_pass(&mut self) {}

    fn paint_through_buffer(&mut self, pass: &BufferedPass, render: &mut dyn FnMut(Rect)) {
        render(pass.clip);
    }

    fn end_buffered_pass(&mut self) {}
}

/// Ends a buffered pass on every exit, unwinding included.
struct BufferedPassGuard<'a> {
    buffers: &'a mut dyn BufferManager,
}

impl<'a> BufferedPassGuard<'a> {
    fn begin(buffers: &'a mut dyn BufferManager) -> Self {
        buffers.begin_buffered_pass();
        Self { buffers }
    }

    fn paint(&mut self, pass: &BufferedPass, render: &mut dyn FnMut(Rect)) {
        self.buffers.paint_through_buffer(pass, render);
    }
}

impl Drop for BufferedPassGuard<'_> {
    fn drop(&mut self) {
        self.buffers.end_buffered_pass();
    }
}

/// The concrete paint an immediate request resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintPlan {
    /// Node the walk started from (after redirects and the opaque climb)
    pub origin: NodeId,
    /// Node whose subtree receives the draw call
    pub painting_root: NodeId,
    pub buffer_owner: Option<NodeId>,
    /// Region to repaint, in `painting_root`'s space
    pub clip: Rect,
    /// Translation from `origin`'s space to `painting_root`'s space
    pub offset: Point,
    /// `clip` in the top-level node's space
    pub surface_clip: Rect,
    /// `origin` up to the top-level node, inclusive
    pub(crate) path: Vec<NodeId>,
    /// Index of `painting_root` in `path`
    pub(crate) root_index: usize,
}

/// Why an immediate paint drew nothing. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The node or an ancestor is hidden, or it is not under a top-level node
    NotShowing,
    /// The damage rectangle has no area
    EmptyDamage,
    /// Nothing was left after clipping to the node and its ancestors
    ClippedAway,
    /// An opaque sibling hides the whole damaged area
    Obscured,
    /// The upward walk never reached a top-level node
    Detached,
}

/// Result of one immediate paint request.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOutcome {
    Painted(PaintPlan),
    Skipped(SkipReason),
}

impl PaintOutcome {
    pub fn is_painted(&self) -> bool {
        matches!(self, PaintOutcome::Painted(_))
    }

    pub fn plan(&self) -> Option<&PaintPlan> {
        match self {
            PaintOutcome::Painted(plan) => Some(plan),
            PaintOutcome::Skipped(_) => None,
        }
    }
}
