//! Recording collaborators shared by unit tests.

use crate::geometry::Rect;
use crate::paint::{BufferManager, BufferedPass, PaintScope, Painter};
use crate::tree::{NodeId, SceneNode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Drawn {
    Content(NodeId, PaintScope),
    Decoration(NodeId, PaintScope),
}

/// Painter that remembers every call.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub calls: Vec<Drawn>,
}

impl Recorder {
    /// Nodes whose content was drawn, in drawing order.
    pub fn content_order(&self) -> Vec<NodeId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Drawn::Content(id, _) => Some(*id),
                Drawn::Decoration(..) => None,
            })
            .collect()
    }

    pub fn content_scope(&self, node: NodeId) -> Option<PaintScope> {
        self.calls.iter().find_map(|call| match call {
            Drawn::Content(id, scope) if *id == node => Some(*scope),
            _ => None,
        })
    }
}

impl Painter for Recorder {
    fn draw_content(&mut self, node: &SceneNode, scope: &PaintScope) {
        let id = node.id().expect("painted node lives in a tree");
        self.calls.push(Drawn::Content(id, *scope));
    }

    fn draw_decoration(&mut self, node: &SceneNode, scope: &PaintScope) {
        let id = node.id().expect("painted node lives in a tree");
        self.calls.push(Drawn::Decoration(id, *scope));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Call {
    Begin,
    Through { root: NodeId, owner: NodeId, clip: Rect },
    End,
}

/// Buffer manager that renders straight through and logs the bracket calls.
#[derive(Debug, Default)]
pub(crate) struct RecordingBuffers {
    pub calls: Vec<Call>,
    pub released: Vec<NodeId>,
}

impl BufferManager for RecordingBuffers {
    fn begin_buffered_pass(&mut self) {
        self.calls.push(Call::Begin);
    }

    fn paint_through_buffer(&mut self, pass: &BufferedPass, render: &mut dyn FnMut(Rect)) {
        self.calls.push(Call::Through {
            root: pass.root,
            owner: pass.owner,
            clip: pass.clip,
        });
        render(pass.clip);
    }

    fn end_buffered_pass(&mut self) {
        self.calls.push(Call::End);
    }

    fn release_buffer(&mut self, owner: NodeId) {
        self.released.push(owner);
    }
}
