#![allow(dead_code)]

use damask::prelude::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn node(x: f32, y: f32, w: f32, h: f32) -> SceneNode {
    SceneNode::new(Rect::new(x, y, w, h))
}

/// Painter recording `(node, scope)` for every content draw.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub content: Vec<(NodeId, PaintScope)>,
    pub decorations: usize,
}

impl RecordingPainter {
    pub fn order(&self) -> Vec<NodeId> {
        self.content.iter().map(|(id, _)| *id).collect()
    }

    pub fn scope_of(&self, node: NodeId) -> Option<PaintScope> {
        self.content.iter().find(|(id, _)| *id == node).map(|(_, scope)| *scope)
    }
}

impl Painter for RecordingPainter {
    fn draw_content(&mut self, node: &SceneNode, scope: &PaintScope) {
        let id = node.id().expect("painted node lives in a tree");
        self.content.push((id, *scope));
    }

    fn draw_decoration(&mut self, _node: &SceneNode, _scope: &PaintScope) {
        self.decorations += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferEvent {
    Begin,
    Through(BufferedPass),
    End,
    Released(NodeId),
}

/// Buffer manager that renders each pass in two horizontal tiles.
#[derive(Debug, Default)]
pub struct TilingBuffers {
    pub events: Vec<BufferEvent>,
}

impl BufferManager for TilingBuffers {
    fn begin_buffered_pass(&mut self) {
        self.events.push(BufferEvent::Begin);
    }

    fn paint_through_buffer(&mut self, pass: &BufferedPass, render: &mut dyn FnMut(Rect)) {
        self.events.push(BufferEvent::Through(*pass));
        let clip = pass.clip;
        let half = clip.height / 2.0;
        render(Rect::new(clip.x, clip.y, clip.width, half));
        render(Rect::new(clip.x, clip.y + half, clip.width, clip.height - half));
    }

    fn end_buffered_pass(&mut self) {
        self.events.push(BufferEvent::End);
    }

    fn release_buffer(&mut self, owner: NodeId) {
        self.events.push(BufferEvent::Released(owner));
    }
}
