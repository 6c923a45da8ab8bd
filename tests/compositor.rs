mod common;

use common::{init_logging, node, BufferEvent, RecordingPainter, TilingBuffers};
use damask::prelude::*;

/// Root{0,0,100,100} > Child{10,10,50,50, opaque} > Grandchild{5,5,20,20}
fn nested(compositor: &mut Compositor<TilingBuffers>) -> (NodeId, NodeId, NodeId) {
    let tree = compositor.tree_mut();
    let root = tree.insert(node(0.0, 0.0, 100.0, 100.0).top_level(true));
    let child = tree.insert(node(10.0, 10.0, 50.0, 50.0).opaque(true));
    let grandchild = tree.insert(node(5.0, 5.0, 20.0, 20.0));
    tree.attach(root, child).unwrap();
    tree.attach(child, grandchild).unwrap();
    (root, child, grandchild)
}

fn no_markers<B: BufferManager>(compositor: &Compositor<B>) -> bool {
    compositor.tree().iter().all(|n| n.active_child().is_none())
}

#[test]
fn test_end_to_end_scenario() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (_root, child, grandchild) = nested(&mut compositor);

    let mut painter = RecordingPainter::default();
    let outcome = compositor.paint_immediately(&mut painter, grandchild, Rect::new(0.0, 0.0, 20.0, 20.0));

    let plan = outcome.plan().expect("damage should be painted");
    assert_eq!(plan.painting_root, child);
    assert_eq!(plan.clip, Rect::new(5.0, 5.0, 20.0, 20.0));
    assert_eq!(plan.surface_clip, Rect::new(15.0, 15.0, 20.0, 20.0));
    assert_eq!(painter.order(), vec![child, grandchild]);
    assert!(compositor.buffers().events.is_empty());
    assert!(no_markers(&compositor));
}

#[test]
fn test_noop_guards_touch_no_collaborator() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (_root, child, grandchild) = nested(&mut compositor);
    compositor.tree_mut().set_double_buffered(child, true).unwrap();

    let mut painter = RecordingPainter::default();
    let empty = compositor.paint_immediately(&mut painter, grandchild, Rect::new(0.0, 0.0, 20.0, 0.0));
    assert_eq!(empty, PaintOutcome::Skipped(SkipReason::EmptyDamage));

    compositor.tree_mut().set_visible(grandchild, false).unwrap();
    let hidden = compositor.paint_immediately(&mut painter, grandchild, Rect::new(0.0, 0.0, 20.0, 20.0));
    assert_eq!(hidden, PaintOutcome::Skipped(SkipReason::NotShowing));

    assert!(painter.content.is_empty());
    assert_eq!(painter.decorations, 0);
    assert!(compositor.buffers().events.is_empty());
    assert!(no_markers(&compositor));
}

#[test]
fn test_redirect_paints_from_painting_origin() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let tree = compositor.tree_mut();
    let root = tree.insert(node(0.0, 0.0, 200.0, 200.0).top_level(true));
    let scroller = tree.insert(node(30.0, 30.0, 100.0, 100.0).painting_origin(true));
    let row = tree.insert(node(0.0, 40.0, 100.0, 20.0));
    let label = tree.insert(node(4.0, 2.0, 50.0, 16.0).opaque(true));
    tree.attach(root, scroller).unwrap();
    tree.attach(scroller, row).unwrap();
    tree.attach(row, label).unwrap();

    let mut painter = RecordingPainter::default();
    let outcome = compositor.paint_immediately(&mut painter, label, Rect::new(0.0, 0.0, 10.0, 10.0));

    let plan = outcome.plan().unwrap();
    assert_eq!(plan.painting_root, scroller);
    assert_eq!(plan.clip, Rect::new(4.0, 42.0, 10.0, 10.0));
    assert_eq!(painter.order().first(), Some(&scroller));
    assert!(!painter.order().is_empty());
    assert_eq!(
        painter.scope_of(scroller).map(|scope| scope.clip),
        Some(Rect::new(4.0, 42.0, 10.0, 10.0))
    );
}

#[test]
fn test_buffer_owner_is_opaque_mid() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let tree = compositor.tree_mut();
    let root = tree.insert(node(0.0, 0.0, 100.0, 100.0).top_level(true));
    let mid = tree.insert(node(10.0, 10.0, 60.0, 60.0).opaque(true).double_buffered(true));
    let leaf = tree.insert(node(0.0, 0.0, 20.0, 20.0));
    tree.attach(root, mid).unwrap();
    tree.attach(mid, leaf).unwrap();

    let mut painter = RecordingPainter::default();
    let outcome = compositor.paint_immediately(&mut painter, leaf, Rect::new(0.0, 0.0, 20.0, 20.0));

    assert_eq!(outcome.plan().unwrap().buffer_owner, Some(mid));
    assert_eq!(
        compositor.buffers().events,
        vec![
            BufferEvent::Begin,
            BufferEvent::Through(BufferedPass {
                root: mid,
                owner: mid,
                clip: Rect::new(0.0, 0.0, 20.0, 20.0),
            }),
            BufferEvent::End,
        ]
    );
    // One draw of each node per tile
    assert_eq!(painter.order(), vec![mid, leaf, mid, leaf]);
    let clips: Vec<Rect> = painter
        .content
        .iter()
        .filter(|(id, _)| *id == leaf)
        .map(|(_, scope)| scope.clip)
        .collect();
    assert_eq!(
        clips,
        vec![Rect::new(0.0, 0.0, 20.0, 10.0), Rect::new(0.0, 10.0, 20.0, 10.0)]
    );
}

#[test]
fn test_transparent_mid_has_no_buffer_owner() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let tree = compositor.tree_mut();
    let root = tree.insert(node(0.0, 0.0, 100.0, 100.0).top_level(true));
    let mid = tree.insert(node(10.0, 10.0, 60.0, 60.0).double_buffered(true));
    let leaf = tree.insert(node(0.0, 0.0, 20.0, 20.0));
    tree.attach(root, mid).unwrap();
    tree.attach(mid, leaf).unwrap();

    let mut painter = RecordingPainter::default();
    let outcome = compositor.paint_immediately(&mut painter, leaf, Rect::new(0.0, 0.0, 20.0, 20.0));

    let plan = outcome.plan().unwrap();
    assert_eq!(plan.painting_root, root);
    assert_eq!(plan.buffer_owner, None);
    // Repainting down from the root still routes `mid` through its own buffer
    assert_eq!(
        compositor.buffers().events,
        vec![
            BufferEvent::Begin,
            BufferEvent::Through(BufferedPass {
                root: mid,
                owner: mid,
                clip: Rect::new(0.0, 0.0, 20.0, 20.0),
            }),
            BufferEvent::End,
        ]
    );
}

#[test]
fn test_subtree_paint_of_hidden_node_draws_nothing() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (_root, child, grandchild) = nested(&mut compositor);
    compositor.tree_mut().set_visible(child, false).unwrap();

    let mut painter = RecordingPainter::default();
    compositor.paint_subtree(&mut painter, child, Rect::from_size(50.0, 50.0));
    assert!(painter.content.is_empty());

    // A visible node below a hidden ancestor is still painted on request
    compositor.paint_subtree(&mut painter, grandchild, Rect::from_size(20.0, 20.0));
    assert_eq!(painter.order(), vec![grandchild]);
}

#[test]
fn test_buffering_disabled_by_config() {
    init_logging();
    let config = CompositorConfig::default().double_buffering(false);
    let mut compositor = Compositor::with_config(config, TilingBuffers::default());
    let (_root, child, grandchild) = nested(&mut compositor);
    compositor.tree_mut().set_double_buffered(child, true).unwrap();

    let mut painter = RecordingPainter::default();
    let outcome = compositor.paint_immediately(&mut painter, grandchild, Rect::new(0.0, 0.0, 20.0, 20.0));

    assert_eq!(outcome.plan().unwrap().buffer_owner, None);
    assert!(compositor.buffers().events.is_empty());
    assert_eq!(painter.order(), vec![child, grandchild]);
}

#[test]
fn test_markers_cleared_after_every_outcome() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let tree = compositor.tree_mut();
    let root = tree.insert(node(0.0, 0.0, 100.0, 100.0).top_level(true).overlapping_children(true));
    let dialog = tree.insert(node(0.0, 0.0, 40.0, 40.0).opaque(true));
    let behind = tree.insert(node(30.0, 30.0, 40.0, 40.0).opaque(true));
    tree.attach(root, dialog).unwrap();
    tree.attach(root, behind).unwrap();

    let mut painter = RecordingPainter::default();

    // Fully behind the dialog
    let obscured = compositor.paint_immediately(&mut painter, behind, Rect::new(0.0, 0.0, 5.0, 5.0));
    assert_eq!(obscured, PaintOutcome::Skipped(SkipReason::Obscured));
    assert!(painter.content.is_empty());
    assert!(no_markers(&compositor));

    // Straddles the dialog's edge: painting restarts at the root
    let partial = compositor.paint_immediately(&mut painter, behind, Rect::new(0.0, 0.0, 20.0, 20.0));
    assert_eq!(partial.plan().unwrap().painting_root, root);
    assert!(no_markers(&compositor));

    // Clear of the dialog
    let clear = compositor.paint_immediately(&mut painter, behind, Rect::new(20.0, 20.0, 10.0, 10.0));
    assert_eq!(clear.plan().unwrap().painting_root, behind);
    assert!(no_markers(&compositor));
}

#[test]
fn test_flush_coalesces_damage_from_other_threads() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (_root, child, _grandchild) = nested(&mut compositor);

    let queue = compositor.damage_queue();
    std::thread::spawn(move || {
        queue.push(DamageRequest::new(child, Rect::new(0.0, 0.0, 5.0, 5.0)));
        queue.push(DamageRequest::new(child, Rect::new(40.0, 40.0, 5.0, 5.0)));
    })
    .join()
    .unwrap();

    let mut painter = RecordingPainter::default();
    assert_eq!(compositor.flush(&mut painter), 1);
    assert_eq!(
        painter.scope_of(child).map(|scope| scope.clip),
        Some(Rect::new(0.0, 0.0, 45.0, 45.0))
    );
}

#[test]
fn test_hiding_a_node_repaints_what_was_under_it() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (root, child, grandchild) = nested(&mut compositor);

    compositor.set_visible(child, false).unwrap();
    let mut painter = RecordingPainter::default();
    assert_eq!(compositor.flush(&mut painter), 1);

    assert_eq!(painter.order(), vec![root]);
    assert_eq!(
        painter.scope_of(root).map(|scope| scope.clip),
        Some(Rect::new(10.0, 10.0, 50.0, 50.0))
    );
    assert!(!painter.order().contains(&grandchild));
}

#[test]
fn test_remove_releases_buffers_of_subtree() {
    init_logging();
    let mut compositor = Compositor::with_buffers(TilingBuffers::default());
    let (_root, child, grandchild) = nested(&mut compositor);
    compositor.tree_mut().set_double_buffered(grandchild, true).unwrap();
    compositor.repaint(grandchild);

    let removed = compositor.remove(child).unwrap();
    assert_eq!(removed, vec![child, grandchild]);
    assert_eq!(
        compositor.buffers().events,
        vec![BufferEvent::Released(grandchild)]
    );
    assert!(!compositor.tree().contains(grandchild));

    let queued = compositor.damage_queue().drain();
    assert_eq!(queued.len(), 1);
    assert_ne!(queued[0].origin, grandchild);
}

#[test]
fn test_tree_errors_surface_through_compositor() {
    let mut compositor = Compositor::new();
    let a = compositor.tree_mut().insert(node(0.0, 0.0, 10.0, 10.0));
    let b = compositor.tree_mut().insert(node(0.0, 0.0, 10.0, 10.0));
    compositor.attach(a, b).unwrap();

    assert_eq!(compositor.attach(b, a), Err(TreeError::Cycle { parent: b, child: a }));
    assert_eq!(compositor.attach(a, a), Err(TreeError::SelfAttach(a)));
    compositor.remove(b).unwrap();
    assert_eq!(compositor.set_opaque(b, true), Err(TreeError::StaleNode(b)));
}
