use scratch_editor::pick::FramebufferOrigin;
use winit::keyboard::KeyCode;

use crate::common::test_utils::{OrthoBackend, click, editor};

mod common;

#[test]
fn deleting_the_selected_node_leaves_nothing_selected() {
    let (mut editor, ids) = editor(&[("A", -2.0, 0.0, 2.0), ("B", 2.0, 0.0, 2.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);

    editor.selection.select(Some(ids[0]));
    editor.selection.select(Some(ids[1]));
    editor.graph.remove_node(ids[1]).unwrap();

    let frame = editor.frame(&mut backend);
    assert_eq!(frame.highlighted, None);
    assert!(editor.selection.resolve(&editor.graph).is_none());
    // The stale id is kept, it just resolves to nothing.
    assert_eq!(editor.selection.selected(), Some(ids[1]));
    assert_eq!(frame.queue.len(), 1);
    assert_eq!(frame.queue[0].node, ids[0]);
}

#[test]
fn deleted_nodes_cannot_be_picked() {
    let (mut editor, ids) = editor(&[("A", 0.0, 0.0, 2.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);

    assert_eq!(click(&mut editor, &mut backend, 0.0, 0.0), Some(ids[0]));
    editor.input.key_pressed(KeyCode::Delete);
    editor.frame(&mut backend);

    assert!(editor.graph.find_node(ids[0]).is_none());
    assert_eq!(click(&mut editor, &mut backend, 0.0, 0.0), None);
}

#[test]
fn title_shows_the_scene_and_the_selection() {
    let (mut editor, ids) = editor(&[("Crate", 0.0, 0.0, 2.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    editor
        .graph
        .set_scene_path(Some("scenes/warehouse.scene".into()));

    editor.frame(&mut backend);
    assert_eq!(editor.title(), "warehouse.scene");

    click(&mut editor, &mut backend, 0.0, 0.0);
    assert_eq!(editor.title(), "warehouse.scene - Crate");

    editor
        .selection
        .rename_selected(&mut editor.graph, "Big Crate")
        .unwrap();
    editor.frame(&mut backend);
    assert_eq!(editor.title(), "warehouse.scene - Big Crate");
    assert_eq!(editor.graph.find_node(ids[0]).unwrap().name(), "Big Crate");
}

#[test]
fn tab_walks_the_outline() {
    let (mut editor, ids) = editor(&[("A", -2.0, 0.0, 1.0), ("B", 0.0, 0.0, 1.0), ("C", 2.0, 0.0, 1.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);

    let mut visited = Vec::new();
    for _ in 0..4 {
        editor.input.key_pressed(KeyCode::Tab);
        visited.push(editor.frame(&mut backend).highlighted);
    }
    assert_eq!(
        visited,
        vec![Some(ids[0]), Some(ids[1]), Some(ids[2]), Some(ids[0])]
    );
}
