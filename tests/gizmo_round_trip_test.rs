use cgmath::{Deg, InnerSpace, Matrix4, Quaternion, Rotation3, Vector3};
use scratch_editor::{
    Transform,
    gizmo::{GizmoAxis, GizmoMode},
    pick::FramebufferOrigin,
    selection::EditOutcome,
};
use winit::keyboard::KeyCode;

use crate::common::test_utils::{OrthoBackend, click, drag, editor};

mod common;

#[test]
fn matrix_round_trip_reproduces_the_transform() {
    let transform = Transform {
        position: Vector3::new(4.0, -1.5, 0.25),
        rotation: Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), Deg(30.0)),
        scale: Vector3::new(2.0, 0.5, 1.0),
    };
    let back = Transform::from_matrix(transform.to_matrix()).unwrap();

    assert_eq!(back.position, transform.position);
    assert!((back.scale - transform.scale).magnitude() < 1e-5);
    assert!(back.approx_eq(&transform, 1e-5));
}

#[test]
fn dragging_moves_the_picked_node_along_the_axis() {
    let (mut editor, ids) = editor(&[("Box", 0.0, 0.0, 2.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    click(&mut editor, &mut backend, 0.0, 0.0);

    editor.input.key_pressed(KeyCode::KeyG);
    editor.input.key_pressed(KeyCode::KeyY);
    drag(&mut editor, &mut backend, 50.0, 0.0);

    assert_eq!(editor.gizmo.mode, GizmoMode::Translate);
    assert_eq!(editor.gizmo.axis, GizmoAxis::Y);
    let node = editor.graph.find_node(ids[0]).unwrap();
    let expected = 50.0 * editor.gizmo.speeds.translate;
    let offset = node.transform().position - Vector3::new(0.0, expected, 0.0);
    assert!(offset.magnitude() < 1e-5);
    assert_eq!(node.transform().scale, Vector3::new(2.0, 2.0, 2.0));
}

#[test]
fn scaling_keeps_position_and_other_axes() {
    let (mut editor, ids) = editor(&[("Box", 1.0, 1.0, 2.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    click(&mut editor, &mut backend, 1.0, 1.0);

    editor.input.key_pressed(KeyCode::KeyS);
    editor.input.key_pressed(KeyCode::KeyX);
    drag(&mut editor, &mut backend, 0.0, -100.0);

    let transform = *editor.graph.find_node(ids[0]).unwrap().transform();
    let factor = 1.0 + 100.0 * editor.gizmo.speeds.scale;
    assert!((transform.scale.x - 2.0 * factor).abs() < 1e-4);
    assert!((transform.scale.y - 2.0).abs() < 1e-5);
    assert!((transform.scale.z - 2.0).abs() < 1e-5);
    assert!((transform.position - Vector3::new(1.0, 1.0, 0.0)).magnitude() < 1e-5);
}

#[test]
fn rotation_survives_many_frames() {
    let (mut editor, ids) = editor(&[("Box", 0.0, 0.0, 1.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    click(&mut editor, &mut backend, 0.0, 0.0);

    editor.input.key_pressed(KeyCode::KeyR);
    editor.input.key_pressed(KeyCode::KeyZ);
    for _ in 0..9 {
        drag(&mut editor, &mut backend, 10.0, 0.0);
    }

    let degrees = 9.0 * 10.0 * editor.gizmo.speeds.rotate;
    let expected = Transform {
        rotation: Quaternion::from_angle_z(Deg(degrees)),
        ..Transform::new()
    };
    let transform = editor.graph.find_node(ids[0]).unwrap().transform();
    assert!(transform.approx_eq(&expected, 1e-4));
    assert!((transform.scale - Vector3::new(1.0, 1.0, 1.0)).magnitude() < 1e-4);
}

#[test]
fn idle_frames_keep_the_matrix_bit_for_bit() {
    let (mut editor, ids) = editor(&[("Box", 0.3, -0.7, 1.3)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    click(&mut editor, &mut backend, 0.3, -0.7);
    let before: Matrix4<f32> = editor.graph.find_node(ids[0]).unwrap().generate_transform_matrix();

    for _ in 0..10 {
        assert_eq!(editor.frame(&mut backend).edit, EditOutcome::Unchanged);
    }
    let after = editor.graph.find_node(ids[0]).unwrap().generate_transform_matrix();
    assert_eq!(before, after);
}

#[test]
fn captured_pointer_blocks_edits() {
    let (mut editor, ids) = editor(&[("Box", 0.0, 0.0, 1.0)]);
    let mut backend = OrthoBackend::new(FramebufferOrigin::TopLeft);
    click(&mut editor, &mut backend, 0.0, 0.0);

    editor.input.set_pointer_captured(true);
    drag(&mut editor, &mut backend, 40.0, 0.0);

    let transform = editor.graph.find_node(ids[0]).unwrap().transform();
    assert_eq!(transform.position, Vector3::new(0.0, 0.0, 0.0));
}
