#![allow(dead_code)]

use cgmath::{InnerSpace, Vector3};
use image::{Rgba, RgbaImage};
use scratch_editor::{
    Editor, NodeId, SceneGraph, Transform,
    data_structures::entity::{MaterialHandle, MeshHandle},
    editor::place_model,
    gizmo::DragGizmo,
    pick::{FramebufferOrigin, PickBackend, PickDraw},
};
use winit::event::MouseButton;

pub const SIZE: (u32, u32) = (64, 64);
/// World units to texels of the [`SIZE`] viewport.
pub const PIXELS_PER_UNIT: f32 = 8.0;

/// Software pick target: every draw is an axis aligned square looking down
/// the z axis, centered on the viewport. Later draws overwrite earlier ones.
pub struct OrthoBackend {
    pub image: RgbaImage,
    pub origin: FramebufferOrigin,
    pub renders: u32,
}

impl OrthoBackend {
    pub fn new(origin: FramebufferOrigin) -> Self {
        Self {
            image: RgbaImage::new(SIZE.0, SIZE.1),
            origin,
            renders: 0,
        }
    }

    fn fill(&mut self, draw: &PickDraw) {
        let world = draw.item.world;
        let centre = world.w.truncate();
        let half = Vector3::new(world.x.truncate().magnitude(), world.y.truncate().magnitude(), 0.0)
            * 0.5;

        let (width, height) = (SIZE.0 as f32, SIZE.1 as f32);
        let x0 = width / 2.0 + (centre.x - half.x) * PIXELS_PER_UNIT;
        let x1 = width / 2.0 + (centre.x + half.x) * PIXELS_PER_UNIT;
        // Window rows grow downwards while world y grows upwards.
        let top = height / 2.0 - (centre.y + half.y) * PIXELS_PER_UNIT;
        let bottom = height / 2.0 - (centre.y - half.y) * PIXELS_PER_UNIT;

        for y in 0..SIZE.1 {
            let row = y as f32 + 0.5;
            if row < top || row >= bottom {
                continue;
            }
            let stored = match self.origin {
                FramebufferOrigin::TopLeft => y,
                FramebufferOrigin::BottomLeft => SIZE.1 - 1 - y,
            };
            for x in 0..SIZE.0 {
                let column = x as f32 + 0.5;
                if column >= x0 && column < x1 {
                    self.image.put_pixel(x, stored, Rgba(draw.color));
                }
            }
        }
    }
}

impl PickBackend for OrthoBackend {
    fn size(&self) -> (u32, u32) {
        SIZE
    }

    fn origin(&self) -> FramebufferOrigin {
        self.origin
    }

    fn render_ids(&mut self, draws: &[PickDraw], texel: (u32, u32)) -> anyhow::Result<[u8; 4]> {
        self.renders += 1;
        self.image.pixels_mut().for_each(|p| *p = Rgba([0; 4]));
        for draw in draws {
            self.fill(draw);
        }
        Ok(self.image.get_pixel(texel.0, texel.1).0)
    }
}

/// A pick target whose read-back always fails.
pub struct BrokenBackend;

impl PickBackend for BrokenBackend {
    fn size(&self) -> (u32, u32) {
        SIZE
    }

    fn origin(&self) -> FramebufferOrigin {
        FramebufferOrigin::TopLeft
    }

    fn render_ids(&mut self, _: &[PickDraw], _: (u32, u32)) -> anyhow::Result<[u8; 4]> {
        anyhow::bail!("device lost")
    }
}

/// One node per `(name, x, y, size)` with a square mesh.
pub fn scene(boxes: &[(&str, f32, f32, f32)]) -> (SceneGraph, Vec<NodeId>) {
    let mut graph = SceneGraph::new();
    let ids = boxes
        .iter()
        .enumerate()
        .map(|(idx, (name, x, y, size))| {
            let transform = Transform::from_position_scale(
                Vector3::new(*x, *y, 0.0),
                Vector3::new(*size, *size, *size),
            );
            place_model(&mut graph, name, transform, &[(MeshHandle(0), MaterialHandle(idx))]).unwrap()
        })
        .collect();
    (graph, ids)
}

pub fn editor(boxes: &[(&str, f32, f32, f32)]) -> (Editor, Vec<NodeId>) {
    let (graph, ids) = scene(boxes);
    (Editor::new(graph, DragGizmo::default()), ids)
}

/// Window position of a world point in the test viewport.
pub fn to_cursor(x: f32, y: f32) -> (f64, f64) {
    (
        (SIZE.0 as f32 / 2.0 + x * PIXELS_PER_UNIT) as f64,
        (SIZE.1 as f32 / 2.0 - y * PIXELS_PER_UNIT) as f64,
    )
}

/// Clicks at the world point and runs one frame.
pub fn click(editor: &mut Editor, backend: &mut OrthoBackend, x: f32, y: f32) -> Option<NodeId> {
    let (cx, cy) = to_cursor(x, y);
    editor.input.cursor_moved(cx, cy);
    editor.input.mouse_button(MouseButton::Left, true);
    editor.input.mouse_button(MouseButton::Left, false);
    editor.frame(backend).highlighted
}

/// Middle mouse drag by `(dx, dy)` pixels, then one frame.
pub fn drag(editor: &mut Editor, backend: &mut OrthoBackend, dx: f64, dy: f64) {
    let (x, y) = editor.input.cursor();
    editor.input.mouse_button(MouseButton::Middle, true);
    editor.input.cursor_moved(x + dx, y + dy);
    editor.frame(backend);
    editor.input.mouse_button(MouseButton::Middle, false);
}
