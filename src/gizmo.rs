//! Transform gizmo.
//!
//! A [`TransformWidget`] receives the selected node's matrix, runs one frame
//! of interaction and hands the edited matrix back. [`DragGizmo`] is the
//! built-in widget:
//!
//! - G = Translate, R = Rotate, S = Scale
//! - X/Y/Z = active axis
//! - middle mouse drag = edit along the active axis
//!
//! Horizontal movement to the right and vertical movement upwards count as
//! positive.

use cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3};
use log::{debug, warn};
use winit::keyboard::KeyCode;

use crate::data_structures::transform::Transform;

/// Input a widget sees during one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GizmoInput {
    /// Cursor movement since the last frame in physical pixels.
    pub drag_delta: (f64, f64),
    /// Whether the edit button is held.
    pub dragging: bool,
}

/// An interactive matrix editor.
pub trait TransformWidget {
    fn set_current_transform(&mut self, matrix: Matrix4<f32>);

    /// Runs one frame of interaction. Returns `true` if the matrix changed.
    fn edit(&mut self, input: &GizmoInput) -> bool;

    fn current_transform(&self) -> Matrix4<f32>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GizmoAxis {
    #[default]
    X,
    Y,
    Z,
}

impl GizmoAxis {
    fn unit(self) -> Vector3<f32> {
        match self {
            GizmoAxis::X => Vector3::unit_x(),
            GizmoAxis::Y => Vector3::unit_y(),
            GizmoAxis::Z => Vector3::unit_z(),
        }
    }
}

/// Drag speeds of the [`DragGizmo`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GizmoSpeeds {
    /// World units per pixel.
    pub translate: f32,
    /// Degrees per pixel.
    pub rotate: f32,
    /// Relative scale change per pixel.
    pub scale: f32,
}

impl Default for GizmoSpeeds {
    fn default() -> Self {
        Self {
            translate: 0.02,
            rotate: 0.5,
            scale: 0.01,
        }
    }
}

/// Smallest scale factor the gizmo produces on any axis.
const MIN_SCALE: f32 = 1e-3;

#[derive(Clone, Debug)]
pub struct DragGizmo {
    pub mode: GizmoMode,
    pub axis: GizmoAxis,
    pub speeds: GizmoSpeeds,
    matrix: Matrix4<f32>,
}

impl DragGizmo {
    pub fn new(speeds: GizmoSpeeds) -> Self {
        Self {
            mode: GizmoMode::default(),
            axis: GizmoAxis::default(),
            speeds,
            matrix: Matrix4::identity(),
        }
    }

    /// Applies a mode or axis hotkey. Returns `true` if the key was consumed.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::KeyG => self.mode = GizmoMode::Translate,
            KeyCode::KeyR => self.mode = GizmoMode::Rotate,
            KeyCode::KeyS => self.mode = GizmoMode::Scale,
            KeyCode::KeyX => self.axis = GizmoAxis::X,
            KeyCode::KeyY => self.axis = GizmoAxis::Y,
            KeyCode::KeyZ => self.axis = GizmoAxis::Z,
            _ => return false,
        }
        debug!("Gizmo: {:?} along {:?}", self.mode, self.axis);
        true
    }

    fn apply(&self, transform: &mut Transform, amount: f32) {
        match self.mode {
            GizmoMode::Translate => {
                transform.position += self.axis.unit() * amount * self.speeds.translate;
            }
            GizmoMode::Rotate => {
                let delta =
                    Quaternion::from_axis_angle(self.axis.unit(), Deg(amount * self.speeds.rotate));
                transform.rotation = delta * transform.rotation;
            }
            GizmoMode::Scale => {
                let factor = (1.0 + amount * self.speeds.scale).max(MIN_SCALE);
                let component = match self.axis {
                    GizmoAxis::X => &mut transform.scale.x,
                    GizmoAxis::Y => &mut transform.scale.y,
                    GizmoAxis::Z => &mut transform.scale.z,
                };
                let scaled = *component * factor;
                *component = if scaled.abs() < MIN_SCALE {
                    MIN_SCALE.copysign(*component)
                } else {
                    scaled
                };
            }
        }
    }
}

impl Default for DragGizmo {
    fn default() -> Self {
        Self::new(GizmoSpeeds::default())
    }
}

impl TransformWidget for DragGizmo {
    fn set_current_transform(&mut self, matrix: Matrix4<f32>) {
        self.matrix = matrix;
    }

    fn edit(&mut self, input: &GizmoInput) -> bool {
        let (dx, dy) = input.drag_delta;
        if !input.dragging || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        let mut transform = match Transform::from_matrix(self.matrix) {
            Ok(transform) => transform,
            Err(e) => {
                warn!("Gizmo cannot edit the current matrix: {}", e);
                return false;
            }
        };
        self.apply(&mut transform, (dx - dy) as f32);
        self.matrix = transform.to_matrix();
        true
    }

    fn current_transform(&self) -> Matrix4<f32> {
        self.matrix
    }
}
