//! Node transforms and their GPU instance representation.
//!
//! A [`Transform`] is stored as three independent fields (position, rotation,
//! scale) so that UI widgets can display and edit them separately. Rendering
//! and gizmos work on 4x4 matrices; [`Transform::to_matrix`] and
//! [`Transform::from_matrix`] convert between the two.

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

use crate::{data_structures::model, error::TransformError};

/// Maximum absolute dot product between two normalized basis axes before a
/// matrix is considered sheared.
const ORTHOGONALITY_TOLERANCE: f32 = 1e-3;
const DEGENERATE_AXIS_LENGTH: f32 = 1e-6;
const AFFINE_TOLERANCE: f32 = 1e-5;

/// Position, rotation (as quaternion) and scale of a scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transform: no translation, no rotation, unit scale.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position_scale(position: Vector3<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            scale,
            ..Self::new()
        }
    }

    /// Composes `T · R · S`: local coordinates are scaled first, then rotated,
    /// then translated (column vectors, same convention as the camera).
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Decomposes a pure TRS matrix back into its three fields.
    ///
    /// Matrices with shear, projection or a collapsed axis are rejected
    /// instead of being forced into a transform that would not reproduce
    /// them. Mirroring (negative determinant) is expressed as a negative
    /// `scale.x`.
    pub fn from_matrix(matrix: Matrix4<f32>) -> Result<Self, TransformError> {
        let elements: &[f32; 16] = matrix.as_ref();
        if elements.iter().any(|e| !e.is_finite()) {
            return Err(TransformError::NotFinite);
        }
        if matrix.x.w.abs() > AFFINE_TOLERANCE
            || matrix.y.w.abs() > AFFINE_TOLERANCE
            || matrix.z.w.abs() > AFFINE_TOLERANCE
            || (matrix.w.w - 1.0).abs() > AFFINE_TOLERANCE
        {
            return Err(TransformError::NonAffine);
        }

        let position = matrix.w.truncate();
        let x_axis = matrix.x.truncate();
        let y_axis = matrix.y.truncate();
        let z_axis = matrix.z.truncate();
        let mut scale = Vector3::new(x_axis.magnitude(), y_axis.magnitude(), z_axis.magnitude());
        if scale.x < DEGENERATE_AXIS_LENGTH
            || scale.y < DEGENERATE_AXIS_LENGTH
            || scale.z < DEGENERATE_AXIS_LENGTH
        {
            return Err(TransformError::Degenerate);
        }

        let mut x_axis = x_axis / scale.x;
        let y_axis = y_axis / scale.y;
        let z_axis = z_axis / scale.z;
        if x_axis.dot(y_axis).abs() > ORTHOGONALITY_TOLERANCE
            || x_axis.dot(z_axis).abs() > ORTHOGONALITY_TOLERANCE
            || y_axis.dot(z_axis).abs() > ORTHOGONALITY_TOLERANCE
        {
            return Err(TransformError::Shear);
        }

        if x_axis.cross(y_axis).dot(z_axis) < 0.0 {
            scale.x = -scale.x;
            x_axis = -x_axis;
        }
        let rotation = Quaternion::from(Matrix3::from_cols(x_axis, y_axis, z_axis)).normalize();

        Ok(Self {
            position,
            rotation,
            scale,
        })
    }

    /// Component-wise comparison; `q` and `-q` describe the same rotation.
    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        let close = |a: Vector3<f32>, b: Vector3<f32>| {
            (a.x - b.x).abs() <= epsilon
                && (a.y - b.y).abs() <= epsilon
                && (a.z - b.z).abs() <= epsilon
        };
        close(self.position, other.position)
            && close(self.scale, other.scale)
            && self.rotation.dot(other.rotation).abs() >= 1.0 - epsilon
    }

    /// Packs a world matrix for the GPU. `highlighted` marks the selected entity.
    pub fn raw_from_matrix(world: Matrix4<f32>, highlighted: bool) -> InstanceRaw {
        let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
        // Inverse transpose keeps normals perpendicular under non-uniform scale.
        let normal = linear
            .invert()
            .map(|inverse| {
                let mut n = inverse;
                n.transpose_self();
                n
            })
            .unwrap_or(linear);
        InstanceRaw {
            model: world.into(),
            normal: normal.into(),
            highlight: if highlighted { 1.0 } else { 0.0 },
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    highlight: f32,
}

impl InstanceRaw {
    pub fn highlight(&self) -> f32 {
        self.highlight
    }
}

/**
 * Instance data is read per instance, not per vertex. The model matrix takes
 * four vec4 slots, the normal matrix three vec3 slots.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}
