//! Materials and the uniform-setting contract of the shader system.
//!
//! A [`Material`] is a named map from uniform name to a typed
//! [`UniformValue`]. Materials are applied through the narrow [`UniformSink`]
//! interface (`set_float`, `set_vec3`, ...), which is all the editor core
//! knows about shaders. [`UniformBlock`] is the sink used by the forward
//! pipeline: it packs values into a std140 byte buffer following a
//! [`UniformLayout`].
//!
//! Draw calls are sorted by material and the [`MaterialBinder`] skips binds
//! for a material that is already bound.

use std::collections::BTreeMap;

use cgmath::{Matrix4, Vector3};
use log::{debug, warn};

use crate::data_structures::{entity::MaterialHandle, scene_graph::RenderItem};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Bool(bool),
    UnsignedInt(u32),
    Vec3(Vector3<f32>),
    Mat4(Matrix4<f32>),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::UnsignedInt(_) => UniformKind::UnsignedInt,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Bool,
    UnsignedInt,
    Vec3,
    Mat4,
}

impl UniformKind {
    /// (alignment, size) in bytes under std140 rules. WGSL has no bool in
    /// uniform buffers, so bools travel as `u32`.
    fn std140(self) -> (usize, usize) {
        match self {
            UniformKind::Float | UniformKind::Bool | UniformKind::UnsignedInt => (4, 4),
            UniformKind::Vec3 => (16, 12),
            UniformKind::Mat4 => (16, 64),
        }
    }
}

/// The uniform-setting contract every shader binding offers.
pub trait UniformSink {
    /// Make this binding the current one. Most sinks have nothing to do.
    fn activate(&mut self) {}

    fn set_float(&mut self, name: &str, value: f32);
    fn set_bool(&mut self, name: &str, value: bool);
    fn set_unsigned_int(&mut self, name: &str, value: u32);
    fn set_vec3(&mut self, name: &str, value: Vector3<f32>);
    fn set_mat4(&mut self, name: &str, value: Matrix4<f32>);

    fn set_value(&mut self, name: &str, value: &UniformValue) {
        match *value {
            UniformValue::Float(v) => self.set_float(name, v),
            UniformValue::Bool(v) => self.set_bool(name, v),
            UniformValue::UnsignedInt(v) => self.set_unsigned_int(name, v),
            UniformValue::Vec3(v) => self.set_vec3(name, v),
            UniformValue::Mat4(v) => self.set_mat4(name, v),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: usize,
}

/// Byte layout of a uniform struct, computed with std140 alignment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    cursor: usize,
}

impl UniformLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field in declaration order, exactly as the shader declares it.
    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let (align, size) = kind.std140();
        let offset = self.cursor.next_multiple_of(align);
        self.fields.push(UniformField {
            name: name.to_string(),
            kind,
            offset,
        });
        self.cursor = offset + size;
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Struct size rounded up to the 16 byte alignment of uniform structs.
    pub fn size(&self) -> usize {
        self.cursor.next_multiple_of(16).max(16)
    }

    /// Layout of `MaterialUniform` in `forward.wgsl`.
    pub fn forward_material() -> Self {
        Self::new()
            .field("material.diffuse", UniformKind::Vec3)
            .field("material.shininess", UniformKind::Float)
            .field("material.specular", UniformKind::Vec3)
            .field("material.opacity", UniformKind::Float)
            .field("material.ambient", UniformKind::Vec3)
            .field("material.lit", UniformKind::Bool)
    }
}

/// CPU copy of a uniform buffer. Writes mark the block dirty until the
/// owner uploads it.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.size()];
        Self {
            layout,
            bytes,
            dirty: true,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn write(&mut self, name: &str, kind: UniformKind, data: &[u8]) {
        let field = match self.layout.get(name) {
            Some(field) => field,
            None => {
                // Same as a -1 uniform location: setting it has no effect.
                debug!("uniform '{}' is not part of this block", name);
                return;
            }
        };
        if field.kind != kind {
            warn!(
                "uniform '{}' is declared as {:?} but was set as {:?}",
                name, field.kind, kind
            );
            return;
        }
        let range = field.offset..field.offset + data.len();
        if self.bytes[range.clone()] != *data {
            self.bytes[range].copy_from_slice(data);
            self.dirty = true;
        }
    }
}

impl UniformSink for UniformBlock {
    fn set_float(&mut self, name: &str, value: f32) {
        self.write(name, UniformKind::Float, bytemuck::bytes_of(&value));
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.write(name, UniformKind::Bool, bytemuck::bytes_of(&(value as u32)));
    }

    fn set_unsigned_int(&mut self, name: &str, value: u32) {
        self.write(name, UniformKind::UnsignedInt, bytemuck::bytes_of(&value));
    }

    fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        let raw: [f32; 3] = value.into();
        self.write(name, UniformKind::Vec3, bytemuck::cast_slice(&raw));
    }

    fn set_mat4(&mut self, name: &str, value: Matrix4<f32>) {
        let raw: [[f32; 4]; 4] = value.into();
        self.write(name, UniformKind::Mat4, bytemuck::cast_slice(&raw));
    }
}

/// Material properties as delivered by the asset importer.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub opacity: f32,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            ambient: [0.1, 0.1, 0.1],
            diffuse: [0.7, 0.7, 0.7],
            specular: [0.5, 0.5, 0.5],
            shininess: 32.0,
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    uniforms: BTreeMap<String, UniformValue>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uniforms: BTreeMap::new(),
        }
    }

    pub fn from_desc(desc: &MaterialDesc) -> Self {
        let mut material = Self::new(desc.name.clone());
        material.set("material.ambient", UniformValue::Vec3(desc.ambient.into()));
        material.set("material.diffuse", UniformValue::Vec3(desc.diffuse.into()));
        material.set("material.specular", UniformValue::Vec3(desc.specular.into()));
        material.set("material.shininess", UniformValue::Float(desc.shininess));
        material.set("material.opacity", UniformValue::Float(desc.opacity));
        material.set("material.lit", UniformValue::Bool(true));
        material
    }

    pub fn set(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Activates the sink and pushes every uniform of this material into it.
    pub fn apply(&self, sink: &mut dyn UniformSink) {
        sink.activate();
        for (name, value) in &self.uniforms {
            sink.set_value(name, value);
        }
    }
}

/// Materials that can be edited in place, addressed by the handles entities
/// carry.
pub trait MaterialStore {
    fn edit_material(&mut self, handle: MaterialHandle) -> Option<&mut Material>;
}

impl MaterialStore for Vec<Material> {
    fn edit_material(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.get_mut(handle.0)
    }
}

/// Tracks the currently bound material during a pass.
#[derive(Debug, Default)]
pub struct MaterialBinder {
    bound: Option<MaterialHandle>,
    binds: usize,
    skipped: usize,
}

impl MaterialBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `material` differs from the bound one and the
    /// caller has to issue the bind.
    pub fn bind(&mut self, material: MaterialHandle) -> bool {
        if self.bound == Some(material) {
            self.skipped += 1;
            return false;
        }
        self.bound = Some(material);
        self.binds += 1;
        true
    }

    pub fn binds(&self) -> usize {
        self.binds
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Groups draws by material identity. The sort is stable, so items of one
/// material keep their depth-first order.
pub fn sort_by_material(queue: &mut [RenderItem]) {
    queue.sort_by_key(|item| item.material);
}
