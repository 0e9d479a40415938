//! Renderable entities placed by scene nodes.

use std::fmt;

use cgmath::{Matrix4, Vector3};

/// Unique identity of an entity within one editor session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Index of a mesh in the renderer's resource store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub usize);

/// Index of a material in the renderer's resource store. Draw calls are grouped
/// by this handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub usize);

/// One mesh of an entity together with the material it is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshPart {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

impl MeshPart {
    pub fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self { mesh, material }
    }
}

impl From<(MeshHandle, MaterialHandle)> for MeshPart {
    fn from((mesh, material): (MeshHandle, MaterialHandle)) -> Self {
        Self { mesh, material }
    }
}

/// What a caller supplies to place a new entity. The scene graph assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDesc {
    pub parts: Vec<MeshPart>,
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl EntityDesc {
    pub fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self::with_parts([MeshPart::new(mesh, material)])
    }

    /// An entity made of several meshes, e.g. every shape of one OBJ file.
    pub fn with_parts(parts: impl IntoIterator<Item = impl Into<MeshPart>>) -> Self {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// A placed set of mesh/material bindings.
///
/// `position` and `scale` are local to the owning node: the world matrix of
/// every part is the node transform followed by this placement. All parts are
/// picked, highlighted and moved as one.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub parts: Vec<MeshPart>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, desc: EntityDesc) -> Self {
        Self {
            id,
            position: desc.position,
            scale: desc.scale,
            parts: desc.parts,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Materials of all parts, each listed once.
    pub fn materials(&self) -> Vec<MaterialHandle> {
        let mut materials: Vec<_> = self.parts.iter().map(|part| part.material).collect();
        materials.sort();
        materials.dedup();
        materials
    }

    pub fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}
