//! Loading meshes/materials from external files and owning their GPU copies.

use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use cgmath::Vector3;
use log::{info, warn};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        entity::{MaterialHandle, MeshHandle},
        model::{Mesh, MeshData, ModelVertex},
    },
    material::{Material, MaterialDesc, MaterialStore, UniformBlock, UniformLayout},
};

pub mod mesh;

/// Everything an OBJ file (and its MTL files) provides.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialDesc>,
}

/// Loads an OBJ model. A missing or malformed OBJ file is an error; missing
/// MTL files only cost the materials.
pub async fn load_model_obj(path: &Path) -> anyhow::Result<ModelData> {
    let obj_text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read {:?}: {}", path, e))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path: PathBuf = base_dir.join(p);
            async move {
                match tokio::fs::read_to_string(&mtl_path).await {
                    Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                    Err(e) => {
                        warn!("Material library {:?} not readable: {}", mtl_path, e);
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await?;

    let materials = match obj_materials {
        Ok(materials) => materials.iter().map(material_desc).collect(),
        Err(e) => {
            warn!("{:?} has no usable materials ({}), using the default", path, e);
            Vec::new()
        }
    };

    let meshes = mesh::mesh_data(&models)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, result)| match result {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                warn!("Mesh at index {} in file {:?} could not be loaded: {}", idx, path, e);
                None
            }
        })
        .collect::<Vec<_>>();
    if meshes.is_empty() {
        anyhow::bail!("{:?} does not contain any usable mesh", path);
    }

    info!(
        "Loaded {:?}: {} meshes, {} materials",
        path,
        meshes.len(),
        materials.len()
    );
    Ok(ModelData { meshes, materials })
}

fn material_desc(m: &tobj::Material) -> MaterialDesc {
    let default = MaterialDesc::default();
    MaterialDesc {
        name: m.name.clone(),
        ambient: m.ambient.unwrap_or(default.ambient),
        diffuse: m.diffuse.unwrap_or(default.diffuse),
        specular: m.specular.unwrap_or(default.specular),
        shininess: m.shininess.unwrap_or(default.shininess),
        opacity: m.dissolve.unwrap_or(default.opacity),
    }
}

/// Unit cube centered on the origin with outward normals.
pub fn cube() -> MeshData {
    let x = Vector3::unit_x();
    let y = Vector3::unit_y();
    let z = Vector3::unit_z();
    // (normal, u, v) with u × v = normal, so the corners below wind CCW.
    let faces = [(x, y, z), (-x, z, y), (y, z, x), (-y, x, z), (z, x, y), (-z, y, x)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for corner in [-u - v, u - v, u + v, v - u] {
            vertices.push(ModelVertex {
                position: ((normal + corner) * 0.5).into(),
                normal: normal.into(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        name: "Cube".to_string(),
        vertices,
        indices,
        material: None,
    }
}

/// A material with its uniform buffer (group 2 of the forward pipeline).
#[derive(Debug)]
pub struct GpuMaterial {
    pub material: Material,
    block: UniformBlock,
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, material: Material) -> Self {
        let mut block = UniformBlock::new(UniformLayout::forward_material());
        material.apply(&mut block);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", material.name)),
            contents: block.bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        block.mark_clean();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(&format!("{} Material Bind Group", material.name)),
        });
        Self {
            material,
            block,
            buffer,
            bind_group,
        }
    }

    /// Re-applies the material and uploads the block if anything changed.
    pub fn sync(&mut self, queue: &wgpu::Queue) {
        self.material.apply(&mut self.block);
        if self.block.is_dirty() {
            queue.write_buffer(&self.buffer, 0, self.block.bytes());
            self.block.mark_clean();
        }
    }
}

/// GPU meshes and materials, addressed by the handles entities carry.
#[derive(Debug, Default)]
pub struct ResourceStore {
    meshes: Vec<Mesh>,
    materials: Vec<GpuMaterial>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, device: &wgpu::Device, data: &MeshData) -> MeshHandle {
        self.meshes.push(Mesh::upload(device, data));
        MeshHandle(self.meshes.len() - 1)
    }

    pub fn add_material(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        material: Material,
    ) -> MaterialHandle {
        self.materials.push(GpuMaterial::new(device, layout, material));
        MaterialHandle(self.materials.len() - 1)
    }

    /// Uploads a model. Returns one (mesh, material) pair per mesh; meshes
    /// without a material get `fallback`.
    pub fn add_model(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        model: &ModelData,
        fallback: MaterialHandle,
    ) -> Vec<(MeshHandle, MaterialHandle)> {
        let materials: Vec<MaterialHandle> = model
            .materials
            .iter()
            .map(|desc| self.add_material(device, layout, Material::from_desc(desc)))
            .collect();
        model
            .meshes
            .iter()
            .map(|data| {
                let material = data
                    .material
                    .and_then(|idx| materials.get(idx).copied())
                    .unwrap_or(fallback);
                (self.add_mesh(device, data), material)
            })
            .collect()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&GpuMaterial> {
        self.materials.get(handle.0)
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut GpuMaterial> {
        self.materials.get_mut(handle.0)
    }

    pub fn sync_materials(&mut self, queue: &wgpu::Queue) {
        for material in &mut self.materials {
            material.sync(queue);
        }
    }
}

impl MaterialStore for ResourceStore {
    fn edit_material(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.material_mut(handle).map(|gpu| &mut gpu.material)
    }
}
