use cgmath::{InnerSpace, Vector3};

use crate::data_structures::model::{MeshData, ModelVertex};

/**
 * Converts imported OBJ models into mesh data.
 *
 * OBJ files may come without normals. Those are calculated from the triangles
 * so that every mesh can be lit.
 */
pub fn mesh_data(models: &[tobj::Model]) -> Vec<anyhow::Result<MeshData>> {
    models.iter().map(mesh_from_obj).collect()
}

fn mesh_from_obj(m: &tobj::Model) -> anyhow::Result<MeshData> {
    let vertex_count = m.mesh.positions.len() / 3;
    if let Some(bad) = m.mesh.indices.iter().find(|i| **i as usize >= vertex_count) {
        anyhow::bail!(
            "mesh '{}' references vertex {} but only has {}",
            m.name,
            bad,
            vertex_count
        );
    }
    let has_normals = m.mesh.normals.len() >= vertex_count * 3;
    let mut vertices = (0..vertex_count)
        .map(|i| ModelVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            normal: if has_normals {
                [
                    m.mesh.normals[i * 3],
                    m.mesh.normals[i * 3 + 1],
                    m.mesh.normals[i * 3 + 2],
                ]
            } else {
                [0.0; 3]
            },
        })
        .collect::<Vec<_>>();

    if !has_normals {
        calculate_normals(&mut vertices, &m.mesh.indices);
    }

    Ok(MeshData {
        name: m.name.clone(),
        vertices,
        indices: m.mesh.indices.clone(),
        material: m.mesh.material_id,
    })
}

/// Area weighted vertex normals from the triangle list.
pub fn calculate_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks_exact(3) {
        let pos0: Vector3<f32> = vertices[c[0] as usize].position.into();
        let pos1: Vector3<f32> = vertices[c[1] as usize].position.into();
        let pos2: Vector3<f32> = vertices[c[2] as usize].position.into();
        // Not normalized: larger triangles weigh more.
        let face = (pos1 - pos0).cross(pos2 - pos0);
        for i in c {
            sums[*i as usize] += face;
        }
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(normals: Vec<f32>, indices: Vec<u32>) -> tobj::Model {
        tobj::Model {
            mesh: tobj::Mesh {
                positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                normals,
                indices,
                ..Default::default()
            },
            name: "tri".to_string(),
        }
    }

    #[test]
    fn missing_normals_are_calculated() {
        let meshes = mesh_data(&[triangle(Vec::new(), vec![0, 1, 2])]);
        let mesh = meshes[0].as_ref().unwrap();
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn imported_normals_are_kept() {
        let normals = vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let meshes = mesh_data(&[triangle(normals, vec![0, 1, 2])]);
        assert_eq!(meshes[0].as_ref().unwrap().vertices[1].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let meshes = mesh_data(&[triangle(Vec::new(), vec![0, 1, 3])]);
        assert!(meshes[0].is_err());
    }
}
