//! Forward pass.
//!
//! The render queue is sorted by material so that consecutive draws share a
//! bind group; the [`MaterialBinder`] skips the redundant binds. All instance
//! data of a frame lives in one buffer and each draw selects its instance by
//! range.

use std::iter;

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    data_structures::{
        model::DrawMesh,
        scene_graph::{NodeId, RenderItem},
        transform::{InstanceRaw, Transform},
    },
    material::{MaterialBinder, sort_by_material},
    resources::ResourceStore,
};

const EMPTY_INSTANCE: [u8; std::mem::size_of::<InstanceRaw>()] = [0; std::mem::size_of::<InstanceRaw>()];

/// Counters of one forward pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draws: usize,
    pub material_binds: usize,
}

/// Sorted draw list and the instance data belonging to it.
pub fn prepare_draws(
    queue: &[RenderItem],
    selected: Option<NodeId>,
) -> (Vec<RenderItem>, Vec<InstanceRaw>) {
    let mut sorted = queue.to_vec();
    sort_by_material(&mut sorted);
    let instances = sorted
        .iter()
        .map(|item| Transform::raw_from_matrix(item.world, Some(item.node) == selected))
        .collect();
    (sorted, instances)
}

/// Draws `queue` into `view`, clearing it first.
pub fn draw_scene(
    ctx: &Context,
    resources: &ResourceStore,
    queue: &[RenderItem],
    selected: Option<NodeId>,
    view: &wgpu::TextureView,
) -> DrawStats {
    let (sorted, instances) = prepare_draws(queue, selected);
    // Zero sized buffers are not allowed; an empty scene still clears.
    let instance_buffer = ctx
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: if instances.is_empty() {
                &EMPTY_INSTANCE
            } else {
                bytemuck::cast_slice(&instances)
            },
            usage: wgpu::BufferUsages::VERTEX,
        });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
    let mut stats = DrawStats::default();
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ctx.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(&ctx.pipelines.forward);
        render_pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
        render_pass.set_bind_group(1, &ctx.light.bind_group, &[]);

        let mut binder = MaterialBinder::new();
        for (idx, item) in sorted.iter().enumerate() {
            let (Some(mesh), Some(material)) =
                (resources.mesh(item.mesh), resources.material(item.material))
            else {
                warn!("{} references a missing mesh or material", item.node);
                continue;
            };
            if binder.bind(item.material) {
                render_pass.set_bind_group(2, &material.bind_group, &[]);
            }
            let idx = idx as u32;
            render_pass.draw_mesh_instanced(mesh, &instance_buffer, idx..idx + 1);
            stats.draws += 1;
        }
        stats.material_binds = binder.binds();
    }
    ctx.queue.submit(iter::once(encoder.finish()));
    stats
}
