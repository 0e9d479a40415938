use crate::{
    data_structures::{
        model::{self, Vertex},
        texture::Texture,
        transform::InstanceRaw,
    },
    pipelines::forward::mk_render_pipeline,
};

/// The pick pipeline ignores lights and materials: every fragment of a draw
/// gets the draw's pick color, unblended, so it reaches the read-back
/// unchanged.
pub fn mk_pick_pipeline(
    device: &wgpu::Device,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    pick_color_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render Pipeline Layout (For picking)"),
        bind_group_layouts: &[camera_bind_group_layout, pick_color_layout],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Pick Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("pick.wgsl").into()),
    };

    mk_render_pipeline(
        device,
        "Pick Pipeline",
        &render_pipeline_layout,
        Texture::PICK_FORMAT,
        None,
        Some(Texture::DEPTH_FORMAT),
        &[model::ModelVertex::desc(), InstanceRaw::desc()],
        shader,
    )
}
