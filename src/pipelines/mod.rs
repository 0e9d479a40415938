//! Render pipelines.
//!
//! - `forward` draws the lit scene into the surface
//! - `pick` draws pick indices into the offscreen picking target
//! - `light` holds the directional light uniform shared by the forward pass
//!
//! Bind groups, in slot order:
//!
//! | pipeline | 0      | 1          | 2        |
//! |----------|--------|------------|----------|
//! | forward  | camera | light      | material |
//! | pick     | camera | pick color |          |

pub mod forward;
pub mod light;
pub mod pick;

#[derive(Debug)]
pub struct Pipelines {
    pub forward: wgpu::RenderPipeline,
    pub pick: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub pick_color_layout: wgpu::BindGroupLayout,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material_layout = forward::material_layout(device);
        let pick_color_layout = crate::pick::pick_color_layout(device);
        let forward = forward::mk_forward_pipeline(
            device,
            surface_format,
            camera_bind_group_layout,
            light_bind_group_layout,
            &material_layout,
        );
        let pick = pick::mk_pick_pipeline(device, camera_bind_group_layout, &pick_color_layout);
        Self {
            forward,
            pick,
            material_layout,
            pick_color_layout,
        }
    }
}
