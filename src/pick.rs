//! Object picking.
//!
//! Picking renders every entity of the render queue into an offscreen color
//! target, using the color to encode the 1-based position of the entity in
//! the queue instead of its appearance. All mesh parts of one entity share
//! that color. The texel under the cursor is read back and decoded to the
//! node that owns the entity.
//!
//! The picking pipeline works as follows:
//! 1. Build a [`PickTable`] from the render queue (index `i` ⇒ entity ⇒ node)
//! 2. Map the cursor to a framebuffer texel, honoring the target's [`FramebufferOrigin`]
//! 3. Let a [`PickBackend`] render all draws and read back that single texel
//! 4. Decode the color and look the index up in the table
//!
//! Anything that goes wrong on the way resolves to "nothing picked".

use std::iter;

use log::{debug, error, info, warn};
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    data_structures::{
        model::{DrawMesh, Mesh},
        scene_graph::{NodeId, RenderItem},
        texture::Texture,
        transform::Transform,
    },
    pipelines::Pipelines,
};

/// Highest index the 24 bit RGB encoding can carry.
pub const MAX_PICK_INDEX: u32 = 0x00FF_FFFF;

/// Encodes a 1-based entity index as an opaque RGBA8 color. `0` is reserved for
/// the cleared background.
pub fn encode_pick_index(index: u32) -> [u8; 4] {
    debug_assert!(index <= MAX_PICK_INDEX);
    [
        (index & 0xFF) as u8,
        ((index >> 8) & 0xFF) as u8,
        ((index >> 16) & 0xFF) as u8,
        255,
    ]
}

/// Inverse of [`encode_pick_index`]. Alpha is ignored; black means no entity.
pub fn decode_pick_color(color: [u8; 4]) -> Option<u32> {
    let index = u32::from(color[0]) | u32::from(color[1]) << 8 | u32::from(color[2]) << 16;
    (index != 0).then_some(index)
}

/// Where row 0 of a framebuffer lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferOrigin {
    /// wgpu textures, window coordinates
    TopLeft,
    /// OpenGL style framebuffers
    BottomLeft,
}

/// Maps a cursor position (physical pixels, origin top-left) to the texel of a
/// framebuffer of `size`. Positions outside the framebuffer map to `None`.
pub fn cursor_to_texel(
    cursor: (f64, f64),
    size: (u32, u32),
    origin: FramebufferOrigin,
) -> Option<(u32, u32)> {
    let (x, y) = cursor;
    let (width, height) = size;
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let (x, y) = (x.floor() as u64, y.floor() as u64);
    if x >= u64::from(width) || y >= u64::from(height) {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    match origin {
        FramebufferOrigin::TopLeft => Some((x, y)),
        FramebufferOrigin::BottomLeft => Some((x, height - 1 - y)),
    }
}

/// One draw of the picking pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickDraw {
    pub index: u32,
    pub color: [u8; 4],
    pub item: RenderItem,
}

/// Correspondence between pick indices and the entities that issued the draws.
///
/// Adjacent queue items of the same entity get the same index, so a
/// multi-mesh entity is one pick target.
#[derive(Clone, Debug, Default)]
pub struct PickTable {
    draws: Vec<PickDraw>,
    // owners[i - 1] is the node owning the entity with index i
    owners: Vec<NodeId>,
}

impl PickTable {
    pub fn new(queue: &[RenderItem]) -> Self {
        let mut draws = Vec::with_capacity(queue.len());
        let mut owners: Vec<NodeId> = Vec::new();
        let mut current = None;
        for item in queue {
            if current != Some(item.entity) {
                current = Some(item.entity);
                owners.push(item.node);
            }
            let index = match u32::try_from(owners.len()) {
                Ok(index) if index <= MAX_PICK_INDEX => index,
                _ => {
                    warn!(
                        "{} ({}) exceeds the pick index range and cannot be picked",
                        item.entity, item.node
                    );
                    continue;
                }
            };
            draws.push(PickDraw {
                index,
                color: encode_pick_index(index),
                item: *item,
            });
        }
        Self { draws, owners }
    }

    pub fn draws(&self) -> &[PickDraw] {
        &self.draws
    }

    pub fn resolve(&self, index: u32) -> Option<NodeId> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.owners.get(position).copied()
    }

    /// Number of pickable entities.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Progress of a pick within the editor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PickState {
    #[default]
    Idle,
    /// A click was registered at this cursor position and awaits the pass.
    Requested { cursor: (f64, f64) },
    /// The pass ran; `None` means background or a failed read-back.
    Resolved(Option<NodeId>),
}

impl PickState {
    pub fn request(&mut self, cursor: (f64, f64)) {
        *self = PickState::Requested { cursor };
    }

    /// Takes a resolved result and returns to `Idle`.
    pub fn take_resolved(&mut self) -> Option<Option<NodeId>> {
        match std::mem::take(self) {
            PickState::Resolved(node) => Some(node),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Renders pick draws and reads a single texel back.
pub trait PickBackend {
    /// Size of the pick target in texels.
    fn size(&self) -> (u32, u32);

    fn origin(&self) -> FramebufferOrigin;

    /// Renders `draws` (cleared to zero first) and returns the RGBA8 value of
    /// `texel`.
    fn render_ids(&mut self, draws: &[PickDraw], texel: (u32, u32)) -> anyhow::Result<[u8; 4]>;
}

/// Runs one picking pass over `queue` and resolves the node under `cursor`.
pub fn pick(
    backend: &mut dyn PickBackend,
    queue: &[RenderItem],
    cursor: (f64, f64),
) -> Option<NodeId> {
    let texel = match cursor_to_texel(cursor, backend.size(), backend.origin()) {
        Some(texel) => texel,
        None => {
            debug!("Cursor {:?} is outside of the framebuffer", cursor);
            return None;
        }
    };
    let table = PickTable::new(queue);
    let color = match backend.render_ids(table.draws(), texel) {
        Ok(color) => color,
        Err(e) => {
            error!("Pick read-back failed: {:#}", e);
            return None;
        }
    };
    let index = decode_pick_color(color)?;
    let node = table.resolve(index);
    match node {
        Some(node) => info!("Picked index {} ({})", index, node),
        None => warn!("Pick index {} has no live entity", index),
    }
    node
}

/// The pick color travels as a 16 byte uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PickColorUniform {
    color: [f32; 4],
}

impl From<[u8; 4]> for PickColorUniform {
    fn from(rgba: [u8; 4]) -> Self {
        // Unorm targets store round(v * 255), so k / 255 lands exactly on k.
        Self {
            color: rgba.map(|c| f32::from(c) / 255.0),
        }
    }
}

pub fn pick_color_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("pick_color_bind_group_layout"),
    })
}

/// Picking on the GPU: the queue is drawn with the pick pipeline into an
/// offscreen [`Texture::PICK_FORMAT`] target and one texel is copied back.
pub struct GpuPickBackend<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    pipelines: &'a Pipelines,
    camera_bind_group: &'a wgpu::BindGroup,
    meshes: &'a [Mesh],
    size: (u32, u32),
    async_runtime: &'a tokio::runtime::Runtime,
}

impl<'a> GpuPickBackend<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        pipelines: &'a Pipelines,
        camera_bind_group: &'a wgpu::BindGroup,
        meshes: &'a [Mesh],
        size: (u32, u32),
        async_runtime: &'a tokio::runtime::Runtime,
    ) -> Self {
        Self {
            device,
            queue,
            pipelines,
            camera_bind_group,
            meshes,
            size,
            async_runtime,
        }
    }

    /// Picks against the window surface of `ctx`.
    pub fn from_context(
        ctx: &'a Context,
        meshes: &'a [Mesh],
        async_runtime: &'a tokio::runtime::Runtime,
    ) -> Self {
        Self::new(
            &ctx.device,
            &ctx.queue,
            &ctx.pipelines,
            &ctx.camera.bind_group,
            meshes,
            (ctx.config.width, ctx.config.height),
            async_runtime,
        )
    }
}

impl PickBackend for GpuPickBackend<'_> {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn origin(&self) -> FramebufferOrigin {
        FramebufferOrigin::TopLeft
    }

    fn render_ids(&mut self, draws: &[PickDraw], texel: (u32, u32)) -> anyhow::Result<[u8; 4]> {
        let device = self.device;
        let (width, height) = self.size;
        let target = Texture::create_pick_texture(device, [width, height], "Pick texture");
        let depth = Texture::create_depth_texture(device, [width, height], "Pick depth texture");

        // Buffers have to outlive the pass that references them.
        let mut per_draw = Vec::with_capacity(draws.len());
        for draw in draws {
            let mesh = match self.meshes.get(draw.item.mesh.0) {
                Some(mesh) => mesh,
                None => {
                    warn!("{} references missing mesh {:?}", draw.item.node, draw.item.mesh);
                    continue;
                }
            };
            let instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Pick instance buffer"),
                contents: bytemuck::cast_slice(&[Transform::raw_from_matrix(draw.item.world, false)]),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let color = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Pick color buffer"),
                contents: bytemuck::cast_slice(&[PickColorUniform::from(draw.color)]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.pipelines.pick_color_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: color.as_entire_binding(),
                }],
                label: Some("pick_color_bind_group"),
            });
            per_draw.push((mesh, instance, group));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pick Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pick Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.pipelines.pick);
            render_pass.set_bind_group(0, self.camera_bind_group, &[]);
            for (mesh, instance, group) in &per_draw {
                render_pass.set_bind_group(1, group, &[]);
                render_pass.draw_mesh_instanced(mesh, instance, 0..1);
            }
        }

        // Rows of a texel copy are aligned to 256 bytes, even for one texel.
        let row = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick read-back buffer"),
            size: u64::from(row),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: texel.0,
                    y: texel.1,
                    z: 0,
                },
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let color = self
            .async_runtime
            .block_on(read_texel(buffer_slice, device))?;
        output_buffer.unmap();
        Ok(color)
    }
}

async fn read_texel(
    buffer_slice: wgpu::BufferSlice<'_>,
    device: &wgpu::Device,
) -> anyhow::Result<[u8; 4]> {
    // NOTE: the mapping has to be requested THEN device.poll() before awaiting,
    // otherwise the future never resolves.
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only goes away when the read-back was abandoned.
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    })?;
    rx.receive()
        .await
        .ok_or_else(|| anyhow::anyhow!("pick buffer mapping was dropped"))??;

    let data = buffer_slice.get_mapped_range();
    let mut color = [0; 4];
    color.copy_from_slice(&data[..4]);
    Ok(color)
}

#[cfg(test)]
mod tests {
    use cgmath::{Matrix4, SquareMatrix};

    use super::*;
    use crate::data_structures::entity::{EntityId, MaterialHandle, MeshHandle};

    fn item(node: u32) -> RenderItem {
        part(node, 0)
    }

    fn part(node: u32, mesh: usize) -> RenderItem {
        RenderItem {
            node: NodeId(node),
            entity: EntityId(node),
            mesh: MeshHandle(mesh),
            material: MaterialHandle(0),
            world: Matrix4::identity(),
        }
    }

    /// Every draw covers the whole target; later draws win.
    struct Fullscreen {
        size: (u32, u32),
        origin: FramebufferOrigin,
        seen_texel: Option<(u32, u32)>,
    }

    impl PickBackend for Fullscreen {
        fn size(&self) -> (u32, u32) {
            self.size
        }
        fn origin(&self) -> FramebufferOrigin {
            self.origin
        }
        fn render_ids(&mut self, draws: &[PickDraw], texel: (u32, u32)) -> anyhow::Result<[u8; 4]> {
            self.seen_texel = Some(texel);
            Ok(draws.last().map_or([0; 4], |d| d.color))
        }
    }

    struct Broken;

    impl PickBackend for Broken {
        fn size(&self) -> (u32, u32) {
            (4, 4)
        }
        fn origin(&self) -> FramebufferOrigin {
            FramebufferOrigin::TopLeft
        }
        fn render_ids(&mut self, _: &[PickDraw], _: (u32, u32)) -> anyhow::Result<[u8; 4]> {
            anyhow::bail!("device lost")
        }
    }

    #[test]
    fn encoding_covers_the_8_bit_range() {
        for index in 1..=255 {
            assert_eq!(decode_pick_color(encode_pick_index(index)), Some(index));
        }
        assert_eq!(decode_pick_color([0, 0, 0, 0]), None);
        assert_eq!(decode_pick_color([0, 0, 0, 255]), None);
    }

    #[test]
    fn encoding_spreads_large_indices_over_rgb() {
        assert_eq!(encode_pick_index(256), [0, 1, 0, 255]);
        assert_eq!(encode_pick_index(0x12_3456), [0x56, 0x34, 0x12, 255]);
        assert_eq!(
            decode_pick_color(encode_pick_index(MAX_PICK_INDEX)),
            Some(MAX_PICK_INDEX)
        );
    }

    #[test]
    fn cursor_mapping_honors_the_origin() {
        let size = (800, 600);
        assert_eq!(
            cursor_to_texel((10.7, 20.2), size, FramebufferOrigin::TopLeft),
            Some((10, 20))
        );
        assert_eq!(
            cursor_to_texel((10.0, 20.0), size, FramebufferOrigin::BottomLeft),
            Some((10, 579))
        );
        assert_eq!(
            cursor_to_texel((0.0, 599.0), size, FramebufferOrigin::BottomLeft),
            Some((0, 0))
        );
    }

    #[test]
    fn cursor_outside_the_framebuffer_maps_to_nothing() {
        let size = (800, 600);
        assert_eq!(cursor_to_texel((800.0, 10.0), size, FramebufferOrigin::TopLeft), None);
        assert_eq!(cursor_to_texel((10.0, 600.0), size, FramebufferOrigin::TopLeft), None);
        assert_eq!(cursor_to_texel((-0.5, 10.0), size, FramebufferOrigin::TopLeft), None);
        assert_eq!(cursor_to_texel((f64::NAN, 1.0), size, FramebufferOrigin::TopLeft), None);
        assert_eq!(cursor_to_texel((0.0, 0.0), (0, 0), FramebufferOrigin::BottomLeft), None);
    }

    #[test]
    fn table_is_one_based_in_queue_order() {
        let table = PickTable::new(&[item(7), item(3), item(9)]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve(0), None);
        assert_eq!(table.resolve(1), Some(NodeId(7)));
        assert_eq!(table.resolve(3), Some(NodeId(9)));
        assert_eq!(table.resolve(4), None);
        assert_eq!(table.draws()[1].color, encode_pick_index(2));
    }

    #[test]
    fn parts_of_one_entity_share_an_index() {
        let table = PickTable::new(&[part(7, 0), part(7, 1), part(3, 2), part(9, 0), part(9, 3)]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.draws().len(), 5);
        let indices: Vec<u32> = table.draws().iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![1, 1, 2, 3, 3]);
        assert_eq!(table.draws()[1].color, table.draws()[0].color);
        assert_eq!(table.resolve(1), Some(NodeId(7)));
        assert_eq!(table.resolve(2), Some(NodeId(3)));
        assert_eq!(table.resolve(3), Some(NodeId(9)));
        assert_eq!(table.resolve(4), None);
    }

    #[test]
    fn any_part_of_an_entity_picks_its_node() {
        let mut backend = Fullscreen {
            size: (8, 8),
            origin: FramebufferOrigin::TopLeft,
            seen_texel: None,
        };
        // The last draw is the second mesh of node 5.
        let picked = pick(&mut backend, &[item(4), part(5, 0), part(5, 1)], (1.0, 1.0));
        assert_eq!(picked, Some(NodeId(5)));
    }

    #[test]
    fn unorm_colors_land_on_their_byte() {
        for k in 0..=255u8 {
            let uniform = PickColorUniform::from([k, k, k, 255]);
            assert_eq!(uniform.color[3], 1.0);
            for channel in &uniform.color[..3] {
                let stored = (channel * 255.0).round();
                assert_eq!(stored as u8, k, "byte {} stored as {}", k, stored);
            }
        }
        for index in [1, 0x01_0203, MAX_PICK_INDEX] {
            let uniform = PickColorUniform::from(encode_pick_index(index));
            let stored = uniform.color.map(|c| (c * 255.0).round() as u8);
            assert_eq!(decode_pick_color(stored), Some(index));
        }
    }

    #[test]
    fn pick_resolves_the_top_most_draw() {
        let mut backend = Fullscreen {
            size: (64, 32),
            origin: FramebufferOrigin::BottomLeft,
            seen_texel: None,
        };
        let picked = pick(&mut backend, &[item(4), item(5)], (1.0, 1.0));
        assert_eq!(picked, Some(NodeId(5)));
        assert_eq!(backend.seen_texel, Some((1, 30)));
    }

    #[test]
    fn background_and_outside_clicks_pick_nothing() {
        let mut backend = Fullscreen {
            size: (64, 32),
            origin: FramebufferOrigin::TopLeft,
            seen_texel: None,
        };
        assert_eq!(pick(&mut backend, &[], (1.0, 1.0)), None);
        assert_eq!(pick(&mut backend, &[item(1)], (64.0, 1.0)), None);
    }

    #[test]
    fn read_back_failure_picks_nothing() {
        assert_eq!(pick(&mut Broken, &[item(1)], (1.0, 1.0)), None);
    }

    #[test]
    fn pick_state_hands_out_results_once() {
        let mut state = PickState::default();
        state.request((3.0, 4.0));
        assert_eq!(state.take_resolved(), None);
        assert_eq!(state, PickState::Requested { cursor: (3.0, 4.0) });
        state = PickState::Resolved(Some(NodeId(2)));
        assert_eq!(state.take_resolved(), Some(Some(NodeId(2))));
        assert_eq!(state, PickState::Idle);
    }
}
