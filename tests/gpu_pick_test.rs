//! Picking against a real device. Needs a GPU adapter, so it only runs with
//! the `integration-tests` feature.
#![cfg(feature = "integration-tests")]

use cgmath::{Deg, Point3};
use scratch_editor::{
    NodeId, SceneGraph,
    camera::{Camera, CameraController, CameraResources, Projection},
    config::LightConfig,
    data_structures::entity::EntityDesc,
    material::{Material, MaterialDesc, UniformValue},
    pick::{self, GpuPickBackend},
    pipelines::{
        Pipelines,
        light::{LightResources, LightUniform},
    },
    resources::{self, ResourceStore},
};

const SIZE: (u32, u32) = (128, 96);

async fn device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .expect("no GPU adapter");
    adapter
        .request_device(&wgpu::DeviceDescriptor::default())
        .await
        .expect("no GPU device")
}

#[test]
fn cube_in_front_of_the_camera_is_picked() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (device, queue) = runtime.block_on(device());

    let projection = Projection::new(SIZE.0, SIZE.1, Deg(45.0), 0.1, 100.0);
    let camera = CameraResources::new(
        &device,
        Camera::new(Point3::new(0.0, 0.0, 3.0), Deg(-90.0), Deg(0.0)),
        CameraController::new(1.0, 1.0),
        &projection,
    );
    let light = LightResources::new(&device, LightUniform::from(&LightConfig::default()));
    let pipelines = Pipelines::new(
        &device,
        wgpu::TextureFormat::Rgba8UnormSrgb,
        &camera.bind_group_layout,
        &light.bind_group_layout,
    );

    let mut store = ResourceStore::new();
    let mesh = store.add_mesh(&device, &resources::cube());
    let material = store.add_material(
        &device,
        &pipelines.material_layout,
        Material::from_desc(&MaterialDesc::default()),
    );
    // Material changes never leak into the pick colours.
    store
        .material_mut(material)
        .unwrap()
        .material
        .set("material.diffuse", UniformValue::Vec3([1.0, 0.0, 0.0].into()));
    store.sync_materials(&queue);

    let mut graph = SceneGraph::new();
    let node = graph
        .create_node(NodeId::ROOT, Some(EntityDesc::new(mesh, material)))
        .unwrap();

    let mut backend = GpuPickBackend::new(
        &device,
        &queue,
        &pipelines,
        &camera.bind_group,
        store.meshes(),
        SIZE,
        &runtime,
    );
    let queue_items = graph.render_queue();
    let centre = (SIZE.0 as f64 / 2.0, SIZE.1 as f64 / 2.0);

    assert_eq!(pick::pick(&mut backend, &queue_items, centre), Some(node));
    assert_eq!(pick::pick(&mut backend, &queue_items, (1.0, 1.0)), None);
}
