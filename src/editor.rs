//! Editor state and the application event loop.
//!
//! All mutable editor state lives in [`Editor`], which is handed through the
//! loop instead of living in globals. One frame runs these phases in order:
//! 1. Input: winit events are folded into [`InputState`] as they arrive
//! 2. Pick: a left click requests a pick, the [`PickBackend`] resolves it
//! 3. Edit: the [`SelectionController`] runs the gizmo on the selected node
//! 4. Draw: the render queue is drawn with the selection highlighted
//!
//! Phases 1 to 3 are headless ([`Editor::frame`]) and can be driven by tests
//! with any [`PickBackend`]. Phase 4 and the window live in the private `App`.

use std::sync::Arc;

use cgmath::Vector3;
use instant::Instant;
use log::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::{EditorConfig, ModelPlacement},
    context::Context,
    data_structures::{
        entity::{EntityDesc, MaterialHandle, MeshHandle},
        scene_graph::{NodeId, RenderItem, SceneGraph},
        transform::Transform,
    },
    error::SceneError,
    gizmo::{DragGizmo, GizmoInput},
    material::{Material, MaterialDesc, MaterialStore, UniformValue},
    pick::{self, GpuPickBackend, PickBackend, PickState},
    render,
    resources::{self, ResourceStore},
    selection::{EditOutcome, SelectionController},
};

/// Input gathered between two frames.
///
/// Edges (clicks, key presses, drag motion) are consumed by the next
/// [`Editor::frame`]; levels (cursor, held buttons) persist.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    cursor: (f64, f64),
    drag_delta: (f64, f64),
    clicked: bool,
    dragging: bool,
    pointer_captured: bool,
    keys: Vec<KeyCode>,
    close_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor in physical pixels, origin top-left.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        if self.dragging {
            self.drag_delta.0 += x - self.cursor.0;
            self.drag_delta.1 += y - self.cursor.1;
        }
        self.cursor = (x, y);
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left if pressed => self.clicked = true,
            MouseButton::Middle => {
                self.dragging = pressed;
                if !pressed {
                    self.drag_delta = (0.0, 0.0);
                }
            }
            _ => (),
        }
    }

    pub fn key_pressed(&mut self, key: KeyCode) {
        self.keys.push(key);
    }

    /// While captured (by an overlay or the camera) clicks and drags do not
    /// reach the scene.
    pub fn set_pointer_captured(&mut self, captured: bool) {
        self.pointer_captured = captured;
    }

    pub fn pointer_captured(&self) -> bool {
        self.pointer_captured
    }

    pub fn cursor(&self) -> (f64, f64) {
        self.cursor
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    fn gizmo_input(&self) -> GizmoInput {
        GizmoInput {
            drag_delta: self.drag_delta,
            dragging: self.dragging && !self.pointer_captured,
        }
    }

    fn end_frame(&mut self) {
        self.clicked = false;
        self.drag_delta = (0.0, 0.0);
        self.keys.clear();
    }
}

/// What the draw phase needs from a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutput {
    pub queue: Vec<RenderItem>,
    /// Selected node, only if it still exists.
    pub highlighted: Option<NodeId>,
    pub edit: EditOutcome,
}

/// The whole editor state: scene, selection, gizmo, pending pick and input.
#[derive(Debug)]
pub struct Editor {
    pub graph: SceneGraph,
    pub selection: SelectionController,
    pub gizmo: DragGizmo,
    pub input: InputState,
    pick_state: PickState,
    title: String,
}

impl Editor {
    pub fn new(graph: SceneGraph, gizmo: DragGizmo) -> Self {
        let mut editor = Self {
            graph,
            selection: SelectionController::new(),
            gizmo,
            input: InputState::new(),
            pick_state: PickState::Idle,
            title: String::new(),
        };
        editor.title = editor.window_title();
        editor
    }

    pub fn pick_state(&self) -> PickState {
        self.pick_state
    }

    /// Label of the window, refreshed every frame.
    pub fn title(&self) -> &str {
        &self.title
    }

    fn window_title(&self) -> String {
        let label = self.graph.scene_label();
        match self.selection.resolve(&self.graph) {
            Some(node) => format!("{} - {}", label, node.name()),
            None => label,
        }
    }

    /// Editor hotkeys. Gizmo keys share letters with the camera, so the
    /// caller only forwards keys while the camera is not engaged.
    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Escape => self.input.request_close(),
            KeyCode::Tab => {
                self.selection.cycle(&self.graph);
            }
            KeyCode::Delete | KeyCode::Backspace => self.delete_selected(),
            _ => {
                self.gizmo.handle_key(key);
            }
        }
    }

    /// Removes the selected node and its subtree.
    pub fn delete_selected(&mut self) {
        let Some(id) = self.selection.selected() else {
            return;
        };
        match self.graph.remove_node(id) {
            Ok(node) => info!("Deleted {} ({})", id, node.name()),
            Err(e) => warn!("Cannot delete {}: {}", id, e),
        }
    }

    /// Materials of the selected entity, empty without a live selection.
    pub fn selected_materials(&self) -> Vec<MaterialHandle> {
        self.selection
            .resolve(&self.graph)
            .and_then(|node| node.entity())
            .map(|entity| entity.materials())
            .unwrap_or_default()
    }

    /// Sets one uniform on every material of the selected entity and returns
    /// how many materials took it. GPU copies pick the change up on the next
    /// [`ResourceStore::sync_materials`].
    pub fn set_selected_material_uniform(
        &self,
        store: &mut dyn MaterialStore,
        name: &str,
        value: UniformValue,
    ) -> usize {
        let materials = self.selected_materials();
        if materials.is_empty() {
            debug!("No selected entity to set {} on", name);
            return 0;
        }
        let mut changed = 0;
        for handle in materials {
            match store.edit_material(handle) {
                Some(material) => {
                    material.set(name, value);
                    changed += 1;
                }
                None => warn!("Material {:?} of the selection is missing", handle),
            }
        }
        info!("Set {} on {} material(s) of {:?}", name, changed, self.selection.selected());
        changed
    }

    /// Runs the input, pick and edit phases of one frame.
    pub fn frame(&mut self, backend: &mut dyn PickBackend) -> FrameOutput {
        for key in std::mem::take(&mut self.input.keys) {
            self.handle_key(key);
        }

        if self.input.clicked && !self.input.pointer_captured {
            self.pick_state.request(self.input.cursor);
        }
        if let PickState::Requested { cursor } = self.pick_state {
            let queue = self.graph.render_queue();
            self.pick_state = PickState::Resolved(pick::pick(backend, &queue, cursor));
        }
        if let Some(picked) = self.pick_state.take_resolved() {
            self.selection.select(picked);
        }

        let edit = self.selection.frame(
            &mut self.graph,
            &mut self.gizmo,
            &self.input.gizmo_input(),
        );
        if edit == EditOutcome::Applied {
            debug!("Edited {:?}", self.selection.selected());
        }

        self.title = self.window_title();
        self.input.end_frame();
        FrameOutput {
            queue: self.graph.render_queue(),
            highlighted: self.selection.resolve(&self.graph).map(|node| node.id()),
            edit,
        }
    }
}

/// Attaches one model below the root as a single node whose entity owns every
/// mesh of the model, so the model is picked and moved as a whole.
pub fn place_model(
    graph: &mut SceneGraph,
    name: &str,
    transform: Transform,
    parts: &[(MeshHandle, MaterialHandle)],
) -> Result<NodeId, SceneError> {
    let node = graph.create_node(
        NodeId::ROOT,
        Some(EntityDesc::with_parts(parts.iter().copied())),
    )?;
    graph.set_name(node, name)?;
    graph.set_transform(node, transform)?;
    Ok(node)
}

fn placement_name(placement: &ModelPlacement) -> String {
    placement.name.clone().unwrap_or_else(|| {
        placement
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Model".to_string())
    })
}

/// Loads the configured models (or three cubes if there are none) into the
/// GPU store and the scene graph.
fn build_scene(
    ctx: &Context,
    resources: &mut ResourceStore,
    config: &EditorConfig,
    async_runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<SceneGraph> {
    let layout = &ctx.pipelines.material_layout;
    let mut graph = SceneGraph::new();
    graph.set_scene_path(config.scene_path.clone());

    if config.models.is_empty() {
        info!("No models configured, using the default scene");
        let cube = resources.add_mesh(&ctx.device, &resources::cube());
        let colours = [
            ("Red", [0.8, 0.2, 0.2]),
            ("Green", [0.2, 0.8, 0.3]),
            ("Blue", [0.2, 0.4, 0.9]),
        ];
        for (idx, (name, diffuse)) in colours.into_iter().enumerate() {
            let material = resources.add_material(
                &ctx.device,
                layout,
                Material::from_desc(&MaterialDesc {
                    name: name.to_string(),
                    diffuse,
                    ..Default::default()
                }),
            );
            let position = Vector3::new(idx as f32 * 2.5 - 2.5, 0.0, 0.0);
            let transform = Transform::from_position_scale(position, Vector3::new(1.0, 1.0, 1.0));
            place_model(
                &mut graph,
                &format!("{} Cube", name),
                transform,
                &[(cube, material)],
            )?;
        }
        return Ok(graph);
    }

    let fallback = resources.add_material(
        &ctx.device,
        layout,
        Material::from_desc(&MaterialDesc::default()),
    );
    let loads = config
        .models
        .iter()
        .map(|placement| resources::load_model_obj(&placement.path));
    let models = async_runtime.block_on(futures::future::join_all(loads));

    for (placement, model) in config.models.iter().zip(models) {
        let model = model?;
        let parts = resources.add_model(&ctx.device, layout, &model, fallback);
        let transform = Transform::from_position_scale(
            Vector3::from(placement.position),
            Vector3::from(placement.scale),
        );
        place_model(&mut graph, &placement_name(placement), transform, &parts)?;
    }
    Ok(graph)
}

/// Window, GPU context and editor, created once the event loop resumes.
#[derive(Debug)]
struct AppState {
    ctx: Context,
    resources: ResourceStore,
    editor: Editor,
    is_surface_configured: bool,
}

impl AppState {
    fn new(
        window: Arc<Window>,
        config: &EditorConfig,
        async_runtime: &tokio::runtime::Runtime,
    ) -> anyhow::Result<Self> {
        let ctx = async_runtime.block_on(Context::new(window, config))?;
        let mut resources = ResourceStore::new();
        let graph = build_scene(&ctx, &mut resources, config, async_runtime)?;
        info!("Scene ready with {} nodes", graph.len());
        Ok(Self {
            ctx,
            resources,
            editor: Editor::new(graph, DragGizmo::new(config.gizmo)),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
        }
    }

    fn render(
        &mut self,
        async_runtime: &tokio::runtime::Runtime,
        dt: instant::Duration,
    ) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let Self {
            ctx,
            resources,
            editor,
            ..
        } = self;
        ctx.camera.update(&ctx.queue, &ctx.projection, dt);
        resources.sync_materials(&ctx.queue);

        let frame = {
            let mut backend = GpuPickBackend::from_context(ctx, resources.meshes(), async_runtime);
            editor.frame(&mut backend)
        };
        if ctx.window.title() != editor.title() {
            ctx.window.set_title(editor.title());
        }

        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        render::draw_scene(ctx, resources, &frame.queue, frame.highlighted, &view);
        ctx.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

struct App {
    async_runtime: tokio::runtime::Runtime,
    config: EditorConfig,
    state: Option<AppState>,
    init_error: Option<anyhow::Error>,
    last_time: Instant,
}

impl App {
    fn new(config: EditorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            state: None,
            init_error: None,
            last_time: Instant::now(),
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let state = event_loop
            .create_window(window_attributes)
            .map_err(anyhow::Error::from)
            .and_then(|window| AppState::new(Arc::new(window), &self.config, &self.async_runtime));
        match state {
            Ok(mut state) => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                self.last_time = Instant::now();
                self.state = Some(state);
            }
            Err(e) => {
                error!("Editor initialization failed: {:#}", e);
                self.init_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            state.ctx.camera.controller.handle_mouse(dx, dy);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        let controller = &mut state.ctx.camera.controller;
        controller.handle_window_events(&event);
        let input = &mut state.editor.input;

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::CursorMoved { position, .. } => {
                input.cursor_moved(position.x, position.y);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let pressed = button_state.is_pressed();
                if button == MouseButton::Right {
                    controller.engage(pressed);
                    input.set_pointer_captured(pressed);
                }
                input.mouse_button(button, pressed);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if !controller.is_engaged() {
                    input.key_pressed(key);
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.render(&self.async_runtime, dt) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        error!("Unable to render {}", e);
                    }
                }
                if state.editor.input.close_requested() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

/// Opens the editor window and runs until it is closed.
pub fn run(config: EditorConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<()> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::builder().with_any_thread(true).build()?
    };

    #[cfg(not(all(feature = "integration-tests", target_os = "linux")))]
    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.init_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
