//! scratch-editor
//!
//! A small real-time 3D scene editor. Meshes are placed as entities in a
//! scene graph, clicked on through an ID-color picking pass and moved with a
//! gizmo that round-trips the node transform through a 4x4 matrix.
//!
//! High-level modules
//! - `camera`: fly camera, projection, controller and uniform
//! - `config`: editor configuration loaded from RON
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `convert`: string conversion of numbers, vectors and matrices
//! - `data_structures`: transforms, entities, the scene graph, meshes and textures
//! - `editor`: editor state, per-frame phases and the event loop
//! - `error`: error types of the library
//! - `gizmo`: transform widget contract and the drag gizmo
//! - `material`: material uniforms and their std140 packing
//! - `pick`: object picking by ID colors
//! - `pipelines`: forward and pick render pipelines, directional light
//! - `render`: the forward pass
//! - `resources`: OBJ loading and the GPU mesh/material store
//! - `selection`: single selection and the per-frame edit
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod convert;
pub mod data_structures;
pub mod editor;
pub mod error;
pub mod gizmo;
pub mod material;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod selection;

// Re-exports commonly used types for convenience in downstream code.
pub use config::EditorConfig;
pub use data_structures::{
    scene_graph::{NodeId, SceneGraph, SceneNode},
    transform::Transform,
};
pub use editor::{Editor, run};
pub use selection::SelectionController;
