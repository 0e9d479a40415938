//! Editor data structures: scene graph, entities, transforms, meshes, textures.
//!
//! - `entity` holds renderable object identities and their mesh/material binding
//! - `model` contains mesh geometry (CPU and GPU side)
//! - `scene_graph` is the node tree with stable ids
//! - `texture` wraps render attachments
//! - `transform` converts between position/rotation/scale and matrices

pub mod entity;
pub mod model;
pub mod scene_graph;
pub mod texture;
pub mod transform;
