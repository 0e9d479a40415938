//! Typed errors of the editor core.
//!
//! The picking/transform core never lets these cross the frame loop: callers
//! turn them into sentinel values (`None` selections, untouched transforms)
//! and log them. Glue code (asset loading, GPU setup) uses `anyhow` instead.

use thiserror::Error;

use crate::data_structures::scene_graph::NodeId;

/// Reasons a matrix cannot be decomposed into position, rotation and scale.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    #[error("matrix contains NaN or infinite elements")]
    NotFinite,
    #[error("matrix is not affine (bottom row must be 0 0 0 1)")]
    NonAffine,
    #[error("matrix has a degenerate (zero length) basis axis")]
    Degenerate,
    #[error("matrix contains shear")]
    Shear,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("scene node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("the root node cannot be removed or re-attached")]
    RootImmutable,
    #[error("a node with id {0} is already part of the scene")]
    DuplicateNode(NodeId),
}

/// Failures of the string conversion helpers in [`crate::convert`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("'{0}' is not a number")]
    Number(String),
    #[error("'{0}' is not a boolean")]
    Bool(String),
    #[error("expected {expected} components but found {found}")]
    Arity { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] ron::Error),
}
