//! Single selection and the per-frame gizmo edit of the selected node.

use log::{debug, warn};

use crate::{
    data_structures::{
        scene_graph::{NodeId, SceneGraph, SceneNode},
        transform::Transform,
    },
    error::SceneError,
    gizmo::{GizmoInput, TransformWidget},
};

/// What happened to the selection during [`SelectionController::frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Nothing selected or the selected node no longer exists.
    Nothing,
    /// The widget reported no edit. Its matrix was still written back.
    Unchanged,
    /// The widget edited the matrix and the result was written back.
    Applied,
    /// The widget produced a matrix that is not a pure TRS transform.
    Rejected,
}

/// Holds zero or one selected node by id.
///
/// The node itself is looked up again whenever it is needed, so removing the
/// selected node from the graph simply makes the selection resolve to
/// nothing.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    selected: Option<NodeId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, node: Option<NodeId>) {
        if self.selected != node {
            debug!("Selection changed: {:?} -> {:?}", self.selected, node);
        }
        self.selected = node;
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// The selected node, if it is still part of `graph`.
    pub fn resolve<'a>(&self, graph: &'a SceneGraph) -> Option<&'a SceneNode> {
        self.selected.and_then(|id| graph.find_node(id))
    }

    /// Runs one edit frame: the widget sees the selected node's matrix and its
    /// result is decomposed and stored back, whether or not the widget reports
    /// an edit. A result that cannot be decomposed leaves the node untouched.
    pub fn frame(
        &mut self,
        graph: &mut SceneGraph,
        widget: &mut dyn TransformWidget,
        input: &GizmoInput,
    ) -> EditOutcome {
        let Some(id) = self.selected else {
            return EditOutcome::Nothing;
        };
        let Some(node) = graph.find_node_mut(id) else {
            return EditOutcome::Nothing;
        };

        widget.set_current_transform(node.generate_transform_matrix());
        let edited = widget.edit(input);
        match Transform::from_matrix(widget.current_transform()) {
            Ok(transform) => {
                node.set_transform(transform);
                if edited {
                    EditOutcome::Applied
                } else {
                    EditOutcome::Unchanged
                }
            }
            Err(e) => {
                warn!("Keeping the transform of {}: {}", id, e);
                EditOutcome::Rejected
            }
        }
    }

    /// Renames the selected node. Does nothing without a live selection.
    pub fn rename_selected(
        &self,
        graph: &mut SceneGraph,
        name: impl Into<String>,
    ) -> Result<(), SceneError> {
        match self.selected {
            Some(id) => graph.set_name(id, name),
            None => Ok(()),
        }
    }

    /// Selects the next node of the outline after the current selection,
    /// wrapping around.
    pub fn cycle(&mut self, graph: &SceneGraph) -> Option<NodeId> {
        let ids: Vec<NodeId> = graph.outline().into_iter().map(|entry| entry.id).collect();
        let next = match self.selected.and_then(|s| ids.iter().position(|id| *id == s)) {
            Some(position) => ids.get((position + 1) % ids.len()).copied(),
            None => ids.first().copied(),
        };
        self.select(next);
        next
    }
}
