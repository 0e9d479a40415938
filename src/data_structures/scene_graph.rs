//! Scene graph and hierarchical scene organization.
//!
//! The [`SceneGraph`] owns a tree of named [`SceneNode`]s. Each node always
//! carries a [`Transform`] and may own one [`Entity`]. Nodes are addressed by
//! [`NodeId`]s handed out by a counter owned by the graph; ids are never
//! reused, so an id held across frames either resolves to the node it was
//! created for or to nothing.
//!
//! Node transforms are world-space. Parents are not composed into their
//! children: the tree only organizes the scene for display and removal.

use std::{fmt, path::PathBuf};

use cgmath::Matrix4;
use log::debug;

use crate::{
    data_structures::{
        entity::{Entity, EntityDesc, EntityId, MaterialHandle, MeshHandle},
        transform::Transform,
    },
    error::SceneError,
};

/// Identity of a scene node. `NodeId::ROOT` is reserved for the synthetic root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

pub struct SceneNode {
    id: NodeId,
    name: String,
    transform: Transform,
    entity: Option<Entity>,
    children: Vec<SceneNode>,
}

impl SceneNode {
    fn new(id: NodeId, name: String, entity: Option<Entity>) -> Self {
        Self {
            id,
            name,
            transform: Transform::new(),
            entity,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn generate_transform_matrix(&self) -> Matrix4<f32> {
        self.transform.to_matrix()
    }

    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.entity.as_mut()
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    /// World matrix of the entity: node transform, then the entity placement.
    pub fn entity_world_matrix(&self) -> Option<Matrix4<f32>> {
        self.entity
            .as_ref()
            .map(|entity| self.transform.to_matrix() * entity.local_matrix())
    }

    fn find(&self, id: NodeId) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Detaches the direct or indirect descendant `id`.
    fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        if let Some(idx) = self.children.iter().position(|child| child.id == id) {
            return Some(self.children.remove(idx));
        }
        self.children.iter_mut().find_map(|child| child.detach(id))
    }

    fn walk<'a>(&'a self, depth: usize, visit: &mut dyn FnMut(usize, &'a SceneNode)) {
        visit(depth, self);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entity", &self.entity.as_ref().map(Entity::id))
            .field("children", &self.children.len())
            .finish()
    }
}

/// One entry of the render queue: everything a pass needs to draw an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
    pub node: NodeId,
    pub entity: EntityId,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub world: Matrix4<f32>,
}

/// Flattened hierarchy row for a hierarchy panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry {
    pub depth: usize,
    pub id: NodeId,
    pub name: String,
    pub has_entity: bool,
}

#[derive(Debug)]
pub struct SceneGraph {
    root: SceneNode,
    next_node_id: u32,
    next_entity_id: u32,
    scene_path: Option<PathBuf>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            root: SceneNode::new(NodeId::ROOT, "Root".to_string(), None),
            next_node_id: 1,
            next_entity_id: 1,
            scene_path: None,
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    /// Creates a node below `parent`, optionally owning a new entity.
    ///
    /// Ids are allocated before anything else, so even a node that is later
    /// removed has consumed its id for the rest of the session.
    pub fn create_node(
        &mut self,
        parent: NodeId,
        entity: Option<EntityDesc>,
    ) -> Result<NodeId, SceneError> {
        if self.root.find(parent).is_none() {
            return Err(SceneError::NodeNotFound(parent));
        }
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        let entity = entity.map(|desc| {
            let entity_id = EntityId(self.next_entity_id);
            self.next_entity_id += 1;
            Entity::new(entity_id, desc)
        });
        let name = match &entity {
            Some(entity) => format!("Node {} ({})", id.0, entity.id()),
            None => format!("Node {}", id.0),
        };
        let node = SceneNode::new(id, name, entity);
        self.find_node_mut(parent)
            .ok_or(SceneError::NodeNotFound(parent))?
            .children
            .push(node);
        debug!("created {} below {}", id, parent);
        Ok(id)
    }

    pub fn find_node(&self, id: NodeId) -> Option<&SceneNode> {
        self.root.find(id)
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.root.find_mut(id)
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.find_node_mut(id)
            .map(|node| node.set_name(name))
            .ok_or(SceneError::NodeNotFound(id))
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        self.find_node_mut(id)
            .map(|node| node.set_transform(transform))
            .ok_or(SceneError::NodeNotFound(id))
    }

    /// Attaches a detached subtree (for instance one returned by
    /// [`remove_child`](Self::remove_child)) as last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: SceneNode) -> Result<(), SceneError> {
        if child.id == NodeId::ROOT {
            return Err(SceneError::RootImmutable);
        }
        if self.root.find(child.id).is_some() {
            return Err(SceneError::DuplicateNode(child.id));
        }
        self.find_node_mut(parent)
            .ok_or(SceneError::NodeNotFound(parent))?
            .children
            .push(child);
        Ok(())
    }

    /// Removes the direct child `child` of `parent` together with its subtree.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<SceneNode, SceneError> {
        if child == NodeId::ROOT {
            return Err(SceneError::RootImmutable);
        }
        let parent_node = self
            .find_node_mut(parent)
            .ok_or(SceneError::NodeNotFound(parent))?;
        let idx = parent_node
            .children
            .iter()
            .position(|node| node.id == child)
            .ok_or(SceneError::NotAChild { parent, child })?;
        Ok(parent_node.children.remove(idx))
    }

    /// Removes `id` from wherever it lives in the tree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<SceneNode, SceneError> {
        if id == NodeId::ROOT {
            return Err(SceneError::RootImmutable);
        }
        self.root.detach(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Depth-first pre-order traversal starting at the root (depth 0).
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(usize, &'a SceneNode)) {
        self.root.walk(0, &mut visit);
    }

    /// Everything drawable, in depth-first order. An entity contributes one
    /// item per mesh part; the parts of one entity are adjacent and share the
    /// node, the entity and the world matrix.
    pub fn render_queue(&self) -> Vec<RenderItem> {
        let mut queue = Vec::new();
        self.walk(|_, node| {
            if let (Some(entity), Some(world)) = (node.entity(), node.entity_world_matrix()) {
                queue.extend(entity.parts.iter().map(|part| RenderItem {
                    node: node.id(),
                    entity: entity.id(),
                    mesh: part.mesh,
                    material: part.material,
                    world,
                }));
            }
        });
        queue
    }

    /// Every node below the root in display order.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        self.walk(|depth, node| {
            if node.id() != NodeId::ROOT {
                entries.push(OutlineEntry {
                    depth: depth - 1,
                    id: node.id(),
                    name: node.name().to_string(),
                    has_entity: node.entity().is_some(),
                });
            }
        });
        entries
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn scene_path(&self) -> Option<&PathBuf> {
        self.scene_path.as_ref()
    }

    pub fn set_scene_path(&mut self, path: Option<PathBuf>) {
        self.scene_path = path;
    }

    /// Label shown for the scene: the file name of the scene path, or
    /// `"New Scene"` while the scene has never been associated with a file.
    pub fn scene_label(&self) -> String {
        self.scene_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "New Scene".to_string())
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cgmath::Vector3;

    use super::*;

    fn cube() -> EntityDesc {
        EntityDesc::new(MeshHandle(0), MaterialHandle(0))
    }

    #[test]
    fn fresh_node_is_found() {
        let mut graph = SceneGraph::new();
        let id = graph.create_node(NodeId::ROOT, Some(cube())).unwrap();
        let node = graph.find_node(id).expect("node should exist");
        assert_eq!(node.id(), id);
        assert!(node.entity().is_some());
    }

    #[test]
    fn ids_are_unique_and_never_reused() {
        let mut graph = SceneGraph::new();
        let mut ids = HashSet::new();
        for _ in 0..64 {
            ids.insert(graph.create_node(NodeId::ROOT, None).unwrap());
        }
        assert_eq!(ids.len(), 64);
        assert!(!ids.contains(&NodeId::ROOT));

        let victim = *ids.iter().next().unwrap();
        graph.remove_node(victim).unwrap();
        assert!(graph.find_node(victim).is_none());
        let next = graph.create_node(NodeId::ROOT, None).unwrap();
        assert!(!ids.contains(&next));
    }

    #[test]
    fn removing_a_subtree_invalidates_descendants() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node(NodeId::ROOT, None).unwrap();
        let child = graph.create_node(parent, Some(cube())).unwrap();
        let grandchild = graph.create_node(child, Some(cube())).unwrap();

        let removed = graph.remove_child(NodeId::ROOT, parent).unwrap();
        assert_eq!(removed.children().len(), 1);
        assert!(graph.find_node(child).is_none());
        assert!(graph.find_node(grandchild).is_none());
        assert!(graph.render_queue().is_empty());
    }

    #[test]
    fn remove_child_requires_direct_parent() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node(NodeId::ROOT, None).unwrap();
        let child = graph.create_node(parent, None).unwrap();
        assert_eq!(
            graph.remove_child(NodeId::ROOT, child).unwrap_err(),
            SceneError::NotAChild {
                parent: NodeId::ROOT,
                child
            }
        );
        assert_eq!(graph.remove_node(NodeId::ROOT).unwrap_err(), SceneError::RootImmutable);
    }

    #[test]
    fn reparenting_keeps_ids() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(NodeId::ROOT, None).unwrap();
        let b = graph.create_node(NodeId::ROOT, Some(cube())).unwrap();
        let node = graph.remove_node(b).unwrap();
        graph.add_child(a, node).unwrap();
        assert_eq!(graph.find_node(a).unwrap().children()[0].id(), b);

        let outline = graph.outline();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[1].depth, 1);
        assert!(outline[1].has_entity);
    }

    #[test]
    fn unknown_parent_is_an_error() {
        let mut graph = SceneGraph::new();
        assert_eq!(
            graph.create_node(NodeId(99), None).unwrap_err(),
            SceneError::NodeNotFound(NodeId(99))
        );
    }

    #[test]
    fn parent_transform_is_not_composed_into_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node(NodeId::ROOT, Some(cube())).unwrap();
        let child = graph.create_node(parent, Some(cube())).unwrap();
        graph
            .set_transform(parent, Transform::from(Vector3::new(10.0, 0.0, 0.0)))
            .unwrap();

        let queue = graph.render_queue();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].node, parent);
        assert_eq!(queue[1].node, child);
        assert_eq!(queue[0].world.w.x, 10.0);
        assert_eq!(queue[1].world.w.x, 0.0);
    }

    #[test]
    fn every_part_of_an_entity_is_queued_with_the_same_world() {
        let mut graph = SceneGraph::new();
        let parts = [(MeshHandle(0), MaterialHandle(1)), (MeshHandle(1), MaterialHandle(0))];
        let model = graph
            .create_node(NodeId::ROOT, Some(EntityDesc::with_parts(parts)))
            .unwrap();
        graph
            .set_transform(model, Transform::from(Vector3::new(3.0, 0.0, 0.0)))
            .unwrap();

        let queue = graph.render_queue();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|item| item.node == model));
        assert_eq!(queue[0].entity, queue[1].entity);
        assert_eq!(queue[0].world, queue[1].world);
        assert_eq!(queue[0].mesh, MeshHandle(0));
        assert_eq!(queue[1].material, MaterialHandle(0));
        assert_eq!(queue[1].world.w.x, 3.0);
    }

    #[test]
    fn entity_placement_is_applied_inside_node_transform() {
        let mut graph = SceneGraph::new();
        let mut desc = cube();
        desc.position = Vector3::new(1.0, 0.0, 0.0);
        let id = graph.create_node(NodeId::ROOT, Some(desc)).unwrap();
        graph
            .set_transform(
                id,
                Transform::from_position_scale(Vector3::new(0.0, 2.0, 0.0), Vector3::new(2.0, 2.0, 2.0)),
            )
            .unwrap();
        let world = graph.render_queue()[0].world;
        assert_eq!(world.w.x, 2.0);
        assert_eq!(world.w.y, 2.0);
    }

    #[test]
    fn scene_label_uses_file_name() {
        let mut graph = SceneGraph::new();
        assert_eq!(graph.scene_label(), "New Scene");
        graph.set_scene_path(Some(PathBuf::from("scenes/demo/level.scene")));
        assert_eq!(graph.scene_label(), "level.scene");
    }

    #[test]
    fn renaming_and_counting() {
        let mut graph = SceneGraph::new();
        assert!(graph.is_empty());
        let id = graph.create_node(NodeId::ROOT, None).unwrap();
        graph.set_name(id, "Stone Man").unwrap();
        assert_eq!(graph.find_node(id).unwrap().name(), "Stone Man");
        assert_eq!(graph.len(), 1);
        assert!(graph.set_name(NodeId(42), "ghost").is_err());
    }
}
