//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena owned by [`Scene`] and are addressed by [`NodeId`]
//! handles. A node knows its parent handle (used for lookup and detachment only)
//! and the ordered handles of its children. Drawable entities live in a second
//! arena and are referenced by at most one node at a time.
//!
//! World matrices are recomputed for every visited node on every traversal:
//! `world = parent_world · local`, with `local = T · Rx · Ry · Rz · S`.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use crate::{
    data_structures::{entity::Entity, transform::Transform},
    errors::{DegenerateTransform, Result, TreeError},
    render::RenderBackend,
};

new_key_type! {
    pub struct NodeId;
    pub struct EntityId;
}

/// What happens to the children of a destroyed node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Destroy the whole subtree.
    Destroy,
    /// Re-attach the children to the destroyed node's parent, keeping their order.
    Promote,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    transform: Transform,
    world: Matrix4<f32>,
    dirty: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    entity: Option<EntityId>,
}

impl SceneNode {
    fn new() -> Self {
        Self {
            transform: Transform::new(),
            world: Matrix4::identity(),
            dirty: true,
            parent: None,
            children: Vec::new(),
            entity: None,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.transform.translation
    }

    pub fn rotation(&self) -> Vector3<f32> {
        self.transform.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.transform.scale
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.dirty = true;
    }

    pub fn set_translation(&mut self, translation: Vector3<f32>) {
        self.transform.translation = translation;
        self.dirty = true;
    }

    /// Euler angles in radians, applied X, then Y, then Z.
    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.transform.rotation = rotation;
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.transform.scale = scale;
        self.dirty = true;
    }

    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.transform.translate(delta);
        self.dirty = true;
    }

    pub fn rotate(&mut self, delta: Vector3<f32>) {
        self.transform.rotate(delta);
        self.dirty = true;
    }

    pub fn scale_by(&mut self, factor: Vector3<f32>) {
        self.transform.scale_by(factor);
        self.dirty = true;
    }

    pub fn local_matrix(&self) -> Matrix4<f32> {
        self.transform.to_matrix()
    }

    /// The world matrix computed by the last traversal.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn world_position(&self) -> Vector3<f32> {
        self.world.w.truncate()
    }

    /// True when the local transform changed since the last traversal.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }
}

/// Counters of a single traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub nodes: usize,
    pub draws: usize,
    /// Entities whose draw failed and were left out of the frame.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    entities: SlotMap<EntityId, Entity>,
    attached_to: SecondaryMap<EntityId, NodeId>,
    root: NodeId,
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new());
        Self {
            nodes,
            entities: SlotMap::with_key(),
            attached_to: SecondaryMap::new(),
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Like [`node_mut`](Self::node_mut) but reports unknown handles as an error.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        Ok(self.nodes.get_mut(id).ok_or(TreeError::UnknownNode(id))?)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Creates a detached node. It is not traversed until it is added below the root.
    pub fn create_node(&mut self) -> NodeId {
        self.nodes.insert(SceneNode::new())
    }

    /// Creates a node and appends it to the children of `parent`.
    pub fn create_child(&mut self, parent: NodeId) -> Result<NodeId> {
        self.check(parent)?;
        let child = self.create_node();
        self.add_child(parent, child)?;
        Ok(child)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// True when `ancestor` is `node` itself or lies on the path from `node` to its root.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /**
     * Appends `child` to the children of `parent`.
     *
     * A child that currently has a parent is detached from it first, so a node is
     * never listed by two parents. Adding a node below itself or below one of its
     * own descendants is rejected.
     */
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        if child == self.root {
            return Err(TreeError::RootNode("re-parented").into());
        }
        if self.is_ancestor(child, parent) {
            return Err(TreeError::Cycle { parent, child }.into());
        }
        self.detach(child)?;
        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.dirty = true;
        Ok(())
    }

    /// Removes `child` from `parent`. Returns false when it was not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let children = &mut self.get_mut(parent)?.children;
        let Some(position) = children.iter().position(|&c| c == child) else {
            return Ok(false);
        };
        children.remove(position);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
            node.dirty = true;
        }
        Ok(true)
    }

    /// Detaches a node from its parent, if it has one. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        match self.nodes.get(id).ok_or(TreeError::UnknownNode(id))?.parent {
            Some(parent) => self.remove_child(parent, id).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Destroys a node. Its entity, if any, stays in the scene but is detached.
    pub fn destroy(&mut self, id: NodeId, policy: ChildPolicy) -> Result<()> {
        self.check(id)?;
        if id == self.root {
            return Err(TreeError::RootNode("destroyed").into());
        }
        let parent = self.nodes[id].parent;
        let position = parent.and_then(|p| self.nodes[p].children.iter().position(|&c| c == id));
        self.detach(id)?;

        let children = std::mem::take(&mut self.nodes[id].children);
        match policy {
            ChildPolicy::Destroy => {
                for descendant in self.collect_subtree(&children) {
                    self.release(descendant);
                }
            }
            ChildPolicy::Promote => {
                for child in &children {
                    let node = &mut self.nodes[*child];
                    node.parent = parent;
                    node.dirty = true;
                }
                if let (Some(parent), Some(position)) = (parent, position) {
                    let siblings = &mut self.nodes[parent].children;
                    for (offset, child) in children.iter().enumerate() {
                        siblings.insert(position + offset, *child);
                    }
                }
            }
        }
        self.release(id);
        Ok(())
    }

    pub fn add_entity(&mut self, entity: impl Into<Entity>) -> EntityId {
        self.entities.insert(entity.into())
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// The node an entity is attached to, if any.
    pub fn entity_node(&self, id: EntityId) -> Option<NodeId> {
        self.attached_to.get(id).copied()
    }

    /// Attaches `entity` to `node`, replacing the node's previous entity.
    ///
    /// An entity is referenced by one node at a time; attaching it elsewhere moves it.
    pub fn attach_entity(&mut self, node: NodeId, entity: EntityId) -> Result<()> {
        self.check(node)?;
        if !self.entities.contains_key(entity) {
            return Err(TreeError::UnknownEntity(entity).into());
        }
        if let Some(previous) = self.attached_to.get(entity).copied() {
            if let Some(previous) = self.nodes.get_mut(previous) {
                previous.entity = None;
            }
        }
        if let Some(replaced) = self.nodes[node].entity.replace(entity) {
            self.attached_to.remove(replaced);
        }
        self.attached_to.insert(entity, node);
        Ok(())
    }

    pub fn detach_entity(&mut self, node: NodeId) -> Result<Option<EntityId>> {
        let entity = self.get_mut(node)?.entity.take();
        if let Some(entity) = entity {
            self.attached_to.remove(entity);
        }
        Ok(entity)
    }

    /// Removes an entity from the scene, detaching it from its node.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        if let Some(node) = self.attached_to.remove(id) {
            if let Some(node) = self.nodes.get_mut(node) {
                node.entity = None;
            }
        }
        self.entities.remove(id)
    }

    /// Node handles below `id` (inclusive) in depth-first pre-order.
    pub fn traverse(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            order.push(current);
            stack.extend(node.children.iter().rev());
        }
        order
    }

    /// World matrix of `id` composed from the current local transforms along its
    /// ancestry, without waiting for the next traversal.
    pub fn compose_world(&self, id: NodeId) -> Result<Matrix4<f32>> {
        self.check(id)?;
        let mut world = Matrix4::identity();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id];
            world = node.transform.to_matrix() * world;
            current = node.parent;
        }
        Ok(world)
    }

    /// Recomputes the world matrix of every node below the root.
    pub fn update_world_matrices(&mut self, accumulated: &Matrix4<f32>) -> Result<FrameStats> {
        self.visit(accumulated, None)
    }

    /**
     * Draws the scene below the root.
     *
     * Every node gets `world = accumulated · local` before anything is submitted.
     * Then each entity is drawn with its node's world matrix, in pre-order. An entity
     * whose draw fails is logged and counted in [`FrameStats::skipped`], the rest of
     * the frame is still drawn. Pass the identity; view and projection belong to the
     * backend.
     */
    pub fn render(
        &mut self,
        accumulated: &Matrix4<f32>,
        backend: &mut dyn RenderBackend,
    ) -> Result<FrameStats> {
        self.visit(accumulated, Some(backend))
    }

    fn visit(
        &mut self,
        accumulated: &Matrix4<f32>,
        backend: Option<&mut dyn RenderBackend>,
    ) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        let mut drawables = Vec::new();
        let mut degenerate = None;
        let mut stack = vec![(self.root, *accumulated)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                log::warn!("Skipping dangling node handle {:?}", id);
                continue;
            };
            let world = parent_world * node.transform.to_matrix();
            if degenerate.is_none() && !is_finite(&world) {
                degenerate = Some(id);
            }
            node.world = world;
            node.dirty = false;
            stats.nodes += 1;
            if let Some(entity) = node.entity {
                drawables.push((id, entity, world));
            }
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
        if let Some(id) = degenerate {
            return Err(DegenerateTransform::NonFinite(id).into());
        }

        let Some(backend) = backend else {
            return Ok(stats);
        };
        for (id, entity, world) in drawables {
            let Some(entity) = self.entities.get(entity) else {
                continue;
            };
            match entity.draw(&world, backend) {
                Ok(()) => stats.draws += 1,
                Err(e) => {
                    log::warn!("Leaving the entity of node {:?} out of the frame: {}", id, e);
                    stats.skipped += 1;
                }
            }
        }
        Ok(stats)
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id).into())
        }
    }

    fn collect_subtree(&self, roots: &[NodeId]) -> Vec<NodeId> {
        roots.iter().flat_map(|&root| self.traverse(root)).collect()
    }

    fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            if let Some(entity) = node.entity {
                self.attached_to.remove(entity);
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn is_finite(matrix: &Matrix4<f32>) -> bool {
    let columns: &[[f32; 4]; 4] = matrix.as_ref();
    columns.iter().flatten().all(|v| v.is_finite())
}
