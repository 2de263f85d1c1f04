//! Scene graph and hierarchical scene organization.
//!
//! The scene is a single tree of nodes stored in an arena. Each node keeps a
//! local [`Transform`] (relative to its parent) and a cached world matrix
//! that [`SceneGraph::update_world_transforms`] recomputes top-down once per
//! frame. Meshes and materials live in flat tables owned by the graph; nodes
//! refer to meshes by [`MeshId`].
//!
//! Nodes are never removed, so a [`NodeId`] handed out once stays valid for the
//! lifetime of the graph.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use log::warn;

use crate::data_structures::{
    instance::Transform,
    model::{Material, Mesh},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The scene root every attached sub-graph hangs from.
    pub const ROOT: NodeId = NodeId(0);

    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

impl MeshId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local: Transform,
    world: Matrix4<f32>,
    pub meshes: Vec<MeshId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn world(&self) -> &Matrix4<f32> {
        &self.world
    }

    /// Origin of the node in world space.
    pub fn world_position(&self) -> Vector3<f32> {
        self.world.w.truncate()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Node layout of a parsed asset before it is attached.
///
/// `children` and `roots` index into `nodes`; `meshes` index into the asset's
/// mesh table.
#[derive(Clone, Debug, Default)]
pub struct AssetNode {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<usize>,
    pub children: Vec<usize>,
}

/// One mesh of the graph together with where it should be drawn.
#[derive(Clone, Copy, Debug)]
pub struct Drawable {
    pub mesh: MeshId,
    pub world: Matrix4<f32>,
}

#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = Node {
            name: "scene".to_string(),
            local: Transform::identity(),
            world: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            meshes: Vec::new(),
            materials: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root always exists
        false
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Appends `node` as the last child of `parent`. A missing parent falls back to the root.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        name: &str,
        local: Transform,
        mesh: Option<MeshId>,
    ) -> NodeId {
        let parent = if self.contains(parent) {
            parent
        } else {
            warn!(
                "Parent node {} does not exist, attaching {} to the scene root.",
                parent.0, name
            );
            NodeId::ROOT
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            local,
            world: Matrix4::identity(),
            meshes: mesh.into_iter().collect(),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    /**
     * Attaches a parsed asset below a new group node named `name`.
     *
     * The group gets `local` as its transform; the asset roots become its
     * children with their authored transforms. Mesh and material indices are
     * rebased onto the graph's tables.
     *
     * Returns the group node and, for every asset node index, the scene node it
     * became. Asset nodes not reachable from `roots` (other scenes, orphans)
     * are not attached and map to `None`. The mapping is what animation clips
     * are re-targeted through.
     */
    pub fn attach_subgraph(
        &mut self,
        name: &str,
        local: Transform,
        nodes: &[AssetNode],
        roots: &[usize],
        meshes: Vec<Mesh>,
        materials: Vec<Material>,
    ) -> (NodeId, Vec<Option<NodeId>>) {
        let material_base = self.materials.len();
        let mesh_base = self.meshes.len();
        self.materials.extend(materials);
        self.meshes.extend(meshes.into_iter().map(|mut mesh| {
            mesh.material = mesh.material.map(|m| m + material_base);
            mesh
        }));

        let group = self.add_node(NodeId::ROOT, name, local, None);
        let mut mapping: Vec<Option<NodeId>> = vec![None; nodes.len()];
        let mut stack: Vec<(usize, NodeId)> = roots.iter().rev().map(|&r| (r, group)).collect();
        while let Some((asset_idx, parent)) = stack.pop() {
            let Some(asset_node) = nodes.get(asset_idx) else {
                warn!("{} references missing node {}", name, asset_idx);
                continue;
            };
            // glTF forbids cycles, but a malformed file should not hang the loop.
            if mapping[asset_idx].is_some() {
                warn!("{} references node {} more than once", name, asset_idx);
                continue;
            }
            let node_meshes: Vec<MeshId> = asset_node
                .meshes
                .iter()
                .map(|&m| MeshId(m + mesh_base))
                .filter(|m| m.0 < self.meshes.len())
                .collect();
            let id = self.add_node(parent, &asset_node.name, asset_node.transform, None);
            self.nodes[id.0].meshes = node_meshes;
            mapping[asset_idx] = Some(id);
            stack.extend(asset_node.children.iter().rev().map(|&c| (c, id)));
        }
        (group, mapping)
    }

    /// Recomputes every node's world transform from the root down.
    pub fn update_world_transforms(&mut self) {
        let mut stack = vec![(NodeId::ROOT, Matrix4::identity())];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world = parent_world * node.local.to_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|&c| (c, world)));
        }
    }

    /// Every mesh reachable from `from`, with the world transform of its node.
    pub fn drawables(&self, from: NodeId) -> Vec<Drawable> {
        let mut out = Vec::new();
        if !self.contains(from) {
            return out;
        }
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            out.extend(node.meshes.iter().map(|&mesh| Drawable {
                mesh,
                world: node.world,
            }));
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of nodes in the sub-tree rooted at `from`, `from` included.
    pub fn subtree_len(&self, from: NodeId) -> usize {
        if !self.contains(from) {
            return 0;
        }
        let mut count = 0;
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.nodes[id.0].children.iter());
        }
        count
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
