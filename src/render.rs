//! Turning the scene graph into draw calls.
//!
//! [`DrawList::build`] walks the graph once per frame and sorts every visible
//! mesh into opaque and blended batches. Opaque meshes that share a mesh are
//! drawn instanced in one call; blended meshes are drawn one by one, farthest
//! first. [`GpuScene`] mirrors the graph's mesh and material tables on the GPU,
//! uploading whatever was attached since the previous frame.

use std::ops::Range;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{Material, Mesh},
        scene_graph::{MeshId, SceneGraph},
    },
    pipelines::material::GpuMaterial,
};

/// Consecutive instances in the frame's instance buffer that draw one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub mesh: MeshId,
    /// Index into the graph's material table; `None` uses the default material.
    pub material: Option<usize>,
    pub double_sided: bool,
    pub instances: Range<u32>,
}

#[derive(Debug, Default)]
pub struct DrawList {
    pub instances: Vec<InstanceRaw>,
    pub opaque: Vec<Batch>,
    pub blended: Vec<Batch>,
}

impl DrawList {
    pub fn build(scene: &SceneGraph, eye: Point3<f32>) -> Self {
        let mut opaque = Vec::new();
        let mut blended = Vec::new();
        for drawable in scene.drawables(scene.root()) {
            let Some(mesh) = scene.mesh(drawable.mesh) else {
                continue;
            };
            if mesh.num_elements() == 0 || mesh.vertices.is_empty() {
                continue;
            }
            let material = mesh.material.and_then(|m| scene.materials().get(m));
            if material.is_some_and(Material::is_blended) {
                blended.push(drawable);
            } else {
                opaque.push(drawable);
            }
        }

        opaque.sort_by_key(|d| d.mesh.index());
        let distance = |world: &Matrix4<f32>| (Point3::from_vec(world.w.truncate()) - eye).magnitude2();
        blended.sort_by(|a, b| distance(&b.world).total_cmp(&distance(&a.world)));

        let mut list = DrawList::default();
        for drawable in opaque {
            let index = list.instances.len() as u32;
            list.instances.push(InstanceRaw::from_world(&drawable.world));
            match list.opaque.last_mut() {
                Some(batch) if batch.mesh == drawable.mesh => batch.instances.end = index + 1,
                _ => list.opaque.push(batch_for(scene, drawable.mesh, index)),
            }
        }
        for drawable in blended {
            let index = list.instances.len() as u32;
            list.instances.push(InstanceRaw::from_world(&drawable.world));
            list.blended.push(batch_for(scene, drawable.mesh, index));
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn batch_for(scene: &SceneGraph, mesh: MeshId, index: u32) -> Batch {
    let material = scene.mesh(mesh).and_then(|m| m.material);
    let double_sided = material
        .and_then(|m| scene.materials().get(m))
        .is_some_and(|m| m.double_sided);
    Batch {
        mesh,
        material,
        double_sided,
        instances: index..index + 1,
    }
}

#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_elements: mesh.num_elements(),
        }
    }
}

/// GPU copies of the scene graph's meshes and materials, index for index.
#[derive(Debug)]
pub struct GpuScene {
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
    default_material: GpuMaterial,
}

impl GpuScene {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        Self {
            meshes: Vec::new(),
            materials: Vec::new(),
            default_material: GpuMaterial::new(device, queue, layout, &Material::default()),
        }
    }

    /// Uploads meshes and materials attached since the last call. The graph
    /// only ever appends to its tables, so anything past our length is new.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        scene: &SceneGraph,
    ) {
        let new_materials = &scene.materials()[self.materials.len().min(scene.materials().len())..];
        self.materials
            .extend(new_materials.iter().map(|m| GpuMaterial::new(device, queue, layout, m)));
        let new_meshes = &scene.meshes()[self.meshes.len().min(scene.meshes().len())..];
        if !new_meshes.is_empty() {
            log::info!("Uploading {} meshes", new_meshes.len());
        }
        self.meshes
            .extend(new_meshes.iter().map(|m| GpuMesh::new(device, m)));
    }

    pub fn mesh(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(id.index())
    }

    pub fn material(&self, material: Option<usize>) -> &GpuMaterial {
        material
            .and_then(|m| self.materials.get(m))
            .unwrap_or(&self.default_material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        instance::Transform,
        model::{AlphaMode, ModelVertex},
        scene_graph::AssetNode,
    };

    fn triangle(material: Option<usize>) -> Mesh {
        Mesh {
            name: "triangle".to_string(),
            vertices: vec![ModelVertex::default(); 3],
            indices: vec![0, 1, 2],
            material,
        }
    }

    fn scene_with(blend_mesh_positions: &[f32]) -> SceneGraph {
        let mut scene = SceneGraph::new();
        let glass = Material {
            alpha_mode: AlphaMode::Blend,
            double_sided: true,
            ..Material::default()
        };
        // two opaque nodes sharing mesh 0
        let nodes = vec![
            AssetNode {
                meshes: vec![0],
                ..Default::default()
            },
            AssetNode {
                transform: Transform::from_position_scale([1.0, 0.0, 0.0].into(), [1.0; 3].into()),
                meshes: vec![0],
                ..Default::default()
            },
        ];
        scene.attach_subgraph(
            "solid",
            Transform::identity(),
            &nodes,
            &[0, 1],
            vec![triangle(None)],
            Vec::new(),
        );
        for &z in blend_mesh_positions {
            scene.attach_subgraph(
                "glass",
                Transform::from_position_scale([0.0, 0.0, z].into(), [1.0; 3].into()),
                &[AssetNode {
                    meshes: vec![0],
                    ..Default::default()
                }],
                &[0],
                vec![triangle(Some(0))],
                vec![glass.clone()],
            );
        }
        scene.update_world_transforms();
        scene
    }

    #[test]
    fn shared_opaque_meshes_are_instanced() {
        let scene = scene_with(&[]);
        let list = DrawList::build(&scene, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(list.opaque.len(), 1);
        assert_eq!(list.opaque[0].instances, 0..2);
        assert_eq!(list.opaque[0].material, None);
        assert!(list.blended.is_empty());
        assert_eq!(list.instances.len(), 2);
    }

    #[test]
    fn blended_meshes_draw_back_to_front() {
        let scene = scene_with(&[5.0, -20.0, 0.0]);
        let list = DrawList::build(&scene, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(list.blended.len(), 3);
        let depth: Vec<f32> = list
            .blended
            .iter()
            .map(|b| list.instances[b.instances.start as usize].model[3][2])
            .collect();
        assert_eq!(depth, vec![-20.0, 0.0, 5.0]);
        assert!(list.blended.iter().all(|b| b.double_sided));
        // blended instances come after the opaque ones
        assert_eq!(list.blended[0].instances.start, 2);
    }

    #[test]
    fn empty_meshes_are_skipped() {
        let mut scene = SceneGraph::new();
        let empty = Mesh {
            indices: Vec::new(),
            ..triangle(None)
        };
        let mesh = scene.add_mesh(empty);
        scene.add_node(scene.root(), "empty", Transform::identity(), Some(mesh));
        scene.update_world_transforms();
        assert!(DrawList::build(&scene, Point3::new(0.0, 0.0, 10.0)).is_empty());
    }
}
