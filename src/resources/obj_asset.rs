//! Wavefront OBJ parsing. OBJ files carry no hierarchy or animation, so every
//! object becomes one root node with a single mesh.

use std::io::{BufReader, Cursor};

use anyhow::Context;
use log::warn;

use crate::{
    data_structures::{
        instance::Transform,
        model::{AlphaMode, Material, Mesh, ModelVertex},
        scene_graph::AssetNode,
    },
    resources::{AssetFetcher, ModelAsset, decode_image, parent_dir, resolve},
};

pub async fn load_obj<F: AssetFetcher>(fetcher: &F, path: &str) -> anyhow::Result<ModelAsset> {
    let obj_bytes = fetcher
        .fetch(path)
        .await
        .with_context(|| format!("fetching {}", path))?;
    let base = parent_dir(path);
    let mut obj_reader = BufReader::new(Cursor::new(obj_bytes));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |mtl| {
            let mtl_path = resolve(base, &mtl);
            async move {
                match fetcher.fetch(&mtl_path).await {
                    Ok(mtl_bytes) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_bytes))),
                    Err(e) => {
                        warn!("Material library {} could not be loaded: {:#}", mtl_path, e);
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await
    .with_context(|| format!("parsing {}", path))?;

    // A broken material library leaves the geometry usable with default materials.
    let obj_materials = obj_materials.unwrap_or_else(|e| {
        warn!("Materials of {} are unavailable: {}", path, e);
        Vec::new()
    });
    let mut materials = Vec::with_capacity(obj_materials.len());
    for m in obj_materials {
        materials.push(to_material(fetcher, base, m).await);
    }

    let meshes: Vec<Mesh> = models
        .into_iter()
        .map(|m| {
            let mesh = m.mesh;
            let vertices = (0..mesh.positions.len() / 3)
                .map(|i| ModelVertex {
                    position: [
                        mesh.positions[i * 3],
                        mesh.positions[i * 3 + 1],
                        mesh.positions[i * 3 + 2],
                    ],
                    // OBJ puts the texture origin bottom-left
                    tex_coords: [
                        mesh.texcoords.get(i * 2).copied().unwrap_or(0.0),
                        1.0 - mesh.texcoords.get(i * 2 + 1).copied().unwrap_or(0.0),
                    ],
                    normal: [
                        mesh.normals.get(i * 3).copied().unwrap_or(0.0),
                        mesh.normals.get(i * 3 + 1).copied().unwrap_or(0.0),
                        mesh.normals.get(i * 3 + 2).copied().unwrap_or(0.0),
                    ],
                })
                .collect();
            Mesh {
                name: m.name,
                vertices,
                indices: mesh.indices,
                material: mesh.material_id.filter(|&id| id < materials.len()),
            }
        })
        .collect();

    let nodes: Vec<AssetNode> = meshes
        .iter()
        .enumerate()
        .map(|(idx, mesh)| AssetNode {
            name: mesh.name.clone(),
            transform: Transform::identity(),
            meshes: vec![idx],
            children: Vec::new(),
        })
        .collect();
    let roots = (0..nodes.len()).collect();

    Ok(ModelAsset {
        nodes,
        roots,
        meshes,
        materials,
        clips: Vec::new(),
    })
}

async fn to_material<F: AssetFetcher>(fetcher: &F, base: &str, m: tobj::Material) -> Material {
    let diffuse = m.diffuse.unwrap_or([1.0, 1.0, 1.0]);
    let opacity = m.dissolve.unwrap_or(1.0);
    let base_color_texture = match &m.diffuse_texture {
        Some(file) => {
            let path = resolve(base, file);
            match fetcher.fetch(&path).await.and_then(|bytes| decode_image(&bytes, None)) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("Texture {} could not be loaded: {:#}", path, e);
                    None
                }
            }
        }
        None => None,
    };
    Material {
        name: m.name,
        base_color_factor: [diffuse[0], diffuse[1], diffuse[2], opacity],
        base_color_texture,
        alpha_mode: if opacity < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        double_sided: false,
    }
}
