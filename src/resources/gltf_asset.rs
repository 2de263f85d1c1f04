//! glTF 2.0 (`.gltf` + sibling files, or self-contained `.glb`) parsing.

use anyhow::{Context, bail};
use cgmath::{Quaternion, Vector3};
use futures::future::{join_all, try_join_all};
use log::warn;

use crate::{
    data_structures::{
        instance::Transform,
        model::{AlphaMode, Material, Mesh, ModelVertex},
        scene_graph::{AssetNode, NodeId},
    },
    resources::{
        AssetFetcher, ModelAsset,
        animation::{AnimationClip, Channel, Interpolation, Keyframes},
        decode_image, parent_dir, resolve,
    },
};

pub async fn load_gltf<F: AssetFetcher>(fetcher: &F, path: &str) -> anyhow::Result<ModelAsset> {
    let bytes = fetcher
        .fetch(path)
        .await
        .with_context(|| format!("fetching {}", path))?;
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("parsing {}", path))?;
    let base = parent_dir(path);

    let buffers = try_join_all(
        gltf.buffers()
            .map(|buffer| load_buffer(fetcher, base, buffer, gltf.blob.as_deref())),
    )
    .await?;
    let images = join_all(
        gltf.images()
            .map(|image| load_image(fetcher, base, image, &buffers)),
    )
    .await;

    Ok(decode(&gltf.document, &buffers, &images))
}

async fn load_buffer<F: AssetFetcher>(
    fetcher: &F,
    base: &str,
    buffer: gltf::Buffer<'_>,
    blob: Option<&[u8]>,
) -> anyhow::Result<Vec<u8>> {
    let data = match buffer.source() {
        gltf::buffer::Source::Bin => match blob {
            Some(blob) => blob.to_vec(),
            None => bail!("buffer {} refers to a missing GLB binary chunk", buffer.index()),
        },
        gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
            bail!("buffer {} uses an embedded data URI, which is not supported", buffer.index())
        }
        gltf::buffer::Source::Uri(uri) => {
            let path = resolve(base, uri);
            fetcher
                .fetch(&path)
                .await
                .with_context(|| format!("fetching buffer {}", path))?
        }
    };
    if data.len() < buffer.length() {
        bail!(
            "buffer {} holds {} bytes but {} are declared",
            buffer.index(),
            data.len(),
            buffer.length()
        );
    }
    Ok(data)
}

/// A texture that cannot be fetched or decoded leaves its material untextured.
async fn load_image<F: AssetFetcher>(
    fetcher: &F,
    base: &str,
    image: gltf::Image<'_>,
    buffers: &[Vec<u8>],
) -> Option<image::RgbaImage> {
    let decoded = match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let start = view.offset();
            let end = start + view.length();
            match buffers[view.buffer().index()].get(start..end) {
                Some(bytes) => decode_image(bytes, Some(mime_type)),
                None => Err(anyhow::anyhow!("buffer view {} is out of range", view.index())),
            }
        }
        gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => Err(anyhow::anyhow!(
            "embedded data URIs are not supported"
        )),
        gltf::image::Source::Uri { uri, mime_type } => {
            let path = resolve(base, uri);
            match fetcher.fetch(&path).await {
                Ok(bytes) => decode_image(&bytes, mime_type),
                Err(e) => Err(e),
            }
        }
    };
    match decoded {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Texture {} could not be loaded: {:#}", image.index(), e);
            None
        }
    }
}

fn decode(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    images: &[Option<image::RgbaImage>],
) -> ModelAsset {
    let materials = document
        .materials()
        .map(|material| to_material(material, images))
        .collect();

    // glTF meshes hold several primitives; each primitive becomes one of our meshes.
    let mut meshes = Vec::new();
    let mut primitives_of_mesh = Vec::new();
    for mesh in document.meshes() {
        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            if let Some(decoded) = to_mesh(&mesh, &primitive, buffers) {
                indices.push(meshes.len());
                meshes.push(decoded);
            }
        }
        primitives_of_mesh.push(indices);
    }

    let nodes = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            AssetNode {
                name: node.name().unwrap_or("node").to_string(),
                transform: Transform::from_decomposed(translation, rotation, scale),
                meshes: node
                    .mesh()
                    .map(|m| primitives_of_mesh[m.index()].clone())
                    .unwrap_or_default(),
                children: node.children().map(|c| c.index()).collect(),
            }
        })
        .collect::<Vec<_>>();

    let roots = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => {
            // No scene declared: show every node nobody claims as a child.
            let mut is_child = vec![false; nodes.len()];
            nodes
                .iter()
                .flat_map(|n| n.children.iter())
                .for_each(|&c| is_child[c] = true);
            (0..nodes.len()).filter(|&i| !is_child[i]).collect()
        }
    };

    let clips = document
        .animations()
        .map(|animation| to_clip(animation, buffers))
        .collect();

    ModelAsset {
        nodes,
        roots,
        meshes,
        materials,
        clips,
    }
}

fn to_material(material: gltf::Material, images: &[Option<image::RgbaImage>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base_color_texture = pbr
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()).cloned().flatten());
    let alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask {
            cutoff: material.alpha_cutoff().unwrap_or(0.5),
        },
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    Material {
        name: material.name().unwrap_or("material").to_string(),
        base_color_factor: pbr.base_color_factor(),
        base_color_texture,
        alpha_mode,
        double_sided: material.double_sided(),
    }
}

fn to_mesh(mesh: &gltf::Mesh, primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<Mesh> {
    let name = mesh.name().unwrap_or("unknown_mesh");
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        warn!(
            "Skipping primitive {} of {}: only triangle lists are drawn.",
            primitive.index(),
            name
        );
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(positions) = reader.read_positions() else {
        warn!("Skipping primitive {} of {}: no positions.", primitive.index(), name);
        return None;
    };
    let mut vertices: Vec<ModelVertex> = positions
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(v, normal)| v.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(v, uv)| v.tex_coords = uv);
    }

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    Some(Mesh {
        name: name.to_string(),
        vertices,
        indices,
        material: primitive.material().index(),
    })
}

fn to_clip(animation: gltf::Animation, buffers: &[Vec<u8>]) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));
    let channels = animation
        .channels()
        .filter_map(|channel| {
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let timestamps: Vec<f32> = reader.read_inputs()?.collect();
            let cubic = channel.sampler().interpolation() == gltf::animation::Interpolation::CubicSpline;
            // Cubic spline samplers store (in-tangent, value, out-tangent) per key; keep the values.
            let keys = timestamps.len();
            let keep = |i: usize| !cubic || (i % 3 == 1 && i / 3 < keys);
            let keyframes = match reader.read_outputs()? {
                gltf::animation::util::ReadOutputs::Translations(t) => Keyframes::Translation(
                    t.enumerate()
                        .filter(|(i, _)| keep(*i))
                        .map(|(_, v)| Vector3::from(v))
                        .collect(),
                ),
                gltf::animation::util::ReadOutputs::Rotations(r) => Keyframes::Rotation(
                    r.into_f32()
                        .enumerate()
                        .filter(|(i, _)| keep(*i))
                        .map(|(_, [x, y, z, w])| Quaternion::new(w, x, y, z))
                        .collect(),
                ),
                gltf::animation::util::ReadOutputs::Scales(s) => Keyframes::Scale(
                    s.enumerate()
                        .filter(|(i, _)| keep(*i))
                        .map(|(_, v)| Vector3::from(v))
                        .collect(),
                ),
                gltf::animation::util::ReadOutputs::MorphTargetWeights(_) => return None,
            };
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                _ => Interpolation::Linear,
            };
            Some(Channel {
                target: NodeId::from_index(channel.target().node().index()),
                interpolation,
                timestamps,
                keyframes,
            })
        })
        .collect();
    AnimationClip::new(name, channels)
}
