//! Loading model files from the static asset root.
//!
//! Everything here stays on the CPU: files are fetched through an
//! [`AssetFetcher`], parsed into a [`ModelAsset`] and handed to the scene
//! graph. GPU uploads happen later, the first time a mesh is drawn.

use std::future::Future;

use anyhow::Context;

use crate::{
    config::{ModelFormat, ModelPlacement},
    data_structures::{
        model::{Material, Mesh},
        scene_graph::AssetNode,
    },
    resources::animation::AnimationClip,
};

pub mod animation;
pub mod gltf_asset;
pub mod obj_asset;

/// Source of static files addressed by paths relative to the asset root.
pub trait AssetFetcher {
    fn fetch(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>>;
}

/// Fetches files from the `assets/` directory natively, or from `<origin>/assets/`
/// in the browser.
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: String,
}

impl StaticFiles {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for StaticFiles {
    fn default() -> Self {
        Self::new("assets")
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin is not readable"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))?;
    Ok(base.join(file_name)?)
}

impl AssetFetcher for StaticFiles {
    fn fetch(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>> {
        #[cfg(target_arch = "wasm32")]
        let request = format_url(&self.root, path);
        #[cfg(not(target_arch = "wasm32"))]
        let request = std::path::Path::new(&self.root).join(decode_uri(path));

        async move {
            #[cfg(target_arch = "wasm32")]
            let data = {
                let url = request?;
                let response = reqwest::get(url.clone()).await?;
                if !response.status().is_success() {
                    anyhow::bail!("GET {} returned {}", url, response.status());
                }
                response.bytes().await?.to_vec()
            };
            #[cfg(not(target_arch = "wasm32"))]
            let data = tokio::fs::read(&request)
                .await
                .with_context(|| format!("reading {}", request.display()))?;
            Ok(data)
        }
    }
}

pub async fn fetch_string<F: AssetFetcher>(fetcher: &F, path: &str) -> anyhow::Result<String> {
    let bytes = fetcher.fetch(path).await?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path))
}

/// A parsed model file, ready to be attached to the scene graph.
///
/// `roots` index into `nodes`; animation clips target `nodes` by index until
/// they are rebound onto scene graph nodes.
#[derive(Clone, Debug, Default)]
pub struct ModelAsset {
    pub nodes: Vec<AssetNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub clips: Vec<AnimationClip>,
}

/// Fetches and parses the model file a placement points at.
pub async fn load_model<F: AssetFetcher>(
    fetcher: &F,
    placement: &ModelPlacement,
) -> anyhow::Result<ModelAsset> {
    let path = placement.source_path();
    match placement.format {
        ModelFormat::Gltf | ModelFormat::Glb => gltf_asset::load_gltf(fetcher, &path).await,
        ModelFormat::Obj => obj_asset::load_obj(fetcher, &path).await,
    }
}

/// Directory part of an asset path, without a trailing slash.
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolves a URI found inside a model file against the model's directory.
pub(crate) fn resolve(base: &str, uri: &str) -> String {
    let uri = uri.trim_start_matches("./");
    if base.is_empty() {
        uri.to_string()
    } else {
        format!("{}/{}", base, uri)
    }
}

/// Percent-decodes a relative URI so it can be used as a file system path.
#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
pub(crate) fn decode_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(byte)) => {
                out.push(byte);
                i += 3;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decodes an image file into RGBA8, using the MIME type as a hint when present.
pub(crate) fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<image::RgbaImage> {
    let format = mime_type.and_then(image::ImageFormat::from_mime_type);
    let img = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img.to_rgba8())
}
