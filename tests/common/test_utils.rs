//! In-memory asset roots and small model fixtures for loader tests.

use std::{
    borrow::Cow,
    collections::HashMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use orbit_showcase::resources::AssetFetcher;
use serde_json::json;

/// Serves files from memory. Paths listed in `delays` stay pending for that
/// many polls, so loads can be made to settle out of configuration order.
#[derive(Clone, Debug, Default)]
pub struct MemoryFiles {
    files: HashMap<String, Vec<u8>>,
    delays: HashMap<String, usize>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    pub fn delayed(mut self, path: &str, polls: usize) -> Self {
        self.delays.insert(path.to_string(), polls);
        self
    }

    /// Adds the text glTF fixture under `models/<folder>/`.
    pub fn with_gltf(self, folder: &str, fixture: &GltfFixture) -> Self {
        let (document, bin) = fixture.build("scene.bin");
        self.with(&format!("models/{}/scene.gltf", folder), document.to_string())
            .with(&format!("models/{}/scene.bin", folder), bin)
    }
}

impl AssetFetcher for MemoryFiles {
    fn fetch(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>> {
        let found = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} not found", path));
        let polls = self.delays.get(path).copied().unwrap_or(0);
        async move {
            Pending(polls).await;
            found
        }
    }
}

/// Returns `Pending` a fixed number of times before completing.
struct Pending(usize);

impl Future for Pending {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 == 0 {
            return Poll::Ready(());
        }
        self.0 -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// A triangle on node `body` with a child node `arm` at (0, 1, 0).
///
/// `animated` adds clip `wave`, moving `arm` from (0, 0, 0) to (2, 0, 0) over
/// one second. `texture` gives the triangle a material whose colour map is the
/// (missing) file `missing.png`.
#[derive(Clone, Debug, Default)]
pub struct GltfFixture {
    pub animated: bool,
    pub texture: bool,
}

impl GltfFixture {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn animated() -> Self {
        Self {
            animated: true,
            ..Self::default()
        }
    }

    /// The JSON document and its binary buffer. `buffer_uri` of `None` marks
    /// the buffer as the GLB binary chunk.
    pub fn build<'a>(&self, buffer_uri: impl Into<Option<&'a str>>) -> (serde_json::Value, Vec<u8>) {
        let mut bin = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            v.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);

        let mut buffer_views = vec![
            json!({"buffer": 0, "byteOffset": 0, "byteLength": 36}),
            json!({"buffer": 0, "byteOffset": 36, "byteLength": 6}),
        ];
        let mut accessors = vec![
            json!({"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                   "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}),
            json!({"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}),
        ];

        let mut primitive = json!({"attributes": {"POSITION": 0}, "indices": 1});
        let mut document = json!({
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [
                {"name": "body", "mesh": 0, "children": [1]},
                {"name": "arm", "translation": [0.0, 1.0, 0.0]}
            ],
        });

        if self.animated {
            let offset = bin.len();
            for t in [0.0f32, 1.0] {
                bin.extend_from_slice(&t.to_le_bytes());
            }
            for v in [[0.0f32, 0.0, 0.0], [2.0, 0.0, 0.0]] {
                v.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
            }
            buffer_views.push(json!({"buffer": 0, "byteOffset": offset, "byteLength": 8}));
            buffer_views.push(json!({"buffer": 0, "byteOffset": offset + 8, "byteLength": 24}));
            accessors.push(json!({"bufferView": 2, "componentType": 5126, "count": 2,
                                  "type": "SCALAR", "min": [0.0], "max": [1.0]}));
            accessors.push(json!({"bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3"}));
            document["animations"] = json!([{
                "name": "wave",
                "channels": [{"sampler": 0, "target": {"node": 1, "path": "translation"}}],
                "samplers": [{"input": 2, "output": 3, "interpolation": "LINEAR"}]
            }]);
        }

        if self.texture {
            document["images"] = json!([{"uri": "missing.png"}]);
            document["textures"] = json!([{"source": 0}]);
            document["materials"] = json!([{
                "name": "painted",
                "pbrMetallicRoughness": {
                    "baseColorFactor": [1.0, 0.5, 0.5, 1.0],
                    "baseColorTexture": {"index": 0}
                }
            }]);
            primitive["material"] = json!(0);
        }

        let mut buffer = json!({"byteLength": bin.len()});
        if let Some(uri) = buffer_uri.into() {
            buffer["uri"] = json!(uri);
        }
        document["buffers"] = json!([buffer]);
        document["bufferViews"] = json!(buffer_views);
        document["accessors"] = json!(accessors);
        document["meshes"] = json!([{"name": "triangle", "primitives": [primitive]}]);
        (document, bin)
    }

    /// The same model as a self-contained binary glTF.
    pub fn glb(&self) -> Vec<u8> {
        let (document, bin) = self.build(None);
        let json = document.to_string().into_bytes();
        let padded = |len: usize| (len + 3) & !3;
        let length = 12 + 8 + padded(json.len()) + 8 + padded(bin.len());
        gltf::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: length as u32,
            },
            json: Cow::Owned(json),
            bin: Some(Cow::Owned(bin)),
        }
        .to_vec()
        .expect("GLB fixture serializes")
    }
}

/// A unit quad with a half transparent blue material from `scene.mtl`.
pub const QUAD_OBJ: &str = "\
mtllib scene.mtl
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl glass
f 1/1/1 2/2/1 3/3/1 4/4/1
";

pub const QUAD_MTL: &str = "\
newmtl glass
Kd 0.5 0.5 1.0
d 0.5
";
