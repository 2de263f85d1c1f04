//! orbit-showcase
//!
//! Loads a configured set of glTF and OBJ models into one lit scene and lets
//! the user orbit a camera around them. Runs natively in a window or in the
//! browser, drawing into a page canvas through WebGL2.
//!
//! High-level modules
//! - `config`: which models to load and how camera, controls and lights are set up
//! - `data_structures`: transforms, meshes, materials, the scene graph and GPU textures
//! - `resources`: static file fetching, glTF/OBJ parsing and animation clips
//! - `session`: the scene graph plus the models loaded into it
//! - `loader`: concurrent model loads and their completion handling
//! - `camera`: camera, projection and orbit controls
//! - `context`: the GPU side of the viewport: surface, device, resize and draw
//! - `render`: per-frame batching of the scene into draw calls
//! - `pipelines`: render pipelines and the model shader
//! - `flow`: the event loop and the per-frame update
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod loader;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod session;

pub use config::{ModelPlacement, ViewerConfig};
pub use flow::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Browser entry point: reads `showcase.toml` from the asset root and starts the viewer.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn run_web() -> Result<(), JsValue> {
    flow::init_logging();
    let config = ViewerConfig::load(&resources::StaticFiles::default()).await;
    run(config).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
