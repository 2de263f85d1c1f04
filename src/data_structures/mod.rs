//! Engine data structures: transforms, geometry, textures and the scene graph.
//!
//! - `instance` holds node transforms and their per-instance GPU layout
//! - `model` contains CPU mesh, vertex and material definitions
//! - `scene_graph` is the node tree every loaded model is attached to
//! - `texture` wraps GPU textures (depth buffer, colour maps)

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
