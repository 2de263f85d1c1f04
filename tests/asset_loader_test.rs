mod common;

use cgmath::Vector3;
use common::test_utils::{GltfFixture, MemoryFiles, QUAD_MTL, QUAD_OBJ};
use futures::executor::block_on;
use orbit_showcase::{
    config::{ModelFormat, ModelPlacement},
    data_structures::{
        model::AlphaMode,
        scene_graph::{NodeId, SceneGraph},
    },
    loader::load_all,
    session::SceneSession,
};

fn find(scene: &SceneGraph, from: NodeId, name: &str) -> Option<NodeId> {
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        let node = scene.node(id)?;
        if node.name == name {
            return Some(id);
        }
        stack.extend(node.children().iter().copied());
    }
    None
}

fn load(files: &MemoryFiles, placements: Vec<ModelPlacement>) -> SceneSession {
    let mut session = SceneSession::new();
    block_on(load_all(files, placements, &mut session));
    session
}

#[test]
fn rover_lands_at_its_placement() {
    let files = MemoryFiles::new().with_gltf("curiosity_rover", &GltfFixture::plain());
    let session = load(
        &files,
        vec![ModelPlacement::new("curiosity_rover", [1.0; 3], [5.0, 0.4, -7.0])],
    );

    assert!(session.failures().is_empty());
    let models = session.active_models();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "curiosity_rover");
    assert!(models[0].animation.is_none());

    let root = session.scene().node(models[0].root).unwrap();
    assert_eq!(root.local.position, Vector3::new(5.0, 0.4, -7.0));
    assert_eq!(root.local.scale, Vector3::new(1.0, 1.0, 1.0));
    // group + body + arm
    assert_eq!(session.scene().subtree_len(models[0].root), 3);
    assert_eq!(session.scene().meshes().len(), 1);
    assert_eq!(session.scene().meshes()[0].num_elements(), 3);
}

#[test]
fn missing_model_is_recorded_and_skipped() {
    let session = load(
        &MemoryFiles::new(),
        vec![ModelPlacement::new("mars", [1.0; 3], [0.0; 3])],
    );

    assert!(session.active_models().is_empty());
    assert_eq!(session.failures().len(), 1);
    assert_eq!(session.failures()[0].folder, "mars");
    // only the scene root
    assert_eq!(session.scene().len(), 1);
}

#[test]
fn failures_do_not_affect_other_loads() {
    let files = MemoryFiles::new()
        .with_gltf("first", &GltfFixture::plain())
        .with_gltf("third", &GltfFixture::plain());
    let session = load(
        &files,
        vec![
            ModelPlacement::new("first", [1.0; 3], [0.0; 3]),
            ModelPlacement::new("second", [1.0; 3], [0.0; 3]),
            ModelPlacement::new("third", [1.0; 3], [0.0; 3]),
        ],
    );

    let mut names: Vec<_> = session.active_models().iter().map(|m| m.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["first", "third"]);
    assert_eq!(session.failures().len(), 1);
    assert_eq!(session.failures()[0].folder, "second");
    assert_eq!(session.scene().len(), 1 + 2 * 3);
    for model in session.active_models() {
        assert!(session.scene().contains(model.root));
    }
}

#[test]
fn first_clip_starts_playing() {
    let files = MemoryFiles::new().with_gltf("robot", &GltfFixture::animated());
    let session = load(&files, vec![ModelPlacement::new("robot", [1.0; 3], [0.0; 3])]);

    let model = &session.active_models()[0];
    let animation = model.animation.as_ref().expect("animated model");
    assert!(animation.is_playing());
    assert_eq!(animation.clips().len(), 1);
    assert_eq!(animation.active_clip().name, "wave");
    assert_eq!(animation.time(), 0.0);

    let arm = find(session.scene(), model.root, "arm").unwrap();
    assert_eq!(animation.active_clip().channels[0].target, arm);
}

#[test]
fn models_are_tracked_in_completion_order() {
    let files = MemoryFiles::new()
        .with_gltf("slow", &GltfFixture::plain())
        .with_gltf("fast", &GltfFixture::plain())
        .delayed("models/slow/scene.gltf", 5);
    let session = load(
        &files,
        vec![
            ModelPlacement::new("slow", [1.0; 3], [0.0; 3]),
            ModelPlacement::new("fast", [1.0; 3], [0.0; 3]),
        ],
    );

    let names: Vec<_> = session.active_models().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["fast", "slow"]);
}

#[test]
fn loads_binary_gltf() {
    let files = MemoryFiles::new().with("models/packed/scene.glb", GltfFixture::animated().glb());
    let placement = ModelPlacement {
        format: ModelFormat::Glb,
        ..ModelPlacement::new("packed", [2.0; 3], [0.0; 3])
    };
    let session = load(&files, vec![placement]);

    assert!(session.failures().is_empty());
    let model = &session.active_models()[0];
    assert!(model.animation.is_some());
    assert_eq!(session.scene().subtree_len(model.root), 3);
}

#[test]
fn loads_obj_with_materials() {
    let files = MemoryFiles::new()
        .with("models/window/scene.obj", QUAD_OBJ)
        .with("models/window/scene.mtl", QUAD_MTL);
    let placement = ModelPlacement {
        format: ModelFormat::Obj,
        ..ModelPlacement::new("window", [1.0; 3], [0.0, 1.0, 0.0])
    };
    let session = load(&files, vec![placement]);

    assert!(session.failures().is_empty());
    let model = &session.active_models()[0];
    assert!(model.animation.is_none());
    assert!(find(session.scene(), model.root, "quad").is_some());

    let mesh = &session.scene().meshes()[0];
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices.len(), 6);
    // texture origin moved to the top-left
    assert_eq!(mesh.vertices[0].tex_coords, [0.0, 1.0]);
    assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);

    let material = &session.scene().materials()[mesh.material.unwrap()];
    assert_eq!(material.name, "glass");
    assert_eq!(material.base_color_factor, [0.5, 0.5, 1.0, 0.5]);
    assert_eq!(material.alpha_mode, AlphaMode::Blend);
}

#[test]
fn missing_buffer_fails_the_load() {
    let (document, _) = GltfFixture::plain().build("scene.bin");
    let files = MemoryFiles::new().with("models/broken/scene.gltf", document.to_string());
    let session = load(&files, vec![ModelPlacement::new("broken", [1.0; 3], [0.0; 3])]);

    assert!(session.active_models().is_empty());
    assert_eq!(session.failures()[0].folder, "broken");
    assert_eq!(session.scene().len(), 1);
}

#[test]
fn missing_texture_leaves_material_untextured() {
    let fixture = GltfFixture {
        texture: true,
        ..GltfFixture::plain()
    };
    let files = MemoryFiles::new().with_gltf("painted", &fixture);
    let session = load(&files, vec![ModelPlacement::new("painted", [1.0; 3], [0.0; 3])]);

    assert!(session.failures().is_empty());
    assert_eq!(session.active_models().len(), 1);
    let material = &session.scene().materials()[0];
    assert_eq!(material.name, "painted");
    assert_eq!(material.base_color_factor, [1.0, 0.5, 0.5, 1.0]);
    assert!(material.base_color_texture.is_none());
    assert_eq!(session.scene().meshes()[0].material, Some(0));
}
