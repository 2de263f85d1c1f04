//! The scene a viewer session shows: one scene graph plus the models loaded into it.

use crate::{
    config::ModelPlacement,
    data_structures::{instance::Transform, scene_graph::{NodeId, SceneGraph}},
    loader::AssetLoadFailure,
    resources::{ModelAsset, animation::AnimationState},
};

/// A model that made it into the scene.
#[derive(Debug)]
pub struct LoadedModel {
    /// Folder the model was loaded from.
    pub name: String,
    /// Group node carrying the placement transform; the asset hangs below it.
    pub root: NodeId,
    pub animation: Option<AnimationState>,
}

/// Owns the scene graph and the collection of active models.
///
/// Models are only ever added through [`SceneSession::attach_model`], which
/// inserts the nodes before tracking the model, so every tracked model has
/// its nodes in the graph.
#[derive(Debug, Default)]
pub struct SceneSession {
    scene: SceneGraph,
    active: Vec<LoadedModel>,
    failures: Vec<AssetLoadFailure>,
}

impl SceneSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn active_models(&self) -> &[LoadedModel] {
        &self.active
    }

    pub fn failures(&self) -> &[AssetLoadFailure] {
        &self.failures
    }

    /// Inserts a parsed asset below a group node placed per `placement` and
    /// starts its first animation clip, if it has any.
    pub fn attach_model(&mut self, placement: &ModelPlacement, asset: ModelAsset) -> &LoadedModel {
        let local = Transform::from_position_scale(placement.position.into(), placement.scale.into());
        let (root, mapping) = self.scene.attach_subgraph(
            &placement.folder,
            local,
            &asset.nodes,
            &asset.roots,
            asset.meshes,
            asset.materials,
        );
        let clips = asset
            .clips
            .into_iter()
            .map(|clip| clip.rebind(&mapping))
            .collect();
        let animation = AnimationState::new(clips);
        log::info!(
            "Added {} ({} nodes{})",
            placement.folder,
            self.scene.subtree_len(root),
            match &animation {
                Some(state) => format!(", playing {}", state.active_clip().name),
                None => String::new(),
            }
        );
        self.active.push(LoadedModel {
            name: placement.folder.clone(),
            root,
            animation,
        });
        &self.active[self.active.len() - 1]
    }

    pub fn record_failure(&mut self, failure: AssetLoadFailure) {
        self.failures.push(failure);
    }

    /// Advances every model's animation clock by `dt` seconds.
    ///
    /// A model whose root has gone missing is skipped; the rest still advance.
    pub fn advance_animations(&mut self, dt: f32) {
        for model in &mut self.active {
            if !self.scene.contains(model.root) {
                log::warn!("Skipping {}: its root node is gone", model.name);
                continue;
            }
            if let Some(animation) = model.animation.as_mut() {
                let missing = animation.advance(dt, &mut self.scene);
                if missing > 0 {
                    log::warn!("{}: {} animated nodes are missing", model.name, missing);
                }
            }
        }
    }

    /// Propagates local transforms down to world transforms before drawing.
    pub fn update_world_transforms(&mut self) {
        self.scene.update_world_transforms();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Quaternion, Vector3};

    use super::*;
    use crate::{
        data_structures::scene_graph::AssetNode,
        resources::animation::{AnimationClip, Channel, Interpolation, Keyframes},
    };

    fn two_node_asset() -> ModelAsset {
        ModelAsset {
            nodes: vec![
                AssetNode {
                    name: "body".to_string(),
                    children: vec![1],
                    ..Default::default()
                },
                AssetNode {
                    name: "wheel".to_string(),
                    ..Default::default()
                },
            ],
            roots: vec![0],
            ..Default::default()
        }
    }

    fn spin_clip() -> AnimationClip {
        AnimationClip::new(
            "spin".to_string(),
            vec![Channel {
                target: NodeId::from_index(1),
                interpolation: Interpolation::Linear,
                timestamps: vec![0.0, 1.0],
                keyframes: Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(1.0, 0.0, 0.0),
                ]),
            }],
        )
    }

    #[test]
    fn attached_model_root_carries_placement() {
        let mut session = SceneSession::new();
        let placement = ModelPlacement::new("rover", [2.0, 2.0, 2.0], [5.0, 0.4, -7.0]);
        let root = session.attach_model(&placement, two_node_asset()).root;

        let node = session.scene().node(root).unwrap();
        assert_eq!(node.local.position, Vector3::new(5.0, 0.4, -7.0));
        assert_eq!(node.local.scale, Vector3::new(2.0, 2.0, 2.0));
        assert_eq!(node.local.rotation, Quaternion::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(session.scene().subtree_len(root), 3);
        assert!(session.active_models()[0].animation.is_none());
    }

    #[test]
    fn first_clip_plays_on_the_attached_nodes() {
        let mut session = SceneSession::new();
        let mut asset = two_node_asset();
        asset.clips = vec![spin_clip()];
        let placement = ModelPlacement::new("rover", [1.0; 3], [0.0; 3]);
        session.attach_model(&placement, asset);

        let model = &session.active_models()[0];
        let animation = model.animation.as_ref().unwrap();
        assert!(animation.is_playing());
        assert_eq!(animation.active_clip().name, "spin");
        let wheel = animation.active_clip().channels[0].target;
        assert_ne!(wheel, NodeId::from_index(1));

        session.advance_animations(0.5);
        session.update_world_transforms();
        let world = session.scene().node(wheel).unwrap().world_position();
        assert!((world.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn every_tracked_model_is_in_the_graph() {
        let mut session = SceneSession::new();
        for folder in ["a", "b", "c"] {
            session.attach_model(&ModelPlacement::new(folder, [1.0; 3], [0.0; 3]), two_node_asset());
        }
        assert_eq!(session.active_models().len(), 3);
        for model in session.active_models() {
            assert!(session.scene().contains(model.root));
        }
        // root + 3 groups + 3 * 2 asset nodes
        assert_eq!(session.scene().len(), 10);
    }

    #[test]
    fn channels_on_unattached_nodes_leave_the_placement_alone() {
        let mut session = SceneSession::new();
        let asset = ModelAsset {
            nodes: vec![
                AssetNode {
                    name: "body".to_string(),
                    ..Default::default()
                },
                AssetNode {
                    name: "orphan".to_string(),
                    ..Default::default()
                },
            ],
            roots: vec![0],
            clips: vec![spin_clip()],
            ..Default::default()
        };
        let placement = ModelPlacement::new("rover", [1.0; 3], [5.0, 0.4, -7.0]);
        let model = session.attach_model(&placement, asset);
        let root = model.root;
        assert!(model.animation.as_ref().unwrap().active_clip().channels.is_empty());

        session.advance_animations(1.0 / 60.0);
        session.update_world_transforms();

        let node = session.scene().node(root).unwrap();
        assert_eq!(node.local.position, Vector3::new(5.0, 0.4, -7.0));
        assert_eq!(node.local.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(node.world_position(), Vector3::new(5.0, 0.4, -7.0));
    }

    #[test]
    fn model_with_missing_root_is_skipped_and_others_advance() {
        let mut session = SceneSession::new();
        let mut asset = two_node_asset();
        asset.clips = vec![spin_clip()];
        session.attach_model(&ModelPlacement::new("rover", [1.0; 3], [0.0; 3]), asset);
        session.active.insert(
            0,
            LoadedModel {
                name: "ghost".to_string(),
                root: NodeId::from_index(999),
                animation: AnimationState::new(vec![spin_clip()]),
            },
        );

        session.advance_animations(0.25);
        session.update_world_transforms();

        let ghost = &session.active_models()[0];
        assert_eq!(ghost.animation.as_ref().unwrap().time(), 0.0);
        let rover = session.active_models()[1].animation.as_ref().unwrap();
        assert!((rover.time() - 0.25).abs() < 1e-6);
        let wheel = rover.active_clip().channels[0].target;
        let x = session.scene().node(wheel).unwrap().world_position().x;
        assert!((x - 0.25).abs() < 1e-5);
    }
}
