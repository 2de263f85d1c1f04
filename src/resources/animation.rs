//! Keyframe animation: clips parsed from assets and the per-model playback state.

use cgmath::{Quaternion, Vector3, VectorSpace};

use crate::data_structures::scene_graph::{NodeId, SceneGraph};

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Scale(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

/// A sampled value for one component of a node's local transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelValue {
    Translation(Vector3<f32>),
    Rotation(Quaternion<f32>),
    Scale(Vector3<f32>),
}

/// Keyframes driving one transform component of one node.
///
/// While a clip belongs to a parsed asset, `target` indexes the asset's node
/// table. [`AnimationClip::rebind`] maps it onto scene graph nodes.
#[derive(Clone, Debug)]
pub struct Channel {
    pub target: NodeId,
    pub interpolation: Interpolation,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

impl Channel {
    pub fn sample(&self, time: f32) -> Option<ChannelValue> {
        let len = self.timestamps.len().min(self.keyframes.len());
        if len == 0 {
            return None;
        }
        let (prev, next, factor) = locate(&self.timestamps[..len], time);
        let factor = match self.interpolation {
            Interpolation::Linear => factor,
            Interpolation::Step => 0.0,
        };
        let value = match &self.keyframes {
            Keyframes::Translation(v) => ChannelValue::Translation(v[prev].lerp(v[next], factor)),
            Keyframes::Scale(v) => ChannelValue::Scale(v[prev].lerp(v[next], factor)),
            Keyframes::Rotation(v) => {
                let rotation = if prev == next || factor == 0.0 {
                    v[prev]
                } else {
                    v[prev].slerp(v[next], factor)
                };
                ChannelValue::Rotation(rotation)
            }
        };
        Some(value)
    }
}

/// Finds the keyframes surrounding `time` and how far along between them it is.
/// Times outside the track clamp to the first or last keyframe.
fn locate(timestamps: &[f32], time: f32) -> (usize, usize, f32) {
    let last = timestamps.len() - 1;
    if time <= timestamps[0] {
        return (0, 0, 0.0);
    }
    if time >= timestamps[last] {
        return (last, last, 0.0);
    }
    let next = timestamps.partition_point(|&t| t <= time);
    let prev = next - 1;
    let span = timestamps[next] - timestamps[prev];
    let factor = if span > 0.0 {
        (time - timestamps[prev]) / span
    } else {
        0.0
    };
    (prev, next, factor)
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: String, channels: Vec<Channel>) -> Self {
        Self { name, channels }
    }

    /// Length of the clip in seconds: the latest keyframe of any channel.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|c| c.timestamps.last())
            .fold(0.0, |acc: f32, &t| acc.max(t))
    }

    /// Re-targets every channel through `nodes`, which maps asset node indices
    /// to scene graph nodes. Channels whose target has no mapping, or maps to
    /// a node that was never attached, are dropped.
    pub fn rebind(self, nodes: &[Option<NodeId>]) -> Self {
        let channels = self
            .channels
            .into_iter()
            .filter_map(|mut channel| {
                channel.target = nodes.get(channel.target.index()).copied().flatten()?;
                Some(channel)
            })
            .collect();
        Self {
            name: self.name,
            channels,
        }
    }
}

/// Playback state of one loaded model.
///
/// Only ever created for models with at least one clip; the first clip starts
/// playing immediately and loops.
#[derive(Clone, Debug)]
pub struct AnimationState {
    clips: Vec<AnimationClip>,
    active: usize,
    playing: bool,
    time: f32,
}

impl AnimationState {
    /// Returns `None` when there is nothing to play.
    pub fn new(clips: Vec<AnimationClip>) -> Option<Self> {
        if clips.is_empty() {
            return None;
        }
        Some(Self {
            clips,
            active: 0,
            playing: true,
            time: 0.0,
        })
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn active_clip(&self) -> &AnimationClip {
        &self.clips[self.active]
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Switches to clip `idx` and restarts it. Out of range indices are ignored.
    pub fn play(&mut self, idx: usize) {
        if idx < self.clips.len() {
            self.active = idx;
            self.time = 0.0;
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advances the clock by `dt` seconds and writes the sampled pose into `graph`.
    ///
    /// Returns how many channels targeted nodes that no longer exist; those are
    /// skipped so the rest of the pose still applies.
    pub fn advance(&mut self, dt: f32, graph: &mut SceneGraph) -> usize {
        if !self.playing {
            return 0;
        }
        let duration = self.active_clip().duration();
        self.time = if duration > 0.0 {
            (self.time + dt).rem_euclid(duration)
        } else {
            0.0
        };

        let mut missing = 0;
        for channel in &self.clips[self.active].channels {
            let Some(value) = channel.sample(self.time) else {
                continue;
            };
            let Some(node) = graph.node_mut(channel.target) else {
                missing += 1;
                continue;
            };
            match value {
                ChannelValue::Translation(t) => node.local.position = t,
                ChannelValue::Rotation(r) => node.local.rotation = r,
                ChannelValue::Scale(s) => node.local.scale = s,
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, One, Rotation3};

    use super::*;
    use crate::data_structures::instance::Transform;

    fn translation_channel(target: NodeId, interpolation: Interpolation) -> Channel {
        Channel {
            target,
            interpolation,
            timestamps: vec![0.0, 1.0, 2.0],
            keyframes: Keyframes::Translation(vec![
                [0.0, 0.0, 0.0].into(),
                [10.0, 0.0, 0.0].into(),
                [10.0, 10.0, 0.0].into(),
            ]),
        }
    }

    #[test]
    fn linear_sampling_interpolates_between_keys() {
        let channel = translation_channel(NodeId::ROOT, Interpolation::Linear);
        assert_eq!(
            channel.sample(0.5),
            Some(ChannelValue::Translation([5.0, 0.0, 0.0].into()))
        );
        assert_eq!(
            channel.sample(1.5),
            Some(ChannelValue::Translation([10.0, 5.0, 0.0].into()))
        );
    }

    #[test]
    fn step_sampling_holds_previous_key() {
        let channel = translation_channel(NodeId::ROOT, Interpolation::Step);
        assert_eq!(
            channel.sample(0.99),
            Some(ChannelValue::Translation([0.0, 0.0, 0.0].into()))
        );
    }

    #[test]
    fn sampling_clamps_outside_track() {
        let channel = translation_channel(NodeId::ROOT, Interpolation::Linear);
        assert_eq!(
            channel.sample(-1.0),
            Some(ChannelValue::Translation([0.0, 0.0, 0.0].into()))
        );
        assert_eq!(
            channel.sample(7.0),
            Some(ChannelValue::Translation([10.0, 10.0, 0.0].into()))
        );
    }

    #[test]
    fn rotation_uses_slerp() {
        let channel = Channel {
            target: NodeId::ROOT,
            interpolation: Interpolation::Linear,
            timestamps: vec![0.0, 1.0],
            keyframes: Keyframes::Rotation(vec![
                Quaternion::one(),
                Quaternion::from_angle_y(Deg(90.0)),
            ]),
        };
        let Some(ChannelValue::Rotation(q)) = channel.sample(0.5) else {
            panic!("expected a rotation");
        };
        let expected = Quaternion::from_angle_y(Deg(45.0));
        assert!((q.v - expected.v).magnitude() < 1e-4);
        assert!((q.s - expected.s).abs() < 1e-4);
    }

    #[test]
    fn empty_clip_list_has_no_state() {
        assert!(AnimationState::new(Vec::new()).is_none());
    }

    #[test]
    fn first_clip_plays_immediately() {
        let clips = vec![
            AnimationClip::new("walk".into(), vec![]),
            AnimationClip::new("run".into(), vec![]),
        ];
        let state = AnimationState::new(clips).unwrap();
        assert!(state.is_playing());
        assert_eq!(state.active_clip().name, "walk");
    }

    #[test]
    fn advance_writes_pose_and_loops() {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(NodeId::ROOT, "bone", Transform::identity(), None);
        let clip = AnimationClip::new(
            "move".into(),
            vec![translation_channel(node, Interpolation::Linear)],
        );
        let mut state = AnimationState::new(vec![clip]).unwrap();

        assert_eq!(state.advance(0.5, &mut graph), 0);
        assert_eq!(graph.node(node).unwrap().local.position, [5.0, 0.0, 0.0].into());

        // 0.5 + 2.0 wraps around the two second clip back to 0.5
        state.advance(2.0, &mut graph);
        assert!((state.time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn paused_state_does_not_move() {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(NodeId::ROOT, "bone", Transform::identity(), None);
        let clip = AnimationClip::new(
            "move".into(),
            vec![translation_channel(node, Interpolation::Linear)],
        );
        let mut state = AnimationState::new(vec![clip]).unwrap();
        state.pause();
        state.advance(0.5, &mut graph);
        assert_eq!(state.time(), 0.0);
        assert_eq!(graph.node(node).unwrap().local, Transform::identity());
    }

    #[test]
    fn missing_targets_are_counted_and_skipped() {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(NodeId::ROOT, "bone", Transform::identity(), None);
        let clip = AnimationClip::new(
            "move".into(),
            vec![
                translation_channel(NodeId::from_index(99), Interpolation::Linear),
                translation_channel(node, Interpolation::Linear),
            ],
        );
        let mut state = AnimationState::new(vec![clip]).unwrap();
        assert_eq!(state.advance(1.0, &mut graph), 1);
        assert_eq!(graph.node(node).unwrap().local.position, [10.0, 0.0, 0.0].into());
    }

    #[test]
    fn rebind_maps_and_drops_targets() {
        let mapped = NodeId::from_index(7);
        let clip = AnimationClip::new(
            "a".into(),
            vec![
                translation_channel(NodeId::from_index(0), Interpolation::Linear),
                translation_channel(NodeId::from_index(1), Interpolation::Linear),
                translation_channel(NodeId::from_index(3), Interpolation::Linear),
            ],
        );
        // node 1 was not attached, node 3 is past the asset's node table
        let clip = clip.rebind(&[Some(mapped), None]);
        assert_eq!(clip.channels.len(), 1);
        assert_eq!(clip.channels[0].target, mapped);
    }
}
