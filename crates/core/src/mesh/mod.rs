use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Viseme channel names shipped on the standard avatar head rig.
pub const STANDARD_VISEMES: [&str; 15] = [
    "viseme_sil",
    "viseme_PP",
    "viseme_FF",
    "viseme_TH",
    "viseme_DD",
    "viseme_kk",
    "viseme_CH",
    "viseme_SS",
    "viseme_nn",
    "viseme_RR",
    "viseme_aa",
    "viseme_E",
    "viseme_I",
    "viseme_O",
    "viseme_U",
];

/// Named shape-blend weights of a single mesh.
///
/// The channel list is fixed at construction; only weights change afterwards.
/// Names are unique, the first occurrence wins when building from duplicates.
/// Serialised as a JSON object whose key order is the channel order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, f32>", into = "IndexMap<String, f32>")]
pub struct DeformationChannels {
    names: Vec<String>,
    weights: Vec<f32>,
}

impl DeformationChannels {
    /// Creates a channel set with every weight at zero.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        names.into_iter().map(|name| (name, 0.0_f32)).collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }

    pub fn weight(&self, name: &str) -> Option<f32> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| self.weights[index])
    }

    /// Overwrites the weight of an existing channel. Unknown names are ignored.
    pub fn set_weight(&mut self, name: &str, weight: f32) -> bool {
        match self.names.iter().position(|candidate| candidate == name) {
            Some(index) => {
                self.weights[index] = weight;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    pub fn total_weight(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Name of the first channel carrying a non-zero weight.
    pub fn active(&self) -> Option<&str> {
        self.iter()
            .find(|(_, weight)| *weight != 0.0)
            .map(|(name, _)| name)
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for DeformationChannels {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        let mut channels = Self::default();
        for (name, weight) in iter {
            let name = name.into();
            if !channels.contains(&name) {
                channels.names.push(name);
                channels.weights.push(weight);
            }
        }
        channels
    }
}

impl From<IndexMap<String, f32>> for DeformationChannels {
    fn from(map: IndexMap<String, f32>) -> Self {
        map.into_iter().collect()
    }
}

impl From<DeformationChannels> for IndexMap<String, f32> {
    fn from(channels: DeformationChannels) -> Self {
        channels.names.into_iter().zip(channels.weights).collect()
    }
}

/// Sets the channel named `target` to full weight and every other channel to zero.
///
/// With no target, or a target the mesh does not carry, every channel ends at
/// zero. Returns whether the target channel was found.
pub fn apply(target: Option<&str>, channels: &mut DeformationChannels) -> bool {
    let mut matched = false;
    for (name, weight) in channels.names.iter().zip(channels.weights.iter_mut()) {
        let selected = target == Some(name.as_str());
        *weight = if selected { 1.0 } else { 0.0 };
        matched |= selected;
    }
    matched
}

/// Geometry payload of a scene node. Only the morph dictionary matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph_targets: Option<DeformationChannels>,
}

/// Node of a loaded character's scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneNode>,
}

/// Typed view of a mesh node that carries deformation channels.
#[derive(Debug)]
pub struct DeformableNode<'a> {
    pub name: &'a str,
    pub channels: &'a mut DeformationChannels,
}

impl SceneNode {
    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        Self {
            name: name.into(),
            mesh: None,
            children,
        }
    }

    pub fn mesh(name: impl Into<String>, channels: Option<DeformationChannels>) -> Self {
        Self {
            name: name.into(),
            mesh: Some(Mesh {
                morph_targets: channels,
            }),
            children: Vec::new(),
        }
    }

    /// Minimal character: a head mesh with the standard viseme channels and
    /// a body mesh without any.
    pub fn viseme_head() -> Self {
        Self::group(
            "Character",
            vec![
                Self::mesh(
                    "Head",
                    Some(DeformationChannels::from_names(STANDARD_VISEMES)),
                ),
                Self::mesh("Body", None),
            ],
        )
    }

    /// Reads a scene description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Capability check: yields a deformable view when this node is a mesh
    /// with a morph dictionary.
    pub fn as_deformable(&mut self) -> Option<DeformableNode<'_>> {
        let channels = self.mesh.as_mut()?.morph_targets.as_mut()?;
        Some(DeformableNode {
            name: &self.name,
            channels,
        })
    }

    /// Every deformable node in depth-first pre-order.
    pub fn deformable_nodes(&mut self) -> Vec<DeformableNode<'_>> {
        let mut found = Vec::new();
        collect_deformable(self, &mut found);
        found
    }

    /// Read-only counterpart of [`SceneNode::deformable_nodes`].
    pub fn deformables(&self) -> Vec<(&str, &DeformationChannels)> {
        let mut found = Vec::new();
        collect_channels(self, &mut found);
        found
    }
}

fn collect_deformable<'a>(node: &'a mut SceneNode, found: &mut Vec<DeformableNode<'a>>) {
    let SceneNode {
        name,
        mesh,
        children,
    } = node;
    if let Some(channels) = mesh.as_mut().and_then(|mesh| mesh.morph_targets.as_mut()) {
        found.push(DeformableNode {
            name: name.as_str(),
            channels,
        });
    }
    for child in children {
        collect_deformable(child, found);
    }
}

fn collect_channels<'a>(node: &'a SceneNode, found: &mut Vec<(&'a str, &'a DeformationChannels)>) {
    if let Some(channels) = node.mesh.as_ref().and_then(|mesh| mesh.morph_targets.as_ref()) {
        found.push((node.name.as_str(), channels));
    }
    for child in &node.children {
        collect_channels(child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(pairs: &[(&str, f32)]) -> DeformationChannels {
        pairs.iter().map(|(name, weight)| (*name, *weight)).collect()
    }

    #[test]
    fn selects_exactly_one_channel() {
        let mut set = channels(&[("viseme_PP", 0.3), ("viseme_sil", 0.9), ("viseme_O", 0.0)]);
        assert!(apply(Some("viseme_PP"), &mut set));

        assert_eq!(set.weight("viseme_PP"), Some(1.0));
        assert_eq!(set.weight("viseme_sil"), Some(0.0));
        assert_eq!(set.weight("viseme_O"), Some(0.0));
        assert_eq!(set.total_weight(), 1.0);
        assert_eq!(set.active(), Some("viseme_PP"));
    }

    #[test]
    fn missing_or_absent_target_zeroes_everything() {
        let mut set = channels(&[("viseme_PP", 0.7), ("viseme_sil", 1.0)]);
        assert!(!apply(Some("viseme_RR"), &mut set));
        assert_eq!(set.total_weight(), 0.0);

        set.set_weight("viseme_sil", 0.4);
        assert!(!apply(None, &mut set));
        assert_eq!(set.total_weight(), 0.0);
        assert_eq!(set.active(), None);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut once = DeformationChannels::from_names(STANDARD_VISEMES);
        apply(Some("viseme_aa"), &mut once);
        let mut twice = once.clone();
        apply(Some("viseme_aa"), &mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_channel_set_is_tolerated() {
        let mut set = DeformationChannels::default();
        assert!(!apply(Some("viseme_PP"), &mut set));
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_names_keep_first_entry() {
        let set = channels(&[("a", 0.2), ("b", 0.0), ("a", 0.9)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.weight("a"), Some(0.2));
    }

    #[test]
    fn traversal_finds_only_meshes_with_channels() {
        let mut scene = SceneNode::group(
            "Root",
            vec![
                SceneNode::viseme_head(),
                SceneNode::group(
                    "Accessories",
                    vec![SceneNode::mesh(
                        "Teeth",
                        Some(DeformationChannels::from_names(["viseme_PP", "viseme_aa"])),
                    )],
                ),
                SceneNode::group("Lights", Vec::new()),
            ],
        );

        let names: Vec<_> = scene
            .deformable_nodes()
            .iter()
            .map(|node| node.name.to_string())
            .collect();
        assert_eq!(names, ["Head", "Teeth"]);

        for node in scene.deformable_nodes() {
            apply(Some("viseme_aa"), node.channels);
        }
        for (_, set) in scene.deformables() {
            assert_eq!(set.weight("viseme_aa"), Some(1.0));
            assert_eq!(set.total_weight(), 1.0);
        }
    }

    #[test]
    fn capability_check_rejects_plain_nodes() {
        assert!(SceneNode::group("Empty", Vec::new()).as_deformable().is_none());
        assert!(SceneNode::mesh("Body", None).as_deformable().is_none());
        let mut head = SceneNode::mesh("Head", Some(DeformationChannels::from_names(["x"])));
        assert_eq!(head.as_deformable().map(|node| node.name), Some("Head"));
    }

    #[test]
    fn deserializes_scene_description() {
        let scene: SceneNode = serde_json::from_str(
            r#"{
                "name": "Avatar",
                "children": [
                    { "name": "Wolf3D_Head", "mesh": { "morph_targets": { "viseme_PP": 0.0, "viseme_O": 0.5 } } },
                    { "name": "Wolf3D_Body", "mesh": {} }
                ]
            }"#,
        )
        .unwrap();

        let found = scene.deformables();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Wolf3D_Head");
        assert_eq!(found[0].1.weight("viseme_O"), Some(0.5));
    }

    #[test]
    fn serde_keeps_channel_order() {
        let set: DeformationChannels =
            serde_json::from_str(r#"{ "viseme_sil": 0.0, "viseme_O": 0.4, "viseme_PP": 0.6 }"#)
                .unwrap();
        let names: Vec<_> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["viseme_sil", "viseme_O", "viseme_PP"]);
        assert_eq!(set.active(), Some("viseme_O"));

        let text = serde_json::to_string(&set).unwrap();
        assert_eq!(text, r#"{"viseme_sil":0.0,"viseme_O":0.4,"viseme_PP":0.6}"#);
        let back: DeformationChannels = serde_json::from_str(&text).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.active(), Some("viseme_O"));
    }
}
