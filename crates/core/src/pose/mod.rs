use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rhubarb extended mouth shapes paired with the viseme channel each one drives.
pub const RHUBARB_VISEMES: [(&str, &str); 9] = [
    ("A", "viseme_PP"),
    ("B", "viseme_SS"),
    ("C", "viseme_E"),
    ("D", "viseme_aa"),
    ("E", "viseme_O"),
    ("F", "viseme_U"),
    ("G", "viseme_FF"),
    ("H", "viseme_RR"),
    ("X", "viseme_sil"),
];

/// Fixed mapping from cue label to the deformation channel that represents it.
///
/// Labels without an entry map to no pose, which the applicator renders as the
/// neutral, fully closed mouth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseTable {
    entries: BTreeMap<String, String>,
}

impl Default for PoseTable {
    fn default() -> Self {
        Self::rhubarb()
    }
}

impl PoseTable {
    pub fn rhubarb() -> Self {
        Self::from_pairs(RHUBARB_VISEMES)
    }

    pub fn from_pairs<L, P>(pairs: impl IntoIterator<Item = (L, P)>) -> Self
    where
        L: Into<String>,
        P: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(label, pose)| (label.into(), pose.into()))
                .collect(),
        }
    }

    pub fn pose_for(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(label, pose)| (label.as_str(), pose.as_str()))
    }
}

/// Looks up the pose for `label`; absent labels yield `None`.
pub fn pose_for<'t>(label: &str, table: &'t PoseTable) -> Option<&'t str> {
    table.pose_for(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_rhubarb_shapes() {
        let table = PoseTable::default();
        assert_eq!(table.len(), 9);
        assert_eq!(pose_for("A", &table), Some("viseme_PP"));
        assert_eq!(pose_for("X", &table), Some("viseme_sil"));
    }

    #[test]
    fn unknown_labels_have_no_pose() {
        let table = PoseTable::default();
        assert_eq!(pose_for("Z", &table), None);
        assert_eq!(pose_for("", &table), None);
        assert_eq!(pose_for("a", &table), None);
    }

    #[test]
    fn deserializes_from_plain_map() {
        let table: PoseTable =
            serde_json::from_str(r#"{ "A": "mouth_closed", "D": "mouth_open" }"#).unwrap();
        assert_eq!(table.pose_for("D"), Some("mouth_open"));
        assert_eq!(table.pose_for("B"), None);
    }
}
