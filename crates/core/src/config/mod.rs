use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PoseTable, Result, SilencePolicy};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poses: PoseTable,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Loads a JSON config file; omitted fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(?path, "loaded config");
        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Configuration specific to the sync loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub silence: SilencePolicy,
    /// Display refresh rate used when the loop is driven by a simulated host.
    pub frame_rate: u32,
    /// Upper bound on frames a simulated host runs for one utterance.
    pub max_frames: usize,
}

impl SyncConfig {
    /// Frames needed to play `duration` seconds at `fps`, including the frame
    /// at time zero, clamped to `max_frames`.
    pub fn frame_budget(&self, duration: f64, fps: u32) -> usize {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        // Float to int casts saturate, so a huge duration lands on usize::MAX.
        let needed = ((duration * f64::from(fps)).ceil() as usize).saturating_add(1);
        if needed > self.max_frames {
            tracing::warn!(
                duration,
                fps,
                needed,
                max_frames = self.max_frames,
                "simulation truncated"
            );
        }
        needed.min(self.max_frames)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            silence: SilencePolicy::Neutral,
            frame_rate: 60,
            max_frames: 36_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.frame_rate, 60);
        assert_eq!(config.sync.max_frames, 36_000);
        assert_eq!(config.poses.pose_for("A"), Some("viseme_PP"));
    }

    #[test]
    fn overrides_policy_and_poses() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "poses": { "A": "mouth_closed" }, "sync": { "silence": "hold_last" } }"#,
        )
        .unwrap();
        assert_eq!(config.sync.silence, SilencePolicy::HoldLast);
        assert_eq!(config.sync.frame_rate, 60);
        assert_eq!(config.poses.pose_for("A"), Some("mouth_closed"));
        assert_eq!(config.poses.pose_for("X"), None);
    }

    #[test]
    fn frame_budget_covers_the_utterance() {
        let sync = SyncConfig::default();
        assert_eq!(sync.frame_budget(0.0, 60), 1);
        assert_eq!(sync.frame_budget(1.0, 60), 61);
        assert_eq!(sync.frame_budget(0.51, 10), 7);
        assert_eq!(sync.frame_budget(-2.0, 60), 1);
        assert_eq!(sync.frame_budget(f64::NAN, 60), 1);
    }

    #[test]
    fn frame_budget_is_capped_for_huge_durations() {
        let sync = SyncConfig {
            max_frames: 500,
            ..SyncConfig::default()
        };
        assert_eq!(sync.frame_budget(1e300, 60), 500);
        assert_eq!(sync.frame_budget(f64::MAX, u32::MAX), 500);
        assert_eq!(sync.frame_budget(8.0, 60), 481);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::LipsyncError::Io(_)));
    }
}
