//! Per-frame lipsync state transition and the session that owns its inputs.

mod driver;

pub use driver::{CancelToken, FrameHost, SyncLoop};

use serde::{Deserialize, Serialize};

use crate::{
    chat::AssistantMessage,
    config::AppConfig,
    cues::{Cue, CueCursor, CueSet},
    mesh::{self, DeformationChannels, SceneNode},
    pose::PoseTable,
};

/// What to do with the mouth when no pose is resolved for a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilencePolicy {
    /// Drive every channel to zero: closed, neutral mouth.
    #[default]
    Neutral,
    /// Leave the weights untouched while no cue set is published, so the last
    /// pose stays on screen. Gaps and unmapped labels still go neutral.
    HoldLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Character or cue data still missing.
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCharacter,
    NoCues,
    ClockUnavailable,
}

/// Decision for a single frame, before it touches any mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePlan<'a> {
    Skip(SkipReason),
    Pose {
        time: f64,
        cue: Option<&'a Cue>,
        pose: Option<&'a str>,
    },
}

/// Result of one frame as observed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Applied {
        label: Option<String>,
        pose: Option<String>,
        /// Deformable meshes that were written.
        meshes: usize,
        /// Meshes that carry the selected channel.
        matched: usize,
    },
}

/// Decides the pose for one frame from the clock reading and the current cues.
pub fn plan_frame<'a>(
    time: Option<f64>,
    cues: Option<&'a CueSet>,
    poses: &'a PoseTable,
    policy: SilencePolicy,
) -> FramePlan<'a> {
    plan_frame_with(time, cues, poses, policy, |time, set| set.resolve(time))
}

fn plan_frame_with<'a>(
    time: Option<f64>,
    cues: Option<&'a CueSet>,
    poses: &'a PoseTable,
    policy: SilencePolicy,
    resolve: impl FnOnce(f64, &'a CueSet) -> Option<&'a Cue>,
) -> FramePlan<'a> {
    let Some(time) = time.filter(|time| time.is_finite()) else {
        return FramePlan::Skip(SkipReason::ClockUnavailable);
    };

    if cues.is_none() && policy == SilencePolicy::HoldLast {
        return FramePlan::Skip(SkipReason::NoCues);
    }

    let cue = cues.and_then(|set| resolve(time, set));
    let pose = cue.and_then(|cue| poses.pose_for(&cue.label));
    FramePlan::Pose { time, cue, pose }
}

/// Runs one frame against a single channel set: `(clock, cues, channels) -> channels'`.
pub fn sync_frame(
    time: Option<f64>,
    cues: Option<&CueSet>,
    poses: &PoseTable,
    policy: SilencePolicy,
    channels: &mut DeformationChannels,
) -> FrameOutcome {
    match plan_frame(time, cues, poses, policy) {
        FramePlan::Skip(reason) => FrameOutcome::Skipped(reason),
        FramePlan::Pose { cue, pose, .. } => {
            let matched = mesh::apply(pose, channels);
            FrameOutcome::Applied {
                label: cue.map(|cue| cue.label.clone()),
                pose: pose.map(str::to_owned),
                meshes: 1,
                matched: usize::from(matched),
            }
        }
    }
}

/// Input delivered to the session by the host between frames.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    CharacterLoaded(SceneNode),
    CharacterFailed(String),
    CuesReceived(CueSet),
    CuesCleared,
    TimingDataFailed(String),
    AssistantMessage(AssistantMessage),
}

/// Everything the sync loop needs across frames: the loaded character, the
/// published cue set and the pose configuration.
#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    character: Option<SceneNode>,
    cues: Option<CueSet>,
    poses: PoseTable,
    policy: SilencePolicy,
    cursor: CueCursor,
    last_pose: Option<String>,
}

impl SyncSession {
    pub fn new(poses: PoseTable, policy: SilencePolicy) -> Self {
        Self {
            poses,
            policy,
            ..Default::default()
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.poses.clone(), config.sync.silence)
    }

    pub fn state(&self) -> SyncState {
        if self.character.is_some() && self.cues.is_some() {
            SyncState::Active
        } else {
            SyncState::Idle
        }
    }

    pub fn character(&self) -> Option<&SceneNode> {
        self.character.as_ref()
    }

    pub fn cues(&self) -> Option<&CueSet> {
        self.cues.as_ref()
    }

    pub fn poses(&self) -> &PoseTable {
        &self.poses
    }

    pub fn policy(&self) -> SilencePolicy {
        self.policy
    }

    /// Pose written by the most recent applied frame.
    pub fn current_pose(&self) -> Option<&str> {
        self.last_pose.as_deref()
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CharacterLoaded(scene) => self.load_character(scene),
            SessionEvent::CharacterFailed(reason) => self.character_failed(&reason),
            SessionEvent::CuesReceived(cues) => self.set_cues(cues),
            SessionEvent::CuesCleared => self.clear_cues(),
            SessionEvent::TimingDataFailed(reason) => self.timing_data_failed(&reason),
            SessionEvent::AssistantMessage(message) => self.receive_assistant_message(&message),
        }
    }

    pub fn load_character(&mut self, scene: SceneNode) {
        let meshes = scene.deformables();
        if meshes.is_empty() {
            tracing::warn!(character = %scene.name, "character has no meshes with morph targets");
        }
        for (name, channels) in &meshes {
            let targets: Vec<_> = channels.iter().map(|(target, _)| target).collect();
            tracing::info!(mesh = *name, ?targets, "found morph targets");
        }

        self.character = Some(scene);
        self.last_pose = None;
    }

    /// The character stays absent; the loop keeps running as a no-op.
    pub fn character_failed(&mut self, reason: &str) {
        tracing::error!(reason, "character load failed");
    }

    /// Publishes a new cue set, replacing the previous one wholesale.
    ///
    /// Republishing the set that is already active keeps the resolver position.
    pub fn set_cues(&mut self, cues: CueSet) {
        if self.cues.as_ref().is_some_and(|active| active.same_set(&cues)) {
            tracing::trace!("cue set already active");
            return;
        }
        tracing::info!(cues = cues.len(), duration = cues.duration(), "loaded lipsync cues");
        self.cues = Some(cues);
        self.cursor.reset();
    }

    pub fn clear_cues(&mut self) {
        self.cues = None;
        self.cursor.reset();
    }

    pub fn timing_data_failed(&mut self, reason: &str) {
        tracing::warn!(reason, "failed to load lipsync data");
    }

    /// A reply without lipsync data clears the cues so the previous utterance
    /// does not keep driving the mouth.
    pub fn receive_assistant_message(&mut self, message: &AssistantMessage) {
        tracing::debug!(role = %message.role, text = message.display_text(), "assistant reply");
        match message.cues() {
            Some(cues) => self.set_cues(cues),
            None => self.clear_cues(),
        }
    }

    /// Runs one frame at `time` against every deformable mesh of the character.
    pub fn step(&mut self, time: Option<f64>) -> FrameOutcome {
        let Self {
            character,
            cues,
            poses,
            policy,
            cursor,
            last_pose,
        } = self;

        let Some(character) = character.as_mut() else {
            tracing::trace!("no character loaded; skipping frame");
            return FrameOutcome::Skipped(SkipReason::NoCharacter);
        };

        let plan = plan_frame_with(time, cues.as_ref(), poses, *policy, |time, set| {
            cursor.resolve(time, set)
        });

        let (time, cue, pose) = match plan {
            FramePlan::Skip(reason) => {
                tracing::trace!(?reason, "skipping frame");
                return FrameOutcome::Skipped(reason);
            }
            FramePlan::Pose { time, cue, pose } => (time, cue, pose),
        };

        let mut meshes = 0;
        let mut matched = 0;
        for node in character.deformable_nodes() {
            meshes += 1;
            if mesh::apply(pose, node.channels) {
                matched += 1;
            }
        }

        if last_pose.as_deref() != pose {
            let label = cue.map(|cue| cue.label.as_str());
            tracing::debug!(time, label, pose, meshes, matched, "pose switch");
            if pose.is_some() && matched == 0 {
                tracing::debug!(pose, "no mesh carries the selected channel");
            }
            *last_pose = pose.map(str::to_owned);
        }

        FrameOutcome::Applied {
            label: cue.map(|cue| cue.label.clone()),
            pose: pose.map(str::to_owned),
            meshes,
            matched,
        }
    }
}
