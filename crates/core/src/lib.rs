//! Core library for the lipsync avatar.
//!
//! Each frame the sync loop reads the audio playback clock, finds the mouth
//! cue covering that instant, maps its label to a viseme channel and switches
//! every deformable mesh of the character to that single channel. Scene setup,
//! asset decoding, audio playback and networking stay with the host; this
//! crate only models the data they hand over.

pub mod chat;
pub mod clock;
pub mod config;
pub mod cues;
pub mod error;
pub mod mesh;
pub mod pose;
pub mod sync;

pub use chat::{extract_cues, AssistantMessage, ChatRequest, ChatResponse};
pub use clock::{ClockHandle, MediaClock, PlaybackClock};
pub use config::{AppConfig, SyncConfig};
pub use cues::{resolve, Cue, CueCursor, CueSet};
pub use error::{LipsyncError, Result};
pub use mesh::{apply, DeformableNode, DeformationChannels, SceneNode};
pub use pose::{pose_for, PoseTable};
pub use sync::{
    plan_frame, sync_frame, CancelToken, FrameHost, FrameOutcome, FramePlan, SessionEvent,
    SilencePolicy, SkipReason, SyncLoop, SyncSession, SyncState,
};
