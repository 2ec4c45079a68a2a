use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lipsync_core::{
    extract_cues, AppConfig, ChatRequest, ClockHandle, CueSet, FrameHost, LipsyncError, MediaClock,
    PlaybackClock, SceneNode, SessionEvent, SyncLoop, SyncSession,
};
use tracing_subscriber::EnvFilter;

fn main() -> lipsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { cues, time, config } => run_resolve(&cues, time, config.as_deref()),
        Commands::Simulate {
            cues,
            character,
            config,
            fps,
            max_frames,
        } => run_simulate(
            &cues,
            character.as_deref(),
            config.as_deref(),
            fps,
            max_frames,
        ),
        Commands::Validate { cues } => run_validate(&cues),
        Commands::Request { prompt } => run_request(&prompt),
    }
}

fn run_resolve(cues: &Path, time: f64, config: Option<&Path>) -> lipsync_core::Result<()> {
    let config = AppConfig::load_or_default(config)?;
    let cues = load_cues(cues)?;

    let cue = cues.resolve(time);
    let pose = cue.and_then(|cue| config.poses.pose_for(&cue.label));
    tracing::debug!(time, found = cue.is_some(), "resolved cue");

    let report = serde_json::json!({ "time": time, "cue": cue, "pose": pose });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_simulate(
    cues: &Path,
    character: Option<&Path>,
    config: Option<&Path>,
    fps: Option<u32>,
    max_frames: Option<usize>,
) -> lipsync_core::Result<()> {
    let mut config = AppConfig::load_or_default(config)?;
    if let Some(max_frames) = max_frames {
        config.sync.max_frames = max_frames;
    }
    let fps = fps.unwrap_or(config.sync.frame_rate).max(1);
    tracing::info!(?cues, ?character, fps, "starting simulated playback");

    let mut events = Vec::new();
    match character.map(SceneNode::load).transpose() {
        Ok(scene) => events.push(SessionEvent::CharacterLoaded(
            scene.unwrap_or_else(SceneNode::viseme_head),
        )),
        Err(err) => events.push(SessionEvent::CharacterFailed(err.to_string())),
    }

    let mut duration = 0.0;
    match load_cues(cues) {
        Ok(set) => {
            duration = set.duration();
            events.push(SessionEvent::CuesReceived(set));
        }
        Err(err) => events.push(SessionEvent::TimingDataFailed(err.to_string())),
    }

    let clock = ClockHandle::new(MediaClock::new());
    clock.update(|media| {
        media.load();
        media.play();
    });

    let frames = config.sync.frame_budget(duration, fps);
    let mut host = SimulatedDisplay::new(clock.clone(), fps, frames, events);
    let mut session = SyncSession::from_config(&config);
    SyncLoop::new(clock).run(&mut session, &mut host);

    for (time, pose) in &host.timeline {
        println!("{time:>8.3}s  {}", pose.as_deref().unwrap_or("neutral"));
    }
    Ok(())
}

fn run_validate(cues: &Path) -> lipsync_core::Result<()> {
    let set = load_cues(cues)?;
    set.validate()?;
    println!("ok: {} cues spanning {:.3}s", set.len(), set.duration());
    Ok(())
}

fn run_request(prompt: &str) -> lipsync_core::Result<()> {
    let request = ChatRequest::new(prompt).ok_or_else(|| LipsyncError::msg("prompt is empty"))?;
    println!("{}", serde_json::to_string(&request)?);
    Ok(())
}

/// Reads a timing document or a saved chat reply.
fn load_cues(path: &Path) -> lipsync_core::Result<CueSet> {
    let text = std::fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&text)?;
    Ok(extract_cues(&document))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Stand-in for the display refresh: advances the media clock by one frame
/// interval per tick and records every pose switch it renders.
struct SimulatedDisplay {
    clock: ClockHandle,
    interval: f64,
    frame: usize,
    limit: usize,
    pending: Vec<SessionEvent>,
    timeline: Vec<(f64, Option<String>)>,
}

impl SimulatedDisplay {
    fn new(clock: ClockHandle, fps: u32, limit: usize, pending: Vec<SessionEvent>) -> Self {
        Self {
            clock,
            interval: 1.0 / f64::from(fps),
            frame: 0,
            limit,
            pending,
            timeline: Vec::new(),
        }
    }
}

impl FrameHost for SimulatedDisplay {
    fn next_frame(&mut self) -> Option<Vec<SessionEvent>> {
        if self.frame >= self.limit {
            return None;
        }
        if self.frame > 0 {
            let interval = self.interval;
            self.clock.update(|media| media.advance(interval));
        }
        self.frame += 1;
        Some(std::mem::take(&mut self.pending))
    }

    fn render(&mut self, session: &SyncSession) -> lipsync_core::Result<()> {
        let pose = session.current_pose();
        let changed = self
            .timeline
            .last()
            .map_or(true, |(_, last)| last.as_deref() != pose);
        if changed {
            let time = self.clock.current_time().unwrap_or_default();
            self.timeline.push((time, pose.map(str::to_owned)));
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lipsync engine for the talking avatar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the cue and pose active at a single timestamp.
    Resolve {
        /// Lipsync document or saved chat reply.
        #[arg(short, long)]
        cues: PathBuf,
        /// Playback position in seconds.
        #[arg(short, long, allow_negative_numbers = true)]
        time: f64,
        /// Optional JSON config overriding the pose table.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Play an utterance against a simulated display and print the pose timeline.
    Simulate {
        /// Lipsync document or saved chat reply.
        #[arg(short, long)]
        cues: PathBuf,
        /// Scene description of the character; defaults to a standard viseme head.
        #[arg(long)]
        character: Option<PathBuf>,
        /// Optional JSON config.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Display refresh rate; overrides the config value.
        #[arg(long)]
        fps: Option<u32>,
        /// Stop after this many frames; overrides the config value.
        #[arg(long)]
        max_frames: Option<usize>,
    },
    /// Check a lipsync document for inverted, negative or out-of-order cues.
    Validate {
        /// Lipsync document or saved chat reply.
        cues: PathBuf,
    },
    /// Print the chat request body for a prompt.
    Request {
        /// Message to send; surrounding whitespace is trimmed.
        prompt: String,
    },
}
