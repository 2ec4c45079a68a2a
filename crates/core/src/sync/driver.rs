use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::{FrameOutcome, SessionEvent, SyncSession};
use crate::{clock::PlaybackClock, Result};

/// Display host that paces the loop and owns rendering.
pub trait FrameHost {
    /// Yields until the next display refresh and returns the events delivered
    /// since the previous one. `None` means the host is tearing down.
    fn next_frame(&mut self) -> Option<Vec<SessionEvent>>;

    /// Redraws the scene after the frame's pose update.
    fn render(&mut self, session: &SyncSession) -> Result<()>;
}

/// Cooperative stop flag shared between the loop and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-frame driver: clock, resolve, look up, apply, render, repeat.
#[derive(Debug)]
pub struct SyncLoop<C> {
    clock: C,
    cancel: CancelToken,
    frames: u64,
}

impl<C: PlaybackClock> SyncLoop<C> {
    pub fn new(clock: C) -> Self {
        Self::with_cancel(clock, CancelToken::new())
    }

    pub fn with_cancel(clock: C, cancel: CancelToken) -> Self {
        Self {
            clock,
            cancel,
            frames: 0,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Applies pending events, then runs the pose update for the current
    /// clock reading.
    pub fn tick(&mut self, session: &mut SyncSession, events: Vec<SessionEvent>) -> FrameOutcome {
        for event in events {
            session.handle(event);
        }
        let outcome = session.step(self.clock.current_time());
        self.frames += 1;
        outcome
    }

    /// Runs until the host tears down or the token is cancelled. Nothing that
    /// happens inside a frame stops the loop.
    pub fn run<H: FrameHost>(&mut self, session: &mut SyncSession, host: &mut H) -> u64 {
        let started = self.frames;
        while !self.cancel.is_cancelled() {
            let Some(events) = host.next_frame() else {
                break;
            };
            self.tick(session, events);
            if let Err(err) = host.render(session) {
                tracing::warn!(%err, frame = self.frames, "render step failed");
            }
        }

        let frames = self.frames - started;
        tracing::info!(frames, cancelled = self.cancel.is_cancelled(), "sync loop stopped");
        frames
    }
}
