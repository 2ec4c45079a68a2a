use std::sync::{Arc, Mutex};

/// Read-only source of the elapsed time of the audio stream, in seconds.
///
/// `None` means no media is loaded. A value may still be non-finite; readers
/// treat that the same as `None`.
pub trait PlaybackClock {
    fn current_time(&self) -> Option<f64>;
}

/// Transport state of a single media element.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaClock {
    position: Option<f64>,
    playing: bool,
}

impl MediaClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads new media, rewinding to zero in the paused state.
    pub fn load(&mut self) {
        self.position = Some(0.0);
        self.playing = false;
    }

    pub fn unload(&mut self) {
        self.position = None;
        self.playing = false;
    }

    /// Starts playback. Has no effect without loaded media.
    pub fn play(&mut self) {
        self.playing = self.position.is_some();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn reset(&mut self) {
        if self.position.is_some() {
            self.position = Some(0.0);
        }
    }

    /// Moves the position forward while playing; frozen while paused.
    pub fn advance(&mut self, delta: f64) {
        if let (true, Some(position)) = (self.playing, self.position) {
            self.position = Some((position + delta).max(0.0));
        }
    }

    /// Jumps to `seconds`, in either direction. Ignored without loaded media.
    pub fn seek(&mut self, seconds: f64) {
        if self.position.is_some() {
            self.position = Some(seconds.max(0.0));
        }
    }
}

impl PlaybackClock for MediaClock {
    fn current_time(&self) -> Option<f64> {
        self.position
    }
}

/// Shared handle over a [`MediaClock`]: the host advances it, the sync loop
/// reads it.
#[derive(Debug, Clone, Default)]
pub struct ClockHandle {
    shared: Arc<Mutex<MediaClock>>,
}

impl ClockHandle {
    pub fn new(clock: MediaClock) -> Self {
        Self {
            shared: Arc::new(Mutex::new(clock)),
        }
    }

    /// Runs `f` against the underlying clock. Returns `None` if the lock has
    /// been poisoned.
    pub fn update<R>(&self, f: impl FnOnce(&mut MediaClock) -> R) -> Option<R> {
        match self.shared.lock() {
            Ok(mut clock) => Some(f(&mut clock)),
            Err(_) => {
                tracing::warn!("playback clock has been poisoned");
                None
            }
        }
    }
}

impl PlaybackClock for ClockHandle {
    fn current_time(&self) -> Option<f64> {
        self.shared.lock().ok()?.current_time()
    }
}

/// Fixed timestamp, handy for driving single frames.
impl PlaybackClock for f64 {
    fn current_time(&self) -> Option<f64> {
        Some(*self)
    }
}

impl PlaybackClock for Option<f64> {
    fn current_time(&self) -> Option<f64> {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_clock_has_no_time() {
        let clock = MediaClock::new();
        assert_eq!(clock.current_time(), None);
    }

    #[test]
    fn advances_only_while_playing() {
        let mut clock = MediaClock::new();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), None);

        clock.load();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), Some(0.0));

        clock.play();
        clock.advance(0.25);
        clock.advance(0.25);
        assert_eq!(clock.current_time(), Some(0.5));

        clock.pause();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), Some(0.5));
    }

    #[test]
    fn seek_and_reset_keep_media_loaded() {
        let mut clock = MediaClock::new();
        clock.seek(3.0);
        assert_eq!(clock.current_time(), None);

        clock.load();
        clock.seek(3.0);
        assert_eq!(clock.current_time(), Some(3.0));
        clock.seek(-2.0);
        assert_eq!(clock.current_time(), Some(0.0));
        clock.seek(1.5);
        clock.reset();
        assert_eq!(clock.current_time(), Some(0.0));

        clock.unload();
        clock.play();
        assert!(!clock.is_playing());
    }

    #[test]
    fn handles_share_one_clock() {
        let writer = ClockHandle::default();
        let reader = writer.clone();

        writer.update(|clock| {
            clock.load();
            clock.play();
            clock.advance(0.75);
        });

        assert_eq!(reader.current_time(), Some(0.75));
    }
}
