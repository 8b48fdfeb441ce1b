//! Record-then-replay cycle.
//!
//! Audio is stored while recording. The first chunk that arrives after the
//! record window closes flips the cycle to playback and hands back everything
//! stored; that chunk itself is not kept. Audio arriving during playback is
//! ignored, and the first chunk after the playback window flips back to
//! recording with an empty store.

use std::time::Duration;

use tokio::time::Instant;
use voxrelay_core::audio::AudioChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Recording,
    Playback,
}

pub struct ReplayCycle {
    record_for: Duration,
    playback_for: Duration,
    phase: Phase,
    phase_started: Instant,
    stored: Vec<AudioChunk>,
}

impl ReplayCycle {
    pub fn new(record_for: Duration, playback_for: Duration, now: Instant) -> Self {
        Self {
            record_for,
            playback_for,
            phase: Phase::Recording,
            phase_started: now,
            stored: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stored_len(&self) -> usize {
        self.stored.len()
    }

    /// Feed one audio chunk. Returns the recorded batch when the cycle
    /// switches to playback (possibly empty).
    pub fn on_audio(&mut self, now: Instant, chunk: AudioChunk) -> Option<Vec<AudioChunk>> {
        let elapsed = now.saturating_duration_since(self.phase_started);
        match self.phase {
            Phase::Recording if elapsed < self.record_for => {
                self.stored.push(chunk);
                None
            }
            Phase::Recording => {
                self.phase = Phase::Playback;
                self.phase_started = now;
                tracing::info!(chunks = self.stored.len(), "switching to playback phase");
                Some(std::mem::take(&mut self.stored))
            }
            Phase::Playback if elapsed < self.playback_for => None,
            Phase::Playback => {
                self.reset(now);
                tracing::info!("switching to recording phase");
                None
            }
        }
    }

    /// Restart at the beginning of a recording window.
    pub fn reset(&mut self, now: Instant) {
        self.phase = Phase::Recording;
        self.phase_started = now;
        self.stored.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(b: u8) -> AudioChunk {
        AudioChunk::new(vec![b])
    }

    #[test]
    fn records_then_replays_in_order() {
        let t0 = Instant::now();
        let secs = Duration::from_secs;
        let mut cycle = ReplayCycle::new(secs(5), secs(5), t0);

        assert!(cycle.on_audio(t0 + secs(1), c(1)).is_none());
        assert!(cycle.on_audio(t0 + secs(2), c(2)).is_none());
        assert!(cycle.on_audio(t0 + secs(3), c(3)).is_none());

        let batch = cycle.on_audio(t0 + secs(5), c(4)).expect("switch to playback");
        assert_eq!(batch, vec![c(1), c(2), c(3)]);
        assert_eq!(cycle.phase(), Phase::Playback);

        // ignored during playback
        assert!(cycle.on_audio(t0 + secs(7), c(5)).is_none());
        assert_eq!(cycle.stored_len(), 0);

        // flips back, the flipping chunk is not recorded
        assert!(cycle.on_audio(t0 + secs(10), c(6)).is_none());
        assert_eq!(cycle.phase(), Phase::Recording);
        assert_eq!(cycle.stored_len(), 0);

        assert!(cycle.on_audio(t0 + secs(11), c(7)).is_none());
        assert_eq!(cycle.stored_len(), 1);
    }

    #[test]
    fn empty_recording_still_switches() {
        let t0 = Instant::now();
        let mut cycle = ReplayCycle::new(Duration::from_secs(1), Duration::from_secs(1), t0);
        let batch = cycle.on_audio(t0 + Duration::from_secs(2), c(1));
        assert_eq!(batch, Some(vec![]));
    }
}
