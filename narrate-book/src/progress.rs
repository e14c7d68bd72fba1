//! Overall run progress as a single percentage.

use crate::pipeline::PipelineEvent;
use tokio::sync::mpsc::UnboundedSender;

/// Pipeline phases that report progress, each owning a slice of [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extracting,
    Synthesizing,
    Muxing,
}

impl Phase {
    fn range(self) -> (f32, f32) {
        match self {
            Phase::Extracting => (0.0, 10.0),
            Phase::Synthesizing => (10.0, 90.0),
            Phase::Muxing => (90.0, 100.0),
        }
    }
}

/// Maps per-phase fractions onto one non-decreasing percentage.
///
/// Reports never go backwards and never reach 100; only [`complete`](Self::complete) does.
#[derive(Debug)]
pub struct ProgressTracker {
    events: UnboundedSender<PipelineEvent>,
    current: u8,
}

impl ProgressTracker {
    pub fn new(events: UnboundedSender<PipelineEvent>) -> Self {
        Self { events, current: 0 }
    }

    #[cfg(test)]
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Report `fraction` (0.0..=1.0) of `phase` as done.
    pub fn report(&mut self, phase: Phase, fraction: f32) {
        let (start, end) = phase.range();
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let value = (start + (end - start) * fraction).floor() as u8;
        self.advance(value.min(99));
    }

    /// Emit 100. Called once the output is in place.
    pub fn complete(&mut self) {
        self.advance(100);
    }

    fn advance(&mut self, value: u8) {
        if value <= self.current {
            return;
        }
        self.current = value;
        // Nobody listening is fine
        let _ = self.events.send(PipelineEvent::Progress(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<u8> {
        let mut values = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Progress(p) = event {
                values.push(p);
            }
        }
        values
    }

    #[test]
    fn test_phase_ranges() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(tx);

        tracker.report(Phase::Extracting, 1.0);
        assert_eq!(tracker.current(), 10);
        tracker.report(Phase::Synthesizing, 0.5);
        assert_eq!(tracker.current(), 50);
        tracker.report(Phase::Synthesizing, 1.0);
        assert_eq!(tracker.current(), 90);
        tracker.report(Phase::Muxing, 1.0);
        assert_eq!(tracker.current(), 99);
        tracker.complete();

        assert_eq!(drain(&mut rx), vec![10, 50, 90, 99, 100]);
    }

    #[test]
    fn test_never_goes_backwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(tx);

        tracker.report(Phase::Synthesizing, 0.5);
        tracker.report(Phase::Extracting, 0.3);
        tracker.report(Phase::Synthesizing, 0.25);
        tracker.report(Phase::Synthesizing, f32::NAN);

        assert_eq!(tracker.current(), 50);
        assert_eq!(drain(&mut rx), vec![50]);
    }

    #[test]
    fn test_out_of_range_fraction_is_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut tracker = ProgressTracker::new(tx);
        tracker.report(Phase::Extracting, 7.0);
        assert_eq!(tracker.current(), 10);
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut tracker = ProgressTracker::new(tx);
        tracker.complete();
        assert_eq!(tracker.current(), 100);
    }
}
