use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{FrameKind, TickError};
use crate::pipeline::{ColorWrite, TickOutcome};

/// Running tick counters plus a periodic rate report.
#[derive(Debug, Clone)]
pub struct TickStats {
    pub completed: u64,
    pub depth_unavailable: u64,
    pub color_unavailable: u64,
    pub failed: u64,
    pub panicked: u64,
    pub color_skipped: u64,
    interval: Duration,
    window_start: Instant,
    window_ticks: u32,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl TickStats {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(interval: Duration) -> Self {
        Self {
            completed: 0,
            depth_unavailable: 0,
            color_unavailable: 0,
            failed: 0,
            panicked: 0,
            color_skipped: 0,
            interval,
            window_start: Instant::now(),
            window_ticks: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.depth_unavailable + self.color_unavailable + self.failed + self.panicked
    }

    pub fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Completed(report) => {
                self.completed += 1;
                self.window_ticks += 1;
                if matches!(report.color, ColorWrite::Skipped { .. }) {
                    self.color_skipped += 1;
                }
            }
            TickOutcome::Dropped(TickError::FrameUnavailable(FrameKind::Depth)) => self.depth_unavailable += 1,
            TickOutcome::Dropped(TickError::FrameUnavailable(FrameKind::Color)) => self.color_unavailable += 1,
            TickOutcome::Dropped(TickError::Panicked(_)) => self.panicked += 1,
            TickOutcome::Dropped(_) => self.failed += 1,
        }
        self.maybe_report();
    }

    /// Completed ticks per second over the current window.
    pub fn rate(&self) -> f32 {
        let secs = self.window_start.elapsed().as_secs_f32();
        if secs > 0.0 {
            self.window_ticks as f32 / secs
        } else {
            0.0
        }
    }

    fn maybe_report(&mut self) {
        if self.window_start.elapsed() < self.interval {
            return;
        }
        info!(
            "aligned FPS: {:.2} (completed {}, dropped {}, color skipped {})",
            self.rate(),
            self.completed,
            self.dropped(),
            self.color_skipped
        );
        self.window_ticks = 0;
        self.window_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;
    use crate::pipeline::TickReport;

    fn completed(color: ColorWrite) -> TickOutcome {
        TickOutcome::Completed(TickReport { pixels_sampled: 4, color })
    }

    #[test]
    fn counts_by_reason() {
        let mut s = TickStats::new(Duration::from_secs(3600));
        s.record(&completed(ColorWrite::Written));
        s.record(&completed(ColorWrite::Skipped { frame: (2, 2), surface: (4, 4) }));
        s.record(&TickOutcome::Dropped(TickError::FrameUnavailable(FrameKind::Depth)));
        s.record(&TickOutcome::Dropped(TickError::FrameUnavailable(FrameKind::Color)));
        s.record(&TickOutcome::Dropped(TickError::Mapping(MapError::MapSize { expected: 4, got: 2 })));
        s.record(&TickOutcome::Dropped(TickError::Panicked("boom".into())));

        assert_eq!(s.completed, 2);
        assert_eq!(s.color_skipped, 1);
        assert_eq!(s.depth_unavailable, 1);
        assert_eq!(s.color_unavailable, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.panicked, 1);
        assert_eq!(s.dropped(), 4);
    }

    #[test]
    fn report_resets_window_but_not_totals() {
        let mut s = TickStats::new(Duration::ZERO);
        s.record(&completed(ColorWrite::Written));
        assert_eq!(s.window_ticks, 0);
        assert_eq!(s.completed, 1);
    }
}
