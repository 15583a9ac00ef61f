use std::time::Duration;

/// Sweep cadence and staleness threshold (spec §4.5 "design target every 15
/// minutes" / "design default 2 hours"), mirroring the teacher's
/// `StageConfig` tunable-struct shape.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    pub interval: Duration,
    pub stale_threshold: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            stale_threshold: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }
}
