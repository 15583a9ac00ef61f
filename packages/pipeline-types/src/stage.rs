use std::fmt;

use crate::error::{PipelineTypeError, Result};

/// One of the five stages of the document pipeline, each tracked with its
/// own fan-out/fan-in counters on a [`crate::Site`].
///
/// `Extraction` is feature-flagged (see spec §4.3 / §9): when disabled the
/// stage graph skips straight from `Compilation` to `Deploy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Fetch,
    Ocr,
    Compilation,
    Extraction,
    Deploy,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::Ocr,
        Stage::Compilation,
        Stage::Extraction,
        Stage::Deploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Ocr => "ocr",
            Stage::Compilation => "compilation",
            Stage::Extraction => "extraction",
            Stage::Deploy => "deploy",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "fetch" => Ok(Stage::Fetch),
            "ocr" => Ok(Stage::Ocr),
            "compilation" => Ok(Stage::Compilation),
            "extraction" => Ok(Stage::Extraction),
            "deploy" => Ok(Stage::Deploy),
            other => Err(PipelineTypeError::Parse(format!("invalid stage: {other}"))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a site currently sits in the pipeline (spec §3 `current_stage`).
///
/// `NotStarted` corresponds to `current_stage = null` in spec.md; `Running`
/// carries which of the five stages is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PipelineStage {
    NotStarted,
    Running(Stage),
    Completed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed)
    }

    pub fn current_stage(&self) -> Option<Stage> {
        match self {
            PipelineStage::Running(s) => Some(*s),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::NotStarted => write!(f, "null"),
            PipelineStage::Running(s) => write!(f, "{s}"),
            PipelineStage::Completed => write!(f, "completed"),
        }
    }
}

/// Per-stage fan-out/fan-in counters (spec §3 invariant 1:
/// `0 <= completed + failed <= total`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct StageCounters {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StageCounters {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
        }
    }

    /// `completed + total == total`, i.e. all fanned-out work has terminated.
    /// True for an un-initialized (`total == 0`) stage is deliberately
    /// `false` — there is nothing to trigger a coordinator for yet.
    pub fn is_saturated(&self) -> bool {
        self.total > 0 && self.completed + self.failed == self.total
    }

    pub fn with_completed_incremented(self) -> Result<Self> {
        let completed = self.completed + 1;
        self.checked(completed, self.failed)
    }

    pub fn with_failed_incremented(self) -> Result<Self> {
        let failed = self.failed + 1;
        self.checked(self.completed, failed)
    }

    fn checked(mut self, completed: u64, failed: u64) -> Result<Self> {
        if completed + failed > self.total {
            return Err(PipelineTypeError::CounterOverflow {
                total: self.total,
                completed,
                failed,
            });
        }
        self.completed = completed;
        self.failed = failed;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_round_trips_through_str() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_str(stage.as_str()).unwrap(), stage);
        }
    }

    #[test]
    fn unknown_stage_str_is_an_error() {
        assert!(Stage::from_str("bogus").is_err());
    }

    #[test]
    fn saturation_requires_nonzero_total() {
        let empty = StageCounters::default();
        assert!(!empty.is_saturated());

        let done = StageCounters {
            total: 3,
            completed: 2,
            failed: 1,
        };
        assert!(done.is_saturated());
    }

    #[test]
    fn increment_rejects_overflow_past_total() {
        let counters = StageCounters::new(1).with_completed_incremented().unwrap();
        assert!(counters.with_completed_incremented().is_err());
        assert!(counters.with_failed_incremented().is_err());
    }

    #[test]
    fn pipeline_stage_terminal_only_when_completed() {
        assert!(!PipelineStage::NotStarted.is_terminal());
        assert!(!PipelineStage::Running(Stage::Ocr).is_terminal());
        assert!(PipelineStage::Completed.is_terminal());
    }
}
