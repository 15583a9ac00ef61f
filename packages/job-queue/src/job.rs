use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{JobQueueError, Result};

/// Which named queue a job is routed through (spec §4.2). `High` carries
/// operator-triggered work (manual retries, reconciler recoveries) ahead of
/// the stage queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Queue {
    High,
    Fetch,
    Ocr,
    Compilation,
    Extraction,
    Deploy,
}

impl Queue {
    pub const ALL: [Queue; 6] = [
        Queue::High,
        Queue::Fetch,
        Queue::Ocr,
        Queue::Compilation,
        Queue::Extraction,
        Queue::Deploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::High => "high",
            Queue::Fetch => "fetch",
            Queue::Ocr => "ocr",
            Queue::Compilation => "compilation",
            Queue::Extraction => "extraction",
            Queue::Deploy => "deploy",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(Queue::High),
            "fetch" => Ok(Queue::Fetch),
            "ocr" => Ok(Queue::Ocr),
            "compilation" => Ok(Queue::Compilation),
            "extraction" => Ok(Queue::Extraction),
            "deploy" => Ok(Queue::Deploy),
            other => Err(JobQueueError::Types(pipeline_types::PipelineTypeError::Parse(format!(
                "invalid queue: {other}"
            )))),
        }
    }

    /// The queue a given pipeline stage's jobs are routed to — every stage
    /// has a same-named queue except the coordinator jobs, which ride the
    /// queue of the stage they are coordinating (spec §4.2).
    pub fn for_stage(stage: pipeline_types::Stage) -> Self {
        match stage {
            pipeline_types::Stage::Fetch => Queue::Fetch,
            pipeline_types::Stage::Ocr => Queue::Ocr,
            pipeline_types::Stage::Compilation => Queue::Compilation,
            pipeline_types::Stage::Extraction => Queue::Extraction,
            pipeline_types::Stage::Deploy => Queue::Deploy,
        }
    }
}

impl std::fmt::Display for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a single job (spec §3 "Job").
///
/// `Deferred` jobs carry at least one not-yet-finished entry in
/// `dependency_ids`; `mark_finished` is what promotes a dependent from
/// `Deferred` to `Queued` once its last outstanding dependency clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Deferred,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Deferred => "deferred",
            JobState::Started => "started",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobState::Queued),
            "deferred" => Ok(JobState::Deferred),
            "started" => Ok(JobState::Started),
            "finished" => Ok(JobState::Finished),
            "failed" => Ok(JobState::Failed),
            other => Err(JobQueueError::Types(pipeline_types::PipelineTypeError::Parse(format!(
                "invalid job state: {other}"
            )))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable unit of work, RQ-style: a function name plus JSON args rather
/// than a typed closure, so it survives a process restart (spec §3 "Job").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub queue: Queue,
    pub func_name: String,
    pub args: serde_json::Value,
    pub kwargs: serde_json::Value,
    pub dependency_ids: Vec<Uuid>,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub description: String,
    #[serde(with = "duration_secs")]
    pub result_ttl: Duration,
    pub state: JobState,
    pub exc_info: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What a caller supplies to enqueue a new job (spec §3 "Job", §4.2
/// `enqueue`). A non-empty `depends_on` starts the job `Deferred`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub queue: Queue,
    pub func_name: String,
    pub args: serde_json::Value,
    pub kwargs: serde_json::Value,
    pub depends_on: Vec<Uuid>,
    pub timeout: Duration,
    pub description: String,
    pub result_ttl: Duration,
}

impl NewJob {
    pub fn new(queue: Queue, func_name: impl Into<String>) -> Self {
        Self {
            queue,
            func_name: func_name.into(),
            args: serde_json::Value::Null,
            kwargs: serde_json::Value::Null,
            depends_on: Vec::new(),
            timeout: Duration::from_secs(180),
            description: String::new(),
            result_ttl: Duration::from_secs(500),
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn depends_on(mut self, ids: Vec<Uuid>) -> Self {
        self.depends_on = ids;
        self
    }

    pub fn initial_state(&self) -> JobState {
        if self.depends_on.is_empty() {
            JobState::Queued
        } else {
            JobState::Deferred
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_round_trips_through_str() {
        for queue in Queue::ALL {
            assert_eq!(Queue::from_str(queue.as_str()).unwrap(), queue);
        }
    }

    #[test]
    fn job_state_round_trips_through_str() {
        for state in [
            JobState::Queued,
            JobState::Deferred,
            JobState::Started,
            JobState::Finished,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_str(state.as_str()).unwrap(), state);
        }
    }

    #[test]
    fn new_job_starts_deferred_only_with_dependencies() {
        let no_deps = NewJob::new(Queue::Ocr, "ocr_page");
        assert_eq!(no_deps.initial_state(), JobState::Queued);

        let with_deps = NewJob::new(Queue::Ocr, "ocr_coordinator").depends_on(vec![Uuid::new_v4()]);
        assert_eq!(with_deps.initial_state(), JobState::Deferred);
    }

    #[test]
    fn terminal_states_are_finished_and_failed_only() {
        assert!(JobState::Finished.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Deferred.is_terminal());
        assert!(!JobState::Started.is_terminal());
    }
}
