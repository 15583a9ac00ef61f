//! The `JobQueue` port (spec §4.2).
//!
//! Mirrors `SiteStore` in shape — one trait, two adapters — but tracks
//! dependency-gated fan-out rather than per-site counters. A worker only
//! ever sees `dequeue`/`mark_finished`/`mark_failed`; the enqueue side
//! (coordinators, `pipeline-cli enqueue`) is the only caller of `enqueue`.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::job::{JobRecord, NewJob, Queue};

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a new job, `Queued` if `depends_on` is empty, `Deferred`
    /// otherwise.
    async fn enqueue(&self, spec: NewJob) -> Result<Uuid>;

    /// Claim and start the oldest `Queued` job across the given queues,
    /// highest-priority queue first. `None` if nothing is claimable.
    async fn dequeue(&self, queues: &[Queue]) -> Result<Option<JobRecord>>;

    /// Transition `id` to `Finished`; promote any `Deferred` dependent whose
    /// last outstanding dependency was `id` to `Queued`.
    async fn mark_finished(&self, id: Uuid) -> Result<()>;

    /// Transition `id` to `Failed` and record `exc_info`. Dependents stay
    /// `Deferred` — only the reconciler rescues them (spec §4.2).
    async fn mark_failed(&self, id: Uuid, exc_info: String) -> Result<()>;

    /// Look up a single job by id, for dependency-resolution checks.
    async fn get(&self, id: Uuid) -> Result<JobRecord>;

    /// Every job currently in the `Failed` registry, for `status`.
    async fn failed_jobs(&self) -> Result<Vec<JobRecord>>;

    /// Every job not yet in a terminal state (`Queued`, `Deferred`, or
    /// `Started`). The reconciler filters this client-side by `func_name`
    /// and the `subdomain` carried in `args`/`kwargs` to check "no identical
    /// job is currently started" before re-enqueueing a stuck stage (spec
    /// §4.5 "Recovery per stage").
    async fn active_jobs(&self) -> Result<Vec<JobRecord>>;

    /// `(queued_count, deferred_count)` per queue, for `status`.
    async fn queue_depths(&self) -> Result<HashMap<Queue, (usize, usize)>>;
}
