//! Stage initialization (spec §4.3 "Stage initialization").
//!
//! Every worker that discovers a stage's fan-out size — `fetch` counting
//! documents, `ocr-coordinator` computing `N=1` for compilation, and so on
//! — drives the same four steps. Centralizing them here is what makes
//! spec §8 property 3 ("coordinator idempotence") hold without each worker
//! having to reason about it independently.

use job_queue::{JobQueue, NewJob, Queue};
use pipeline_types::{Stage, Subdomain};
use site_store::SiteStore;

use crate::error::Result;

pub struct StageInitializer<'a> {
    pub site_store: &'a (dyn SiteStore),
    pub job_queue: &'a (dyn JobQueue),
}

impl<'a> StageInitializer<'a> {
    pub fn new(site_store: &'a dyn SiteStore, job_queue: &'a dyn JobQueue) -> Self {
        Self { site_store, job_queue }
    }

    /// Steps 1-4 of spec §4.3 "Stage initialization": set the stage's
    /// counters to `N = child_jobs.len()`, enqueue every child, then enqueue
    /// exactly one coordinator job depending on all of them.
    pub async fn initialize_and_fanout(
        &self,
        subdomain: &Subdomain,
        stage: Stage,
        child_jobs: Vec<NewJob>,
        coordinator_job: NewJob,
    ) -> Result<uuid::Uuid> {
        self.site_store.initialize_stage(subdomain, stage, child_jobs.len() as u64).await?;

        let mut child_ids = Vec::with_capacity(child_jobs.len());
        for job in child_jobs {
            child_ids.push(self.job_queue.enqueue(job).await?);
        }

        let coordinator = coordinator_job.depends_on(child_ids);
        Ok(self.job_queue.enqueue(coordinator).await?)
    }

    /// Convenience wrapper for single-job stages (compilation, extraction,
    /// deploy) where the "fan-out" is always `N=1` and there is no separate
    /// coordinator — the job itself advances the stage on completion.
    pub async fn initialize_single_job(
        &self,
        subdomain: &Subdomain,
        stage: Stage,
        job: NewJob,
    ) -> Result<uuid::Uuid> {
        self.site_store.initialize_stage(subdomain, stage, 1).await?;
        Ok(self.job_queue.enqueue(job).await?)
    }
}

/// `(queue, func_name)` pairs for the worker job shapes (spec §4.4),
/// centralized so `pipeline-core`, `workers`, and `reconciler` agree on
/// names without importing each other.
pub mod job_shapes {
    pub const FETCH: &str = "fetch";
    pub const OCR_PAGE: &str = "ocr_page";
    pub const OCR_COORDINATOR: &str = "ocr_coordinator";
    pub const COMPILE: &str = "compile";
    pub const EXTRACTION: &str = "extraction";
    pub const DEPLOY: &str = "deploy";
}

pub fn queue_for(stage: Stage) -> Queue {
    Queue::for_stage(stage)
}
