//! The periodic stuck-site sweep (spec §4.5, Component E).
//!
//! Grounded in the teacher's `orchestrator.rs::run_dag` sweep-and-dispatch
//! loop shape, retargeted from "resume one job's DAG" to "find every site
//! that stopped advancing and restart it safely." The reconciler is, along
//! with the coordinator job itself, one of exactly two callers allowed to
//! invoke `claim_coordinator_enqueue` (spec §4.3 "Correctness sketch") — no
//! other write path in this crate touches a site's counters except to raise
//! `ocr_completed`, and never backward (spec §4.5 "Safety").

pub mod config;
pub mod error;
pub mod filesystem;
pub mod report;

use std::sync::Arc;

use chrono::Utc;
use job_queue::{JobQueue, JobState, NewJob, Queue};
use pipeline_core::job_shapes;
use pipeline_types::{RunId, Site, Stage, Subdomain};
use site_store::SiteStore;
use tracing::{info, warn};

pub use config::ReconcilerConfig;
pub use error::{ReconcilerError, Result};
pub use filesystem::{FsSiteFilesystem, InMemorySiteFilesystem, SiteFilesystem};
pub use report::{RecoveryOutcome, SweepReport};

pub struct Reconciler {
    pub site_store: Arc<dyn SiteStore>,
    pub job_queue: Arc<dyn JobQueue>,
    pub filesystem: Arc<dyn SiteFilesystem>,
    pub config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        site_store: Arc<dyn SiteStore>,
        job_queue: Arc<dyn JobQueue>,
        filesystem: Arc<dyn SiteFilesystem>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { site_store, job_queue, filesystem, config }
    }

    /// One pass over every stale site (spec §4.5 "Detection"). `dry_run`
    /// reports what *would* happen without mutating any state — backs
    /// `pipeline-cli reconcile --dry-run`.
    pub async fn sweep(&self, dry_run: bool) -> Result<SweepReport> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stale_threshold).expect("stale_threshold fits in chrono::Duration");
        let stale = self.site_store.stale_sites(cutoff).await?;

        let mut report = SweepReport::default();
        for site in stale {
            let Some(stage) = site.pipeline_stage.current_stage() else {
                continue;
            };

            let outcome = match stage {
                Stage::Ocr => self.recover_ocr_stuck(&site, dry_run).await?,
                Stage::Fetch => self.recover_fetch_stuck(&site, dry_run).await?,
                Stage::Compilation | Stage::Extraction | Stage::Deploy => {
                    self.recover_single_job_stage(&site, stage, dry_run).await?
                }
            };

            match outcome {
                RecoveryOutcome::Recovered => report.recovered.push(site.subdomain),
                RecoveryOutcome::Stalled => report.stalled.push(site.subdomain),
                RecoveryOutcome::Requeued => report.requeued.push(site.subdomain),
                RecoveryOutcome::NoOp => {}
            }
        }

        Ok(report)
    }

    /// The common case (spec §4.5): infer real OCR progress from the
    /// filesystem, raise `ocr_completed` if the observed count is higher,
    /// then try to claim the coordinator transition directly.
    async fn recover_ocr_stuck(&self, site: &Site, dry_run: bool) -> Result<RecoveryOutcome> {
        let observed = self.filesystem.count_ocr_complete_documents(&site.subdomain).await?;
        let bounded = observed.min(site.ocr.total);

        if bounded == 0 {
            warn!(subdomain = %site.subdomain, "ocr stuck with no observed filesystem progress, reporting stalled");
            return Ok(RecoveryOutcome::Stalled);
        }

        if dry_run {
            info!(subdomain = %site.subdomain, observed = bounded, "dry run: would raise ocr_completed and attempt coordinator claim");
            return Ok(RecoveryOutcome::Recovered);
        }

        if bounded > site.ocr.completed {
            self.site_store.raise_completed(&site.subdomain, Stage::Ocr, bounded).await?;
        }

        if !self.site_store.claim_coordinator_enqueue(&site.subdomain).await? {
            return Ok(RecoveryOutcome::NoOp);
        }

        let run_id = RunId::new(&site.subdomain, Utc::now()).recovered();
        self.job_queue
            .enqueue(NewJob::new(Queue::Compilation, job_shapes::OCR_COORDINATOR).with_args(serde_json::json!({
                "subdomain": site.subdomain.as_str(),
                "run_id": run_id.as_str(),
            })))
            .await?;

        info!(subdomain = %site.subdomain, %run_id, "reconciler recovered stuck ocr stage");
        Ok(RecoveryOutcome::Recovered)
    }

    /// Compilation/extraction/deploy are all 1-of-1 stages (spec §4.5): if
    /// the job never finished, re-enqueue it, guarded against a job that is
    /// merely slow (`Started`, not actually dead) and against a racing
    /// reconciler sweep via the same CAS the normal coordinator path uses.
    async fn recover_single_job_stage(&self, site: &Site, stage: Stage, dry_run: bool) -> Result<RecoveryOutcome> {
        let func_name = match stage {
            Stage::Compilation => job_shapes::COMPILE,
            Stage::Extraction => job_shapes::EXTRACTION,
            Stage::Deploy => job_shapes::DEPLOY,
            Stage::Fetch | Stage::Ocr => unreachable!("dispatched only for single-job stages"),
        };

        if self.has_started_job(&site.subdomain, func_name).await? {
            return Ok(RecoveryOutcome::NoOp);
        }

        if dry_run {
            info!(subdomain = %site.subdomain, %stage, "dry run: would re-enqueue stuck single-job stage");
            return Ok(RecoveryOutcome::Requeued);
        }

        if !self.site_store.claim_coordinator_enqueue(&site.subdomain).await? {
            return Ok(RecoveryOutcome::NoOp);
        }

        let run_id = RunId::new(&site.subdomain, Utc::now()).recovered();
        self.job_queue
            .enqueue(NewJob::new(Queue::for_stage(stage), func_name).with_args(serde_json::json!({
                "subdomain": site.subdomain.as_str(),
                "run_id": run_id.as_str(),
            })))
            .await?;

        info!(subdomain = %site.subdomain, %stage, %run_id, "reconciler re-enqueued stuck single-job stage");
        Ok(RecoveryOutcome::Requeued)
    }

    /// Fetch stuck (spec §4.5): simply re-enqueue with a fresh run id, once
    /// no fetch job for this subdomain is already running.
    async fn recover_fetch_stuck(&self, site: &Site, dry_run: bool) -> Result<RecoveryOutcome> {
        if self.has_started_job(&site.subdomain, job_shapes::FETCH).await? {
            return Ok(RecoveryOutcome::NoOp);
        }

        if dry_run {
            info!(subdomain = %site.subdomain, "dry run: would re-enqueue stuck fetch");
            return Ok(RecoveryOutcome::Requeued);
        }

        let run_id = RunId::new(&site.subdomain, Utc::now()).recovered();
        self.job_queue
            .enqueue(NewJob::new(Queue::Fetch, job_shapes::FETCH).with_args(serde_json::json!({
                "subdomain": site.subdomain.as_str(),
                "run_id": run_id.as_str(),
            })))
            .await?;

        info!(subdomain = %site.subdomain, %run_id, "reconciler re-enqueued stuck fetch");
        Ok(RecoveryOutcome::Requeued)
    }

    async fn has_started_job(&self, subdomain: &Subdomain, func_name: &str) -> Result<bool> {
        let active = self.job_queue.active_jobs().await?;
        Ok(active.iter().any(|job| {
            job.func_name == func_name
                && job.state == JobState::Started
                && job.args.get("subdomain").and_then(|v| v.as_str()) == Some(subdomain.as_str())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_queue::InMemoryJobQueue;
    use pipeline_types::SiteFields;
    use serde_json::json;
    use site_store::InMemorySiteStore;

    fn fields(subdomain: &str) -> SiteFields {
        SiteFields {
            subdomain: Subdomain::new(subdomain),
            name: "Example".to_string(),
            state: None,
            country: "us".to_string(),
            kind: "county".to_string(),
            scraper: "example".to_string(),
            start_year: None,
            extra: json!({}),
            location: None,
        }
    }

    async fn make_stuck_ocr_site(site_store: &InMemorySiteStore, subdomain: &Subdomain, total: u64, completed: u64) {
        site_store.upsert(fields(subdomain.as_str())).await.unwrap();
        site_store.initialize_stage(subdomain, Stage::Ocr, total).await.unwrap();
        for _ in 0..completed {
            site_store.increment_completed(subdomain, Stage::Ocr).await.unwrap();
        }
    }

    /// Every test site is created moments before `sweep` runs, so a
    /// realistic 2-hour threshold would never see it as stale. A zero
    /// threshold still exercises `updated_at < cutoff` faithfully — any
    /// nonzero wall-clock gap between site creation and `Utc::now()` inside
    /// `sweep` satisfies it.
    fn reconciler(site_store: Arc<dyn SiteStore>, job_queue: Arc<dyn JobQueue>, filesystem: Arc<dyn SiteFilesystem>) -> Reconciler {
        let config = ReconcilerConfig::default().with_stale_threshold(std::time::Duration::ZERO);
        Reconciler::new(site_store, job_queue, filesystem, config)
    }

    #[tokio::test]
    async fn ocr_stuck_with_filesystem_progress_raises_completed_and_claims() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        make_stuck_ocr_site(&site_store, &subdomain, 4, 2).await;
        filesystem.set(&subdomain, 4);

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(false).await.unwrap();

        assert_eq!(report.recovered, vec![subdomain.clone()]);
        let site = site_store.get(&subdomain).await.unwrap();
        assert_eq!(site.ocr.completed, 4);
        assert!(site.coordinator_enqueued);

        let depths = job_queue.queue_depths().await.unwrap();
        assert_eq!(depths.get(&Queue::Compilation), Some(&(1, 0)));
    }

    #[tokio::test]
    async fn ocr_stuck_with_zero_progress_reports_stalled_without_mutating() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        make_stuck_ocr_site(&site_store, &subdomain, 4, 0).await;

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(false).await.unwrap();

        assert_eq!(report.stalled, vec![subdomain.clone()]);
        assert!(report.recovered.is_empty());
        let site = site_store.get(&subdomain).await.unwrap();
        assert_eq!(site.ocr.completed, 0);
        assert!(!site.coordinator_enqueued);
    }

    #[tokio::test]
    async fn dry_run_never_mutates_site_or_queue() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        make_stuck_ocr_site(&site_store, &subdomain, 4, 2).await;
        filesystem.set(&subdomain, 4);

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(true).await.unwrap();

        assert_eq!(report.recovered, vec![subdomain.clone()]);
        let site = site_store.get(&subdomain).await.unwrap();
        assert_eq!(site.ocr.completed, 2, "dry run must not raise counters");
        assert!(!site.coordinator_enqueued, "dry run must not claim the coordinator");
        assert!(job_queue.queue_depths().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stuck_deploy_is_reenqueued_once_guarded_by_claim() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        site_store.upsert(fields("ex.test")).await.unwrap();
        site_store.initialize_stage(&subdomain, Stage::Deploy, 1).await.unwrap();

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(false).await.unwrap();

        assert_eq!(report.requeued, vec![subdomain.clone()]);
        let depths = job_queue.queue_depths().await.unwrap();
        assert_eq!(depths.get(&Queue::Deploy), Some(&(1, 0)));
    }

    #[tokio::test]
    async fn stuck_stage_with_a_started_job_is_left_alone() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        site_store.upsert(fields("ex.test")).await.unwrap();
        site_store.initialize_stage(&subdomain, Stage::Deploy, 1).await.unwrap();

        job_queue
            .enqueue(NewJob::new(Queue::Deploy, job_shapes::DEPLOY).with_args(json!({"subdomain": "ex.test", "run_id": "ex.test_1"})))
            .await
            .unwrap();
        job_queue.dequeue(&Queue::ALL).await.unwrap();

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(false).await.unwrap();

        assert!(report.requeued.is_empty());
        assert!(report.recovered.is_empty());
        let depths = job_queue.queue_depths().await.unwrap();
        assert_eq!(depths.get(&Queue::Deploy), None);
    }

    #[tokio::test]
    async fn stuck_fetch_is_reenqueued_with_fresh_recovered_run_id() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        site_store.upsert(fields("ex.test")).await.unwrap();
        site_store.initialize_stage(&subdomain, Stage::Fetch, 1).await.unwrap();

        let report = reconciler(site_store.clone(), job_queue.clone(), filesystem).sweep(false).await.unwrap();

        assert_eq!(report.requeued, vec![subdomain.clone()]);
        let job = job_queue.dequeue(&Queue::ALL).await.unwrap().unwrap();
        assert_eq!(job.func_name, job_shapes::FETCH);
        assert!(job.args.get("run_id").and_then(|v| v.as_str()).unwrap().ends_with("_recovered"));
    }

    #[tokio::test]
    async fn sweep_never_touches_sites_that_are_not_stale() {
        let site_store: Arc<dyn SiteStore> = Arc::new(InMemorySiteStore::new());
        let job_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let filesystem = Arc::new(InMemorySiteFilesystem::new());
        let subdomain = Subdomain::new("ex.test");
        site_store.upsert(fields("ex.test")).await.unwrap();
        site_store.initialize_stage(&subdomain, Stage::Ocr, 4).await.unwrap();

        let default_threshold = Reconciler::new(site_store.clone(), job_queue.clone(), filesystem, ReconcilerConfig::default());
        let report = default_threshold.sweep(false).await.unwrap();
        assert!(report.is_empty(), "a site updated moments ago is not yet past the 2h default threshold");
    }
}
