//! `extraction`: supplemented stage (not in spec.md, within Non-goals) that
//! gives the optional extraction phase the same shape as [`crate::jobs::compile`] —
//! one job, N=1, advancing straight to `deploy` — so the stage machine stays
//! uniform whether or not `extraction_enabled` is set. Only ever enqueued
//! when it is.

use job_queue::NewJob;
use pipeline_core::{classify, job_shapes, queue_for, StageInitializer};
use pipeline_types::{ErrorClass, RunId, Stage, Subdomain};
use serde_json::json;
use tracing::warn;

use crate::deps::WorkerDeps;
use crate::error::{Result, WorkerError};

pub async fn run(subdomain: &Subdomain, run_id: &RunId, deps: &WorkerDeps) -> Result<()> {
    deps.site_store.initialize_stage(subdomain, Stage::Extraction, 1).await?;

    match deps.extractor.extract(subdomain).await {
        Ok(_report) => {
            deps.site_store.increment_completed(subdomain, Stage::Extraction).await?;

            let initializer = StageInitializer::new(deps.site_store.as_ref(), deps.job_queue.as_ref());
            let job = NewJob::new(queue_for(Stage::Deploy), job_shapes::DEPLOY).with_args(json!({
                "subdomain": subdomain.as_str(),
                "run_id": run_id.as_str(),
            }));
            initializer.initialize_single_job(subdomain, Stage::Deploy, job).await?;

            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            let (class, fingerprint) = classify(&message);
            warn!(%subdomain, %run_id, ?class, ?fingerprint, "extraction failed");

            match class {
                ErrorClass::Permanent => {
                    deps.site_store.increment_failed(subdomain, Stage::Extraction, class, &message).await?;
                    Ok(())
                }
                ErrorClass::Transient | ErrorClass::Critical => Err(WorkerError::Extractor(message)),
            }
        }
    }
}
