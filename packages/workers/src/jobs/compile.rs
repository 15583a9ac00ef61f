//! `compile` (spec §4.4.4): compile a site's OCR output into its per-site
//! database artifact, then fan out to whichever stage follows.

use job_queue::NewJob;
use pipeline_core::{classify, job_shapes, queue_for, StageInitializer};
use pipeline_types::{ErrorClass, RunId, Stage, Subdomain};
use serde_json::json;
use tracing::warn;

use crate::deps::WorkerDeps;
use crate::error::{Result, WorkerError};

pub async fn run(subdomain: &Subdomain, run_id: &RunId, deps: &WorkerDeps) -> Result<()> {
    deps.site_store.initialize_stage(subdomain, Stage::Compilation, 1).await?;

    match deps.compiler.compile(subdomain).await {
        Ok(_report) => {
            deps.site_store.increment_completed(subdomain, Stage::Compilation).await?;

            let initializer = StageInitializer::new(deps.site_store.as_ref(), deps.job_queue.as_ref());
            let args = json!({
                "subdomain": subdomain.as_str(),
                "run_id": run_id.as_str(),
            });

            if deps.config.extraction_enabled {
                let job = NewJob::new(queue_for(Stage::Extraction), job_shapes::EXTRACTION).with_args(args);
                initializer.initialize_single_job(subdomain, Stage::Extraction, job).await?;
            } else {
                let job = NewJob::new(queue_for(Stage::Deploy), job_shapes::DEPLOY).with_args(args);
                initializer.initialize_single_job(subdomain, Stage::Deploy, job).await?;
            }

            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            let (class, fingerprint) = classify(&message);
            warn!(%subdomain, %run_id, ?class, ?fingerprint, "compile failed");

            match class {
                ErrorClass::Permanent => {
                    deps.site_store.increment_failed(subdomain, Stage::Compilation, class, &message).await?;
                    Ok(())
                }
                ErrorClass::Transient | ErrorClass::Critical => Err(WorkerError::Compiler(message)),
            }
        }
    }
}
