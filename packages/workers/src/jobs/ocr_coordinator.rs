//! `ocr-coordinator` (spec §4.4.3): runs once every `ocr-page` dependency has
//! finished, advancing the site to `compilation`.

use job_queue::NewJob;
use pipeline_core::{job_shapes, queue_for, CoordinatorProtocol, StageInitializer};
use pipeline_types::{RunId, Stage, Subdomain};
use serde_json::json;

use crate::deps::WorkerDeps;
use crate::error::Result;

pub async fn run(subdomain: &Subdomain, run_id: &RunId, deps: &WorkerDeps) -> Result<()> {
    let initializer = StageInitializer::new(deps.site_store.as_ref(), deps.job_queue.as_ref());
    let compile_job = NewJob::new(queue_for(Stage::Compilation), job_shapes::COMPILE).with_args(json!({
        "subdomain": subdomain.as_str(),
        "run_id": run_id.as_str(),
    }));

    if run_id.is_recovered() {
        // The reconciler already won `claim_coordinator_enqueue` before
        // enqueueing this job (spec §4.5) — it is only the vehicle for the
        // fan-out, not a second claim attempt.
        initializer.initialize_single_job(subdomain, Stage::Compilation, compile_job).await?;
        return Ok(());
    }

    let protocol = CoordinatorProtocol::new(deps.site_store.as_ref());
    protocol
        .run(subdomain, Stage::Ocr, |_site| async {
            initializer.initialize_single_job(subdomain, Stage::Compilation, compile_job).await?;
            Ok(())
        })
        .await?;

    Ok(())
}
