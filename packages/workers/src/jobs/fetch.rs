//! `fetch` (spec §4.4.1): download a site's source documents and fan out
//! OCR.

use job_queue::NewJob;
use pipeline_core::{classify, job_shapes, queue_for, StageInitializer};
use pipeline_types::{RunId, Stage, Subdomain};
use serde_json::json;
use tracing::{info, warn};

use crate::adapters::FetchOptions;
use crate::deps::WorkerDeps;
use crate::error::Result;

pub async fn run(subdomain: &Subdomain, run_id: &RunId, opts: FetchOptions, deps: &WorkerDeps) -> Result<()> {
    let site = deps.site_store.get(subdomain).await?;

    deps.site_store.initialize_stage(subdomain, Stage::Fetch, 1).await?;

    let documents = match deps.scraper.fetch(&site, opts).await {
        Ok(documents) => documents,
        Err(err) => {
            let (class, fingerprint) = classify(&err.to_string());
            warn!(%subdomain, %run_id, error = %err, ?fingerprint, "fetch failed");
            deps.site_store.increment_failed(subdomain, Stage::Fetch, class, &err.to_string()).await?;
            return Ok(());
        }
    };

    deps.site_store.increment_completed(subdomain, Stage::Fetch).await?;

    let count = documents.count();
    info!(%subdomain, %run_id, document_count = count, "fetch produced documents, fanning out ocr");

    let initializer = StageInitializer::new(deps.site_store.as_ref(), deps.job_queue.as_ref());

    let child_jobs: Vec<NewJob> = documents
        .documents
        .iter()
        .map(|document| {
            NewJob::new(queue_for(Stage::Ocr), job_shapes::OCR_PAGE).with_args(json!({
                "subdomain": subdomain.as_str(),
                "run_id": run_id.as_str(),
                "document_path": document.path,
            }))
        })
        .collect();

    let coordinator = NewJob::new(queue_for(Stage::Compilation), job_shapes::OCR_COORDINATOR).with_args(json!({
        "subdomain": subdomain.as_str(),
        "run_id": run_id.as_str(),
    }));

    initializer.initialize_and_fanout(subdomain, Stage::Ocr, child_jobs, coordinator).await?;

    Ok(())
}
