//! `ocr-page` (spec §4.4.2): OCR a single document produced by `fetch`.

use pipeline_core::classify;
use pipeline_types::{ErrorClass, RunId, Stage, Subdomain};
use tracing::warn;

use crate::deps::WorkerDeps;
use crate::error::{Result, WorkerError};

pub async fn run(
    subdomain: &Subdomain,
    document_path: &str,
    backend: &str,
    run_id: &RunId,
    deps: &WorkerDeps,
) -> Result<()> {
    match deps.ocr_backends.recognize(backend, document_path).await {
        Ok(_text) => {
            deps.site_store.increment_completed(subdomain, Stage::Ocr).await?;
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            let (class, fingerprint) = classify(&message);
            warn!(%subdomain, %run_id, document_path, ?class, ?fingerprint, "ocr-page failed");

            match class {
                ErrorClass::Permanent => {
                    deps.site_store.increment_failed(subdomain, Stage::Ocr, class, &message).await?;
                    Ok(())
                }
                ErrorClass::Transient | ErrorClass::Critical => Err(WorkerError::Ocr(message)),
            }
        }
    }
}
