//! `deploy` (spec §4.4.5): publish the compiled artifact and complete the run.

use pipeline_core::classify;
use pipeline_types::{ErrorClass, RunId, Stage, Subdomain};
use tracing::warn;

use crate::deps::WorkerDeps;
use crate::error::{Result, WorkerError};

pub async fn run(subdomain: &Subdomain, run_id: &RunId, deps: &WorkerDeps) -> Result<()> {
    deps.site_store.initialize_stage(subdomain, Stage::Deploy, 1).await?;

    match deps.deployer.deploy(subdomain).await {
        Ok(()) => {
            deps.site_store.increment_completed(subdomain, Stage::Deploy).await?;
            deps.site_store.mark_completed(subdomain).await?;
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            let (class, fingerprint) = classify(&message);
            warn!(%subdomain, %run_id, ?class, ?fingerprint, "deploy failed");

            match class {
                ErrorClass::Permanent => {
                    deps.site_store.increment_failed(subdomain, Stage::Deploy, class, &message).await?;
                    Ok(())
                }
                ErrorClass::Transient | ErrorClass::Critical => Err(WorkerError::Deploy(message)),
            }
        }
    }
}
