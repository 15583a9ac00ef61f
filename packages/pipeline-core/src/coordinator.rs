//! The coordinator algorithm (spec §4.3 "Coordinator job"), the single path
//! allowed to call `claim_coordinator_enqueue`.
//!
//! Mirrors the teacher's `run_dag` phase-advance loop in shape — claim,
//! then move to the next unit of work — but the claim here is a row-level
//! CAS in `site-store` rather than an in-process job-state transition,
//! because the callers (the coordinator job, and the reconciler) run in
//! different processes.

use pipeline_types::{Site, Stage, Subdomain};
use site_store::SiteStore;
use tracing::info;

use crate::error::Result;

/// Outcome of one `CoordinatorProtocol::run` call. `LostClaim` is not an
/// error — spec §4.3 step 2 requires a silent, logged no-op when another
/// process (the reconciler, or a racing duplicate) already won the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorOutcome {
    Won,
    LostClaim,
}

pub struct CoordinatorProtocol<'a> {
    pub site_store: &'a (dyn SiteStore),
}

impl<'a> CoordinatorProtocol<'a> {
    pub fn new(site_store: &'a dyn SiteStore) -> Self {
        Self { site_store }
    }

    /// Runs the claim-then-advance sequence for the stage transition that
    /// just finished at `stage`. `next_stage_fanout` builds whatever
    /// `initialize_and_fanout`/`initialize_single_job` call is appropriate
    /// for the next stage, given the now-current [`Site`] — it only runs if
    /// the claim is won.
    pub async fn run<F, Fut>(&self, subdomain: &Subdomain, stage: Stage, next_stage_fanout: F) -> Result<CoordinatorOutcome>
    where
        F: FnOnce(Site) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        if !self.site_store.claim_coordinator_enqueue(subdomain).await? {
            info!(%subdomain, %stage, "coordinator lost claim, no-op");
            return Ok(CoordinatorOutcome::LostClaim);
        }

        let site = self.site_store.get(subdomain).await?;
        next_stage_fanout(site).await?;
        info!(%subdomain, %stage, "coordinator won claim, advanced stage");
        Ok(CoordinatorOutcome::Won)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_types::SiteFields;
    use serde_json::json;
    use site_store::InMemorySiteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    #[tokio::test]
    async fn second_invocation_for_same_transition_is_a_no_op() {
        let site_store = InMemorySiteStore::new();
        site_store.upsert(fields("ex.test")).await.unwrap();
        let subdomain = Subdomain::new("ex.test");
        site_store.initialize_stage(&subdomain, Stage::Ocr, 1).await.unwrap();

        let protocol = CoordinatorProtocol::new(&site_store);
        let advances = AtomicUsize::new(0);

        let first = protocol
            .run(&subdomain, Stage::Ocr, |_site| async {
                advances.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(first, CoordinatorOutcome::Won);

        let second = protocol
            .run(&subdomain, Stage::Ocr, |_site| async {
                advances.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(second, CoordinatorOutcome::LostClaim);

        assert_eq!(advances.load(Ordering::SeqCst), 1);
    }
}
