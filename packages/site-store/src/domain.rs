//! The `SiteStore` port (spec §4.1).
//!
//! This is the only place a worker or the reconciler is allowed to mutate a
//! [`Site`]. Every mutating method here corresponds to one paragraph of
//! spec §4.1 "Required operations" and must execute as a single atomic
//! transaction — implementations back this with row-level locking
//! (`PostgresSiteStore`) or a single lock-free map entry (`InMemorySiteStore`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_types::{ErrorClass, Site, SiteFields, Stage};

use crate::error::Result;

#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Look up a site by subdomain. `Err(SiteStoreError::NotFound)` if absent.
    async fn get(&self, subdomain: &pipeline_types::Subdomain) -> Result<Site>;

    /// Insert-or-update a site's identity/config fields. Used only by the
    /// upstream "create site" collaborator (spec §3 "Lifecycle").
    async fn upsert(&self, fields: SiteFields) -> Result<Site>;

    /// Set `current_stage = stage`, `{stage}_total = total`,
    /// `{stage}_completed = 0`, `{stage}_failed = 0`,
    /// `coordinator_enqueued = false`, refresh `updated_at`.
    ///
    /// Idempotent when called twice with the same `(stage, total)` — this is
    /// spec §8 property 3, "coordinator idempotence", at the storage layer.
    async fn initialize_stage(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
        total: u64,
    ) -> Result<()>;

    /// Atomic `+1` on `{stage}_completed`.
    async fn increment_completed(&self, subdomain: &pipeline_types::Subdomain, stage: Stage) -> Result<()>;

    /// Atomic `+1` on `{stage}_failed`, plus the `last_error_*` fields.
    async fn increment_failed(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
        error_class: ErrorClass,
        error_message: &str,
    ) -> Result<()>;

    /// `true` iff `{stage}_completed + {stage}_failed == {stage}_total` and
    /// `coordinator_enqueued == false`. A pure read — taking no part in the
    /// claim itself.
    async fn should_trigger_coordinator(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
    ) -> Result<bool>;

    /// Compare-and-set `coordinator_enqueued` from `false` to `true`.
    /// Returns whether *this* caller won the claim — the single
    /// linearization point preventing duplicate coordinators (spec §4.1,
    /// §8 property 2).
    async fn claim_coordinator_enqueue(&self, subdomain: &pipeline_types::Subdomain) -> Result<bool>;

    /// Mark the site `Completed` (spec §4.4.5 `deploy` success path).
    async fn mark_completed(&self, subdomain: &pipeline_types::Subdomain) -> Result<()>;

    /// The single oldest-updated site, for operator tooling.
    async fn oldest_updated(&self) -> Result<Option<Site>>;

    /// Sites with `current_stage not in {null, completed}` and
    /// `updated_at < cutoff` — the reconciler's candidate set.
    async fn stale_sites(&self, cutoff: DateTime<Utc>) -> Result<Vec<Site>>;

    /// Raise `ocr_completed` to `observed`, bounded by `ocr_total`, never
    /// lowering it (spec §4.5 "Safety": the reconciler never decrements
    /// counters). Used only by the reconciler's OCR-stuck recovery path.
    async fn raise_completed(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
        observed: u64,
    ) -> Result<()>;
}
