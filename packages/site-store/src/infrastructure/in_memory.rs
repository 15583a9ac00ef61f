//! In-memory [`SiteStore`] double for tests, mirroring
//! `CheckpointManager::new_in_memory()`'s lock-guarded-`Vec` pattern but
//! keyed by subdomain in a [`DashMap`] rather than scanned linearly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pipeline_types::{ErrorClass, LastError, PipelineStage, Site, SiteFields, Stage};

use crate::domain::SiteStore;
use crate::error::{Result, SiteStoreError};

#[derive(Default)]
pub struct InMemorySiteStore {
    sites: DashMap<String, Site>,
}

impl InMemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_site_mut<F, T>(&self, subdomain: &pipeline_types::Subdomain, f: F) -> Result<T>
    where
        F: FnOnce(&mut Site) -> T,
    {
        let mut entry = self
            .sites
            .get_mut(subdomain.as_str())
            .ok_or_else(|| SiteStoreError::NotFound(subdomain.clone()))?;
        Ok(f(&mut entry))
    }
}

#[async_trait]
impl SiteStore for InMemorySiteStore {
    async fn get(&self, subdomain: &pipeline_types::Subdomain) -> Result<Site> {
        self.sites
            .get(subdomain.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| SiteStoreError::NotFound(subdomain.clone()))
    }

    async fn upsert(&self, fields: SiteFields) -> Result<Site> {
        let now = Utc::now();
        let site = self
            .sites
            .entry(fields.subdomain.as_str().to_string())
            .and_modify(|site| {
                site.name = fields.name.clone();
                site.state = fields.state.clone();
                site.country = fields.country.clone();
                site.kind = fields.kind.clone();
                site.scraper = fields.scraper.clone();
                site.start_year = fields.start_year;
                site.extra = fields.extra.clone();
                site.location = fields.location;
                site.updated_at = now;
            })
            .or_insert_with(|| Site {
                subdomain: fields.subdomain.clone(),
                name: fields.name.clone(),
                state: fields.state.clone(),
                country: fields.country.clone(),
                kind: fields.kind.clone(),
                scraper: fields.scraper.clone(),
                start_year: fields.start_year,
                extra: fields.extra.clone(),
                location: fields.location,
                pipeline_stage: PipelineStage::NotStarted,
                started_at: None,
                updated_at: now,
                fetch: Default::default(),
                ocr: Default::default(),
                compilation: Default::default(),
                extraction: Default::default(),
                deploy: Default::default(),
                coordinator_enqueued: false,
                last_error: None,
            })
            .clone();
        Ok(site)
    }

    async fn initialize_stage(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
        total: u64,
    ) -> Result<()> {
        self.with_site_mut(subdomain, |site| {
            let counters = pipeline_types::StageCounters::new(total);
            match stage {
                Stage::Fetch => site.fetch = counters,
                Stage::Ocr => site.ocr = counters,
                Stage::Compilation => site.compilation = counters,
                Stage::Extraction => site.extraction = counters,
                Stage::Deploy => site.deploy = counters,
            }
            site.pipeline_stage = PipelineStage::Running(stage);
            site.coordinator_enqueued = false;
            if site.started_at.is_none() {
                site.started_at = Some(Utc::now());
            }
            site.updated_at = Utc::now();
        })
    }

    async fn increment_completed(&self, subdomain: &pipeline_types::Subdomain, stage: Stage) -> Result<()> {
        self.with_site_mut(subdomain, |site| -> Result<()> {
            let counters = site.counters(stage).with_completed_incremented()?;
            set_counters(site, stage, counters);
            site.updated_at = Utc::now();
            Ok(())
        })?
    }

    async fn increment_failed(
        &self,
        subdomain: &pipeline_types::Subdomain,
        stage: Stage,
        error_class: ErrorClass,
        error_message: &str,
    ) -> Result<()> {
        let truncated = pipeline_types::truncate_error_message(error_class.as_str(), error_message);
        self.with_site_mut(subdomain, |site| -> Result<()> {
            let counters = site.counters(stage).with_failed_incremented()?;
            set_counters(site, stage, counters);
            site.last_error = Some(LastError {
                stage,
                message: truncated,
                at: Utc::now(),
            });
            site.updated_at = Utc::now();
            Ok(())
        })?
    }

    async fn should_trigger_coordinator(&self, subdomain: &pipeline_types::Subdomain, stage: Stage) -> Result<bool> {
        let site = self.get(subdomain).await?;
        Ok(site.counters(stage).is_saturated() && !site.coordinator_enqueued)
    }

    async fn claim_coordinator_enqueue(&self, subdomain: &pipeline_types::Subdomain) -> Result<bool> {
        self.with_site_mut(subdomain, |site| {
            if site.coordinator_enqueued {
                false
            } else {
                site.coordinator_enqueued = true;
                true
            }
        })
    }

    async fn mark_completed(&self, subdomain: &pipeline_types::Subdomain) -> Result<()> {
        self.with_site_mut(subdomain, |site| {
            site.pipeline_stage = PipelineStage::Completed;
            site.updated_at = Utc::now();
        })
    }

    async fn oldest_updated(&self) -> Result<Option<Site>> {
        Ok(self
            .sites
            .iter()
            .min_by_key(|entry| entry.updated_at)
            .map(|entry| entry.clone()))
    }

    async fn stale_sites(&self, cutoff: DateTime<Utc>) -> Result<Vec<Site>> {
        let mut sites: Vec<Site> = self
            .sites
            .iter()
            .filter(|entry| entry.is_in_flight() && entry.updated_at < cutoff)
            .map(|entry| entry.clone())
            .collect();
        sites.sort_by_key(|site| site.updated_at);
        Ok(sites)
    }

    async fn raise_completed(&self, subdomain: &pipeline_types::Subdomain, stage: Stage, observed: u64) -> Result<()> {
        self.with_site_mut(subdomain, |site| {
            let counters = site.counters(stage);
            let raised = observed.min(counters.total).max(counters.completed);
            set_counters(
                site,
                stage,
                pipeline_types::StageCounters {
                    total: counters.total,
                    completed: raised,
                    failed: counters.failed,
                },
            );
            site.updated_at = Utc::now();
        })
    }
}

fn set_counters(site: &mut Site, stage: Stage, counters: pipeline_types::StageCounters) {
    match stage {
        Stage::Fetch => site.fetch = counters,
        Stage::Ocr => site.ocr = counters,
        Stage::Compilation => site.compilation = counters,
        Stage::Extraction => site.extraction = counters,
        Stage::Deploy => site.deploy = counters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_types::{LatLng, Subdomain};

    fn fields(subdomain: &str) -> SiteFields {
        SiteFields {
            subdomain: Subdomain::new(subdomain),
            name: "Example County".to_string(),
            state: Some("tx".to_string()),
            country: "us".to_string(),
            kind: "county".to_string(),
            scraper: "example".to_string(),
            start_year: Some(1990),
            extra: serde_json::json!({}),
            location: Some(LatLng { lat: 1.0, lng: 2.0 }),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        let site = store.get(&subdomain).await.unwrap();
        assert_eq!(site.name, "Example County");
        assert_eq!(site.pipeline_stage, PipelineStage::NotStarted);
    }

    #[tokio::test]
    async fn get_missing_site_is_not_found() {
        let store = InMemorySiteStore::new();
        let err = store.get(&Subdomain::new("missing")).await.unwrap_err();
        assert!(matches!(err, SiteStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn initialize_stage_resets_counters_and_claim() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        store.claim_coordinator_enqueue(&subdomain).await.unwrap();
        store.initialize_stage(&subdomain, Stage::Ocr, 3).await.unwrap();

        let site = store.get(&subdomain).await.unwrap();
        assert_eq!(site.ocr.total, 3);
        assert!(!site.coordinator_enqueued);
        assert_eq!(site.pipeline_stage, PipelineStage::Running(Stage::Ocr));
    }

    #[tokio::test]
    async fn coordinator_claim_is_single_shot() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();

        assert!(store.claim_coordinator_enqueue(&subdomain).await.unwrap());
        assert!(!store.claim_coordinator_enqueue(&subdomain).await.unwrap());
    }

    #[tokio::test]
    async fn should_trigger_coordinator_once_saturated() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        store.initialize_stage(&subdomain, Stage::Ocr, 2).await.unwrap();

        assert!(!store.should_trigger_coordinator(&subdomain, Stage::Ocr).await.unwrap());

        store.increment_completed(&subdomain, Stage::Ocr).await.unwrap();
        assert!(!store.should_trigger_coordinator(&subdomain, Stage::Ocr).await.unwrap());

        store.increment_failed(&subdomain, Stage::Ocr, ErrorClass::Transient, "boom").await.unwrap();
        assert!(store.should_trigger_coordinator(&subdomain, Stage::Ocr).await.unwrap());
    }

    #[tokio::test]
    async fn stale_sites_excludes_not_started_and_completed() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        store.initialize_stage(&subdomain, Stage::Ocr, 1).await.unwrap();

        let far_future = Utc::now() + chrono::Duration::days(1);
        let stale = store.stale_sites(far_future).await.unwrap();
        assert_eq!(stale.len(), 1);

        store.mark_completed(&subdomain).await.unwrap();
        let stale = store.stale_sites(far_future).await.unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn concurrent_completions_never_lose_an_increment() {
        use std::sync::Arc;

        let store = Arc::new(InMemorySiteStore::new());
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        store.initialize_stage(&subdomain, Stage::Ocr, 20).await.unwrap();

        let mut handles = Vec::with_capacity(20);
        for _ in 0..20 {
            let store = store.clone();
            let subdomain = subdomain.clone();
            handles.push(tokio::spawn(async move { store.increment_completed(&subdomain, Stage::Ocr).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&subdomain).await.unwrap().ocr.completed, 20);
    }

    #[tokio::test]
    async fn raise_completed_never_exceeds_total_and_never_drops_below_current() {
        let store = InMemorySiteStore::new();
        let subdomain = Subdomain::new("ex.test");
        store.upsert(fields("ex.test")).await.unwrap();
        store.initialize_stage(&subdomain, Stage::Ocr, 5).await.unwrap();
        store.increment_completed(&subdomain, Stage::Ocr).await.unwrap();

        store.raise_completed(&subdomain, Stage::Ocr, 3).await.unwrap();
        assert_eq!(store.get(&subdomain).await.unwrap().ocr.completed, 3);

        store.raise_completed(&subdomain, Stage::Ocr, 1).await.unwrap();
        assert_eq!(store.get(&subdomain).await.unwrap().ocr.completed, 3);

        store.raise_completed(&subdomain, Stage::Ocr, 999).await.unwrap();
        assert_eq!(store.get(&subdomain).await.unwrap().ocr.completed, 5);
    }
}
