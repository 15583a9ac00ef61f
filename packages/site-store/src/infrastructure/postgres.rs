//! Postgres adapter for [`SiteStore`].
//!
//! One row per site in `sites`. The five per-stage counter triples
//! (`{stage}_total/completed/failed`) are plain columns rather than a
//! normalized child table — this keeps every mutation a single-row
//! `UPDATE`, which is what lets `claim_coordinator_enqueue` and the
//! `increment_*` methods run as one round trip each with no explicit
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_types::{
    ErrorClass, LastError, LatLng, PipelineStage, PipelineTypeError, Site, SiteFields, Stage, StageCounters, Subdomain,
};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::SiteStore;
use crate::error::{Result, SiteStoreError};

pub struct PostgresSiteStore {
    pool: PgPool,
}

impl PostgresSiteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn counter_columns(stage: Stage) -> (&'static str, &'static str, &'static str) {
        match stage {
            Stage::Fetch => ("fetch_total", "fetch_completed", "fetch_failed"),
            Stage::Ocr => ("ocr_total", "ocr_completed", "ocr_failed"),
            Stage::Compilation => ("compilation_total", "compilation_completed", "compilation_failed"),
            Stage::Extraction => ("extraction_total", "extraction_completed", "extraction_failed"),
            Stage::Deploy => ("deploy_total", "deploy_completed", "deploy_failed"),
        }
    }

    /// Builds the error for a rejected conditional increment. Re-fetches the
    /// site to tell a genuinely missing subdomain (`NotFound`) apart from one
    /// whose `completed + failed < total` guard just rejected the increment
    /// (`CounterOverflow`), matching what the in-memory adapter's checked
    /// `with_completed_incremented`/`with_failed_incremented` would return.
    async fn counter_overflow_error(&self, subdomain: &Subdomain, stage: Stage, completed: bool) -> Result<SiteStoreError> {
        let site = self.get(subdomain).await?;
        let counters = site.counters(stage);
        let (completed, failed) =
            if completed { (counters.completed + 1, counters.failed) } else { (counters.completed, counters.failed + 1) };
        Ok(SiteStoreError::Types(PipelineTypeError::CounterOverflow { total: counters.total, completed, failed }))
    }
}

fn row_to_site(row: PgRow) -> std::result::Result<Site, sqlx::Error> {
    let current_stage: Option<String> = row.try_get("current_stage_name")?;
    let pipeline_stage = match current_stage {
        None => PipelineStage::NotStarted,
        Some(name) if name == "completed" => PipelineStage::Completed,
        Some(name) => {
            let stage = Stage::from_str(&name).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            PipelineStage::Running(stage)
        }
    };

    let location = match (row.try_get::<Option<f64>, _>("lat")?, row.try_get::<Option<f64>, _>("lng")?) {
        (Some(lat), Some(lng)) => Some(LatLng { lat, lng }),
        _ => None,
    };

    let last_error = match row.try_get::<Option<String>, _>("last_error_stage")? {
        None => None,
        Some(stage_name) => Some(LastError {
            stage: Stage::from_str(&stage_name).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            message: row.try_get("last_error_message")?,
            at: row.try_get("last_error_at")?,
        }),
    };

    let make_counters = |total: i64, completed: i64, failed: i64| StageCounters {
        total: total as u64,
        completed: completed as u64,
        failed: failed as u64,
    };

    Ok(Site {
        subdomain: Subdomain::new(row.try_get::<String, _>("subdomain")?),
        name: row.try_get("name")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        kind: row.try_get("kind")?,
        scraper: row.try_get("scraper")?,
        start_year: row.try_get("start_year")?,
        extra: row.try_get::<Option<serde_json::Value>, _>("extra")?.unwrap_or(serde_json::Value::Null),
        location,
        pipeline_stage,
        started_at: row.try_get("started_at")?,
        updated_at: row.try_get("updated_at")?,
        fetch: make_counters(row.try_get("fetch_total")?, row.try_get("fetch_completed")?, row.try_get("fetch_failed")?),
        ocr: make_counters(row.try_get("ocr_total")?, row.try_get("ocr_completed")?, row.try_get("ocr_failed")?),
        compilation: make_counters(
            row.try_get("compilation_total")?,
            row.try_get("compilation_completed")?,
            row.try_get("compilation_failed")?,
        ),
        extraction: make_counters(
            row.try_get("extraction_total")?,
            row.try_get("extraction_completed")?,
            row.try_get("extraction_failed")?,
        ),
        deploy: make_counters(row.try_get("deploy_total")?, row.try_get("deploy_completed")?, row.try_get("deploy_failed")?),
        coordinator_enqueued: row.try_get("coordinator_enqueued")?,
        last_error,
    })
}

#[async_trait]
impl SiteStore for PostgresSiteStore {
    async fn get(&self, subdomain: &Subdomain) -> Result<Site> {
        let row = sqlx::query(
            r#"
            SELECT subdomain, name, state, country, kind, scraper, start_year, extra,
                   lat, lng,
                   current_stage AS current_stage_name,
                   started_at, updated_at,
                   fetch_total, fetch_completed, fetch_failed,
                   ocr_total, ocr_completed, ocr_failed,
                   compilation_total, compilation_completed, compilation_failed,
                   extraction_total, extraction_completed, extraction_failed,
                   deploy_total, deploy_completed, deploy_failed,
                   coordinator_enqueued,
                   last_error_stage, last_error_message, last_error_at
            FROM sites WHERE subdomain = $1
            "#,
        )
        .bind(subdomain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| SiteStoreError::NotFound(subdomain.clone()))?;
        Ok(row_to_site(row)?)
    }

    async fn upsert(&self, fields: SiteFields) -> Result<Site> {
        sqlx::query(
            r#"
            INSERT INTO sites (subdomain, name, state, country, kind, scraper, start_year, extra, lat, lng, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now())
            ON CONFLICT (subdomain) DO UPDATE SET
                name = EXCLUDED.name,
                state = EXCLUDED.state,
                country = EXCLUDED.country,
                kind = EXCLUDED.kind,
                scraper = EXCLUDED.scraper,
                start_year = EXCLUDED.start_year,
                extra = EXCLUDED.extra,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                updated_at = now()
            "#,
        )
        .bind(fields.subdomain.as_str())
        .bind(&fields.name)
        .bind(&fields.state)
        .bind(&fields.country)
        .bind(&fields.kind)
        .bind(&fields.scraper)
        .bind(fields.start_year)
        .bind(&fields.extra)
        .bind(fields.location.as_ref().map(|l| l.lat))
        .bind(fields.location.as_ref().map(|l| l.lng))
        .execute(&self.pool)
        .await?;

        self.get(&fields.subdomain).await
    }

    async fn initialize_stage(&self, subdomain: &Subdomain, stage: Stage, total: u64) -> Result<()> {
        let (total_col, completed_col, failed_col) = Self::counter_columns(stage);
        let sql = format!(
            r#"
            UPDATE sites SET
                current_stage = $2,
                {total_col} = $3,
                {completed_col} = 0,
                {failed_col} = 0,
                coordinator_enqueued = false,
                updated_at = now()
            WHERE subdomain = $1
            "#
        );
        let result = sqlx::query(&sql)
            .bind(subdomain.as_str())
            .bind(stage.as_str())
            .bind(total as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SiteStoreError::NotFound(subdomain.clone()));
        }
        Ok(())
    }

    async fn increment_completed(&self, subdomain: &Subdomain, stage: Stage) -> Result<()> {
        let (total_col, completed_col, failed_col) = Self::counter_columns(stage);
        let sql = format!(
            r#"
            UPDATE sites SET {completed_col} = {completed_col} + 1, updated_at = now()
            WHERE subdomain = $1 AND {completed_col} + {failed_col} < {total_col}
            "#
        );
        let result = sqlx::query(&sql).bind(subdomain.as_str()).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(self.counter_overflow_error(subdomain, stage, true).await?);
        }
        Ok(())
    }

    async fn increment_failed(
        &self,
        subdomain: &Subdomain,
        stage: Stage,
        error_class: ErrorClass,
        error_message: &str,
    ) -> Result<()> {
        let (total_col, completed_col, failed_col) = Self::counter_columns(stage);
        let truncated = pipeline_types::truncate_error_message(error_class.as_str(), error_message);
        let sql = format!(
            r#"
            UPDATE sites SET
                {failed_col} = {failed_col} + 1,
                last_error_stage = $2,
                last_error_message = $3,
                last_error_at = now(),
                updated_at = now()
            WHERE subdomain = $1 AND {completed_col} + {failed_col} < {total_col}
            "#
        );
        let result = sqlx::query(&sql)
            .bind(subdomain.as_str())
            .bind(stage.as_str())
            .bind(truncated)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.counter_overflow_error(subdomain, stage, false).await?);
        }
        Ok(())
    }

    async fn should_trigger_coordinator(&self, subdomain: &Subdomain, stage: Stage) -> Result<bool> {
        let site = self.get(subdomain).await?;
        let counters = site.counters(stage);
        Ok(counters.is_saturated() && !site.coordinator_enqueued)
    }

    async fn claim_coordinator_enqueue(&self, subdomain: &Subdomain) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sites SET coordinator_enqueued = true WHERE subdomain = $1 AND coordinator_enqueued = false",
        )
        .bind(subdomain.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_completed(&self, subdomain: &Subdomain) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sites SET current_stage = 'completed', updated_at = now() WHERE subdomain = $1",
        )
        .bind(subdomain.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SiteStoreError::NotFound(subdomain.clone()));
        }
        Ok(())
    }

    async fn oldest_updated(&self) -> Result<Option<Site>> {
        let row = sqlx::query(
            r#"
            SELECT subdomain, name, state, country, kind, scraper, start_year, extra,
                   lat, lng,
                   current_stage AS current_stage_name,
                   started_at, updated_at,
                   fetch_total, fetch_completed, fetch_failed,
                   ocr_total, ocr_completed, ocr_failed,
                   compilation_total, compilation_completed, compilation_failed,
                   extraction_total, extraction_completed, extraction_failed,
                   deploy_total, deploy_completed, deploy_failed,
                   coordinator_enqueued,
                   last_error_stage, last_error_message, last_error_at
            FROM sites ORDER BY updated_at ASC LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_site).transpose().map_err(SiteStoreError::from)
    }

    async fn stale_sites(&self, cutoff: DateTime<Utc>) -> Result<Vec<Site>> {
        let rows = sqlx::query(
            r#"
            SELECT subdomain, name, state, country, kind, scraper, start_year, extra,
                   lat, lng,
                   current_stage AS current_stage_name,
                   started_at, updated_at,
                   fetch_total, fetch_completed, fetch_failed,
                   ocr_total, ocr_completed, ocr_failed,
                   compilation_total, compilation_completed, compilation_failed,
                   extraction_total, extraction_completed, extraction_failed,
                   deploy_total, deploy_completed, deploy_failed,
                   coordinator_enqueued,
                   last_error_stage, last_error_message, last_error_at
            FROM sites
            WHERE current_stage IS NOT NULL
              AND current_stage <> 'completed'
              AND updated_at < $1
            ORDER BY updated_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_site).collect::<std::result::Result<Vec<_>, _>>().map_err(SiteStoreError::from)
    }

    async fn raise_completed(&self, subdomain: &Subdomain, stage: Stage, observed: u64) -> Result<()> {
        let (total_col, completed_col, _) = Self::counter_columns(stage);
        let sql = format!(
            r#"
            UPDATE sites SET {completed_col} = LEAST(GREATEST({completed_col}, $2), {total_col}), updated_at = now()
            WHERE subdomain = $1
            "#
        );
        sqlx::query(&sql)
            .bind(subdomain.as_str())
            .bind(observed as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
