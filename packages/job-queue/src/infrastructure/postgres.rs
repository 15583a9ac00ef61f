//! Postgres adapter for [`JobQueue`].
//!
//! Claiming follows the `reserve_next_datum` pattern from the corpus's
//! Diesel-based job reservation code, translated to sqlx: a single
//! `UPDATE ... FOR UPDATE SKIP LOCKED RETURNING *` so two workers racing on
//! the same queue never claim the same row.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::JobQueue;
use crate::error::{JobQueueError, Result};
use crate::job::{JobRecord, JobState, NewJob, Queue};

pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_job(row: PgRow) -> std::result::Result<JobRecord, sqlx::Error> {
    let queue: String = row.try_get("queue")?;
    let state: String = row.try_get("state")?;
    let timeout_secs: i64 = row.try_get("timeout_secs")?;
    let result_ttl_secs: i64 = row.try_get("result_ttl_secs")?;
    let dependency_ids: Vec<Uuid> = row.try_get("dependency_ids")?;

    Ok(JobRecord {
        id: row.try_get("id")?,
        queue: Queue::from_str(&queue).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        func_name: row.try_get("func_name")?,
        args: row.try_get("args")?,
        kwargs: row.try_get("kwargs")?,
        dependency_ids,
        timeout: std::time::Duration::from_secs(timeout_secs.max(0) as u64),
        description: row.try_get("description")?,
        result_ttl: std::time::Duration::from_secs(result_ttl_secs.max(0) as u64),
        state: JobState::from_str(&state).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        exc_info: row.try_get("exc_info")?,
        enqueued_at: row.try_get("enqueued_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, spec: NewJob) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let state = spec.initial_state();

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, func_name, args, kwargs, dependency_ids,
                timeout_secs, description, result_ttl_secs, state, enqueued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            "#,
        )
        .bind(id)
        .bind(spec.queue.as_str())
        .bind(&spec.func_name)
        .bind(&spec.args)
        .bind(&spec.kwargs)
        .bind(&spec.depends_on)
        .bind(spec.timeout.as_secs() as i64)
        .bind(&spec.description)
        .bind(spec.result_ttl.as_secs() as i64)
        .bind(state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn dequeue(&self, queues: &[Queue]) -> Result<Option<JobRecord>> {
        let queue_names: Vec<&'static str> = queues.iter().map(|q| q.as_str()).collect();

        let row = sqlx::query(
            r#"
            UPDATE jobs SET state = 'started', started_at = now()
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'queued' AND queue = ANY($1)
                ORDER BY enqueued_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, queue, func_name, args, kwargs, dependency_ids,
                      timeout_secs, description, result_ttl_secs, state, exc_info,
                      enqueued_at, started_at, finished_at
            "#,
        )
        .bind(&queue_names)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_job).transpose().map_err(JobQueueError::from)
    }

    async fn mark_finished(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET state = 'finished', finished_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(JobQueueError::NotFound(id));
        }

        // Promote any deferred job whose every dependency has now finished.
        sqlx::query(
            r#"
            UPDATE jobs SET state = 'queued'
            WHERE state = 'deferred'
              AND $1 = ANY(dependency_ids)
              AND NOT EXISTS (
                  SELECT 1 FROM jobs AS dep
                  WHERE dep.id = ANY(jobs.dependency_ids) AND dep.state <> 'finished'
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, exc_info: String) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'failed', exc_info = $2, finished_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(exc_info)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(JobQueueError::NotFound(id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, queue, func_name, args, kwargs, dependency_ids,
                   timeout_secs, description, result_ttl_secs, state, exc_info,
                   enqueued_at, started_at, finished_at
            FROM jobs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(JobQueueError::NotFound(id))?;
        Ok(row_to_job(row)?)
    }

    async fn failed_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, queue, func_name, args, kwargs, dependency_ids,
                   timeout_secs, description, result_ttl_secs, state, exc_info,
                   enqueued_at, started_at, finished_at
            FROM jobs WHERE state = 'failed' ORDER BY finished_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_job).collect::<std::result::Result<Vec<_>, _>>().map_err(JobQueueError::from)
    }

    async fn active_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, queue, func_name, args, kwargs, dependency_ids,
                   timeout_secs, description, result_ttl_secs, state, exc_info,
                   enqueued_at, started_at, finished_at
            FROM jobs WHERE state IN ('queued', 'deferred', 'started') ORDER BY enqueued_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_job).collect::<std::result::Result<Vec<_>, _>>().map_err(JobQueueError::from)
    }

    async fn queue_depths(&self) -> Result<HashMap<Queue, (usize, usize)>> {
        let rows = sqlx::query(
            r#"
            SELECT queue, state, count(*) AS count
            FROM jobs
            WHERE state IN ('queued', 'deferred')
            GROUP BY queue, state
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut depths: HashMap<Queue, (usize, usize)> = HashMap::new();
        for row in rows {
            let queue_name: String = row.try_get("queue")?;
            let state_name: String = row.try_get("state")?;
            let count: i64 = row.try_get("count")?;
            let queue = Queue::from_str(&queue_name)?;
            let entry = depths.entry(queue).or_insert((0, 0));
            match state_name.as_str() {
                "queued" => entry.0 = count as usize,
                "deferred" => entry.1 = count as usize,
                _ => {}
            }
        }
        Ok(depths)
    }
}
