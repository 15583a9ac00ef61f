//! In-memory [`JobQueue`] double used by every test in `pipeline-core`,
//! `workers`, and `reconciler` — mirrors `InMemorySiteStore`'s
//! `DashMap`-per-entity shape.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::JobQueue;
use crate::error::{JobQueueError, Result};
use crate::job::{JobRecord, JobState, NewJob, Queue};

#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: DashMap<Uuid, JobRecord>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn dependencies_all_finished(&self, dependency_ids: &[Uuid]) -> bool {
        dependency_ids.iter().all(|dep_id| {
            self.jobs
                .get(dep_id)
                .map(|dep| dep.state == JobState::Finished)
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, spec: NewJob) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let state = spec.initial_state();
        let record = JobRecord {
            id,
            queue: spec.queue,
            func_name: spec.func_name,
            args: spec.args,
            kwargs: spec.kwargs,
            dependency_ids: spec.depends_on,
            timeout: spec.timeout,
            description: spec.description,
            result_ttl: spec.result_ttl,
            state,
            exc_info: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.jobs.insert(id, record);
        Ok(id)
    }

    async fn dequeue(&self, queues: &[Queue]) -> Result<Option<JobRecord>> {
        let candidate = self
            .jobs
            .iter()
            .filter(|entry| entry.state == JobState::Queued && queues.contains(&entry.queue))
            .min_by_key(|entry| entry.enqueued_at)
            .map(|entry| *entry.key());

        let Some(id) = candidate else {
            return Ok(None);
        };

        let mut entry = self.jobs.get_mut(&id).expect("candidate id found under lock above");
        entry.state = JobState::Started;
        entry.started_at = Some(Utc::now());
        Ok(Some(entry.clone()))
    }

    async fn mark_finished(&self, id: Uuid) -> Result<()> {
        {
            let mut entry = self.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
            entry.state = JobState::Finished;
            entry.finished_at = Some(Utc::now());
        }

        let promotable: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|entry| entry.state == JobState::Deferred && entry.dependency_ids.contains(&id))
            .filter(|entry| self.dependencies_all_finished(&entry.dependency_ids))
            .map(|entry| *entry.key())
            .collect();

        for promoted_id in promotable {
            if let Some(mut entry) = self.jobs.get_mut(&promoted_id) {
                entry.state = JobState::Queued;
            }
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, exc_info: String) -> Result<()> {
        let mut entry = self.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        entry.state = JobState::Failed;
        entry.exc_info = Some(exc_info);
        entry.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord> {
        self.jobs.get(&id).map(|entry| entry.clone()).ok_or(JobQueueError::NotFound(id))
    }

    async fn failed_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .jobs
            .iter()
            .filter(|entry| entry.state == JobState::Failed)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn active_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.jobs.iter().filter(|entry| !entry.state.is_terminal()).map(|entry| entry.clone()).collect())
    }

    async fn queue_depths(&self) -> Result<HashMap<Queue, (usize, usize)>> {
        let mut depths: HashMap<Queue, (usize, usize)> = HashMap::new();
        for entry in self.jobs.iter() {
            let counter = depths.entry(entry.queue).or_insert((0, 0));
            match entry.state {
                JobState::Queued => counter.0 += 1,
                JobState::Deferred => counter.1 += 1,
                _ => {}
            }
        }
        Ok(depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_without_dependencies_starts_queued() {
        let queue = InMemoryJobQueue::new();
        let id = queue.enqueue(NewJob::new(Queue::Fetch, "fetch")).await.unwrap();
        assert_eq!(queue.get(id).await.unwrap().state, JobState::Queued);
    }

    #[tokio::test]
    async fn dequeue_claims_oldest_queued_job_in_given_queues() {
        let queue = InMemoryJobQueue::new();
        let first = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let _second = queue.enqueue(NewJob::new(Queue::Fetch, "fetch")).await.unwrap();

        let claimed = queue.dequeue(&[Queue::Ocr]).await.unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.state, JobState::Started);
    }

    #[tokio::test]
    async fn dependent_job_promotes_once_all_dependencies_finish() {
        let queue = InMemoryJobQueue::new();
        let dep_a = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let dep_b = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let coordinator = queue
            .enqueue(NewJob::new(Queue::Ocr, "ocr_coordinator").depends_on(vec![dep_a, dep_b]))
            .await
            .unwrap();

        assert_eq!(queue.get(coordinator).await.unwrap().state, JobState::Deferred);

        queue.mark_finished(dep_a).await.unwrap();
        assert_eq!(queue.get(coordinator).await.unwrap().state, JobState::Deferred);

        queue.mark_finished(dep_b).await.unwrap();
        assert_eq!(queue.get(coordinator).await.unwrap().state, JobState::Queued);
    }

    #[tokio::test]
    async fn failed_job_dependents_stay_deferred() {
        let queue = InMemoryJobQueue::new();
        let dep = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let coordinator = queue
            .enqueue(NewJob::new(Queue::Ocr, "ocr_coordinator").depends_on(vec![dep]))
            .await
            .unwrap();

        queue.mark_failed(dep, "boom".to_string()).await.unwrap();
        assert_eq!(queue.get(coordinator).await.unwrap().state, JobState::Deferred);
    }

    #[tokio::test]
    async fn active_jobs_excludes_finished_and_failed() {
        let queue = InMemoryJobQueue::new();
        let finished = queue.enqueue(NewJob::new(Queue::Fetch, "fetch")).await.unwrap();
        let failed = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let _queued = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();

        queue.mark_finished(finished).await.unwrap();
        queue.mark_failed(failed, "boom".to_string()).await.unwrap();

        let active = queue.active_jobs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.iter().all(|job| !job.state.is_terminal()));
    }

    #[tokio::test]
    async fn queue_depths_counts_queued_and_deferred_separately() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        let dep = queue.enqueue(NewJob::new(Queue::Ocr, "ocr_page")).await.unwrap();
        queue
            .enqueue(NewJob::new(Queue::Ocr, "ocr_coordinator").depends_on(vec![dep]))
            .await
            .unwrap();

        let depths = queue.queue_depths().await.unwrap();
        assert_eq!(depths.get(&Queue::Ocr), Some(&(2, 1)));
    }
}
