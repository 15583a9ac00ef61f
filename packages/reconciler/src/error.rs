use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcilerError>;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("site store error: {0}")]
    SiteStore(#[from] site_store::SiteStoreError),

    #[error("job queue error: {0}")]
    JobQueue(#[from] job_queue::JobQueueError),

    #[error("pipeline core error: {0}")]
    Core(#[from] pipeline_core::PipelineCoreError),

    #[error("site filesystem error: {0}")]
    Filesystem(String),
}
