use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineCoreError>;

#[derive(Error, Debug)]
pub enum PipelineCoreError {
    #[error("site store error: {0}")]
    SiteStore(#[from] site_store::SiteStoreError),

    #[error("job queue error: {0}")]
    JobQueue(#[from] job_queue::JobQueueError),

    #[error("pipeline type error: {0}")]
    Types(#[from] pipeline_types::PipelineTypeError),

    #[error("missing stage: {0}")]
    MissingStage(String),
}
