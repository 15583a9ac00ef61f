use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, JobQueueError>;

#[derive(Error, Debug)]
pub enum JobQueueError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job type error: {0}")]
    Types(#[from] pipeline_types::PipelineTypeError),
}
