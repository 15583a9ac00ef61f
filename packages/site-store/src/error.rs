use thiserror::Error;
use pipeline_types::Subdomain;

pub type Result<T> = std::result::Result<T, SiteStoreError>;

#[derive(Error, Debug)]
pub enum SiteStoreError {
    #[error("site not found: {0}")]
    NotFound(Subdomain),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("site type error: {0}")]
    Types(#[from] pipeline_types::PipelineTypeError),
}
