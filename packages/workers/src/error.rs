use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

/// A typed failure from a plugin-like collaborator (spec §9 "Plugin-like
/// collaborators"). Workers translate these into the spec §7 taxonomy via
/// [`pipeline_core::classify`] before deciding whether to swallow or
/// re-raise.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("scraper error: {0}")]
    Scraper(String),

    #[error("ocr error: {0}")]
    Ocr(String),

    #[error("compiler error: {0}")]
    Compiler(String),

    #[error("extractor error: {0}")]
    Extractor(String),

    #[error("deploy error: {0}")]
    Deploy(String),

    #[error("site store error: {0}")]
    SiteStore(#[from] site_store::SiteStoreError),

    #[error("job queue error: {0}")]
    JobQueue(#[from] job_queue::JobQueueError),

    #[error("pipeline core error: {0}")]
    Core(#[from] pipeline_core::PipelineCoreError),
}
