use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineTypeError>;

#[derive(Error, Debug)]
pub enum PipelineTypeError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("stage counters would overflow total={total}: completed={completed}, failed={failed}")]
    CounterOverflow { total: u64, completed: u64, failed: u64 },
}
