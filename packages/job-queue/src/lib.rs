//! Durable, dependency-aware job queues (spec §3 "Job", §4.2).
//!
//! Workers never see a typed future — only a `(func_name, args)` pair, RQ
//! style, so a job enqueued by one process version can still be picked up
//! by a worker built from a different one.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod job;

pub use domain::JobQueue;
pub use error::{JobQueueError, Result};
pub use infrastructure::{InMemoryJobQueue, PostgresJobQueue};
pub use job::{JobRecord, JobState, NewJob, Queue};
