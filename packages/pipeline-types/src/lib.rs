//! Shared domain types for the document pipeline coordination core.
//!
//! This crate has no knowledge of storage or queueing — it is the vocabulary
//! `site-store`, `job-queue`, `pipeline-core`, `workers`, and `reconciler`
//! all speak, kept dependency-light so every crate in the workspace can
//! depend on it without pulling in sqlx or tokio.

pub mod error;
pub mod error_class;
pub mod ids;
pub mod site;
pub mod stage;

pub use error::{PipelineTypeError, Result};
pub use error_class::{truncate_error_message, ErrorClass, ErrorFingerprint, FileKind};
pub use ids::{RunId, Subdomain};
pub use site::{LastError, LatLng, LegacyStatus, Site, SiteFields};
pub use stage::{PipelineStage, Stage, StageCounters};
