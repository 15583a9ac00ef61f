//! Durable per-site state: the `sites` table and its atomic stage counters
//! (spec §3, §4.1).
//!
//! `domain` defines the port every other crate in the workspace programs
//! against; `infrastructure` supplies the two adapters (`postgres` for
//! production, `in_memory` for tests).

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::SiteStore;
pub use error::{Result, SiteStoreError};
pub use infrastructure::{InMemorySiteStore, PostgresSiteStore};
