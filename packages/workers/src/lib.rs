//! The five worker job shapes (spec §4.4) and the plugin adapter traits
//! they delegate to (spec §6, §9 "Plugin-like collaborators").
//!
//! Every job shape is a plain async fn rather than a trait object — the
//! teacher's `StageHandler` trait models a handler *registered* against a
//! DAG node; here the five shapes are fixed by spec.md and never looked up
//! polymorphically, so a function per shape is the simpler idiom.

pub mod adapters;
pub mod deps;
pub mod error;
pub mod jobs;

pub use deps::{PipelineConfig, WorkerDeps};
pub use error::{Result, WorkerError};
