//! The bundle of collaborators every worker job shape needs (spec §4.4).
//!
//! Grouped into one struct, in the style of the teacher's `StageContext`,
//! so `pipeline-cli` and `reconciler` construct it once and every job shape
//! takes the same `&WorkerDeps` parameter regardless of which adapters the
//! deployment actually wires in.

use std::sync::Arc;

use job_queue::JobQueue;
use site_store::SiteStore;

use crate::adapters::{CompilerAdapter, DeployAdapter, ExtractorAdapter, OcrBackendRegistry, ScraperAdapter};

/// Runtime configuration that changes worker behavior (spec §9 Open
/// Questions: extraction is optional and feature-flagged).
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub extraction_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { extraction_enabled: false }
    }
}

pub struct WorkerDeps {
    pub site_store: Arc<dyn SiteStore>,
    pub job_queue: Arc<dyn JobQueue>,
    pub scraper: Arc<dyn ScraperAdapter>,
    pub ocr_backends: Arc<OcrBackendRegistry>,
    pub compiler: Arc<dyn CompilerAdapter>,
    pub extractor: Arc<dyn ExtractorAdapter>,
    pub deployer: Arc<dyn DeployAdapter>,
    pub config: PipelineConfig,
}
