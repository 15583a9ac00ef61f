//! The extractor adapter contract — same shape as [`crate::adapters::compiler`],
//! present only when `extraction` is enabled (spec §9 Open Questions; the
//! concrete entity/vote extraction logic is out of scope, spec §1).

use async_trait::async_trait;
use pipeline_types::Subdomain;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub entities_extracted: u64,
}

#[async_trait]
pub trait ExtractorAdapter: Send + Sync {
    async fn extract(&self, subdomain: &Subdomain) -> Result<ExtractReport>;
}

pub struct NullExtractor {
    report: std::result::Result<ExtractReport, String>,
}

impl NullExtractor {
    pub fn succeeding(entities_extracted: u64) -> Self {
        Self { report: Ok(ExtractReport { entities_extracted }) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { report: Err(message.into()) }
    }
}

#[async_trait]
impl ExtractorAdapter for NullExtractor {
    async fn extract(&self, _subdomain: &Subdomain) -> Result<ExtractReport> {
        self.report.clone().map_err(crate::error::WorkerError::Extractor)
    }
}
