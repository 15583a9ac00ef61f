//! The scraper adapter contract (spec §6 "Scraper adapter").
//!
//! Narrow and out of scope to implement concretely: "given a subdomain and
//! its site config, produce outputs on the filesystem; raise typed errors
//! on failure" (spec §9 "Plugin-like collaborators").

use async_trait::async_trait;
use pipeline_types::Site;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub all_years: bool,
    pub all_agendas: bool,
}

/// A single produced document — a PDF the fetch worker will hand to OCR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub meeting: String,
    pub date: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedDocuments {
    pub documents: Vec<FetchedDocument>,
}

impl FetchedDocuments {
    pub fn count(&self) -> u64 {
        self.documents.len() as u64
    }
}

#[async_trait]
pub trait ScraperAdapter: Send + Sync {
    async fn fetch(&self, site: &Site, opts: FetchOptions) -> Result<FetchedDocuments>;
}

/// Deterministic test double: "downloads" a fixed, caller-supplied set of
/// documents instead of touching the network (spec §9: scrapers must not
/// mutate Site rows — this double doesn't either).
pub struct NullScraper {
    documents: Vec<FetchedDocument>,
}

impl NullScraper {
    pub fn with_documents(documents: Vec<FetchedDocument>) -> Self {
        Self { documents }
    }

    pub fn empty() -> Self {
        Self { documents: Vec::new() }
    }
}

#[async_trait]
impl ScraperAdapter for NullScraper {
    async fn fetch(&self, _site: &Site, _opts: FetchOptions) -> Result<FetchedDocuments> {
        Ok(FetchedDocuments { documents: self.documents.clone() })
    }
}
