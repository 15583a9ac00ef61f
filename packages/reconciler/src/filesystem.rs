//! The narrow filesystem-contract port for the "OCR-complete" predicate
//! (spec §6 "Site directory layout"): "a document is considered
//! OCR-complete iff its `txt/{meeting}/{date}/` directory contains at least
//! one `.txt` file". `reconciler` only ever needs the count, never the
//! paths themselves.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use walkdir::WalkDir;

use pipeline_types::Subdomain;

use crate::error::{ReconcilerError, Result};

#[async_trait]
pub trait SiteFilesystem: Send + Sync {
    /// Count of documents for `subdomain` whose OCR output directory holds
    /// at least one `.txt` file — the reconciler's ground truth for
    /// recovering a stuck OCR stage (spec §4.5).
    async fn count_ocr_complete_documents(&self, subdomain: &Subdomain) -> Result<u64>;
}

/// Deterministic test double: a fixed, caller-supplied observed count per
/// subdomain, standing in for a real `walkdir`-based implementation.
#[derive(Default)]
pub struct InMemorySiteFilesystem {
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemorySiteFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, subdomain: &Subdomain, count: u64) {
        self.counts.lock().expect("lock not poisoned").insert(subdomain.as_str().to_string(), count);
    }
}

#[async_trait]
impl SiteFilesystem for InMemorySiteFilesystem {
    async fn count_ocr_complete_documents(&self, subdomain: &Subdomain) -> Result<u64> {
        Ok(self.counts.lock().expect("lock not poisoned").get(subdomain.as_str()).copied().unwrap_or(0))
    }
}

/// The real adapter: counts `{storage_root}/{subdomain}/txt/{meeting}/{date}/`
/// directories that hold at least one `.txt` file (spec §6 "Site directory
/// layout"), mirroring the teacher's `WalkDir`-based file discovery in
/// `l1_ir_build.rs` retargeted from "every source file" to "every
/// OCR-complete document directory".
pub struct FsSiteFilesystem {
    storage_root: PathBuf,
}

impl FsSiteFilesystem {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self { storage_root: storage_root.into() }
    }
}

#[async_trait]
impl SiteFilesystem for FsSiteFilesystem {
    async fn count_ocr_complete_documents(&self, subdomain: &Subdomain) -> Result<u64> {
        let txt_root = self.storage_root.join(subdomain.as_str()).join("txt");
        if !txt_root.is_dir() {
            return Ok(0);
        }

        let mut complete = 0u64;
        for entry in WalkDir::new(&txt_root).min_depth(2).max_depth(2).into_iter() {
            let entry = entry.map_err(|e| ReconcilerError::Filesystem(e.to_string()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let has_txt = std::fs::read_dir(entry.path())
                .map_err(|e| ReconcilerError::Filesystem(e.to_string()))?
                .filter_map(|e| e.ok())
                .any(|e| e.path().extension().is_some_and(|ext| ext == "txt"));
            if has_txt {
                complete += 1;
            }
        }
        Ok(complete)
    }
}
