//! The compiler adapter contract (spec §6 "Compiler / extractor / deploy
//! adapters"): a deterministic function of `(subdomain)` with well-defined
//! filesystem inputs and outputs.

use async_trait::async_trait;
use pipeline_types::Subdomain;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub documents_compiled: u64,
}

#[async_trait]
pub trait CompilerAdapter: Send + Sync {
    async fn compile(&self, subdomain: &Subdomain) -> Result<CompileReport>;
}

pub struct NullCompiler {
    report: std::result::Result<CompileReport, String>,
}

impl NullCompiler {
    pub fn succeeding(documents_compiled: u64) -> Self {
        Self { report: Ok(CompileReport { documents_compiled }) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { report: Err(message.into()) }
    }
}

#[async_trait]
impl CompilerAdapter for NullCompiler {
    async fn compile(&self, _subdomain: &Subdomain) -> Result<CompileReport> {
        self.report.clone().map_err(crate::error::WorkerError::Compiler)
    }
}
