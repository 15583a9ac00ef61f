//! The deploy adapter contract (spec §6) — publishes the compiled artifact
//! to whatever target is configured; out of scope to implement concretely.

use async_trait::async_trait;
use pipeline_types::Subdomain;

use crate::error::Result;

#[async_trait]
pub trait DeployAdapter: Send + Sync {
    async fn deploy(&self, subdomain: &Subdomain) -> Result<()>;
}

pub struct NullDeployer {
    result: std::result::Result<(), String>,
}

impl NullDeployer {
    pub fn succeeding() -> Self {
        Self { result: Ok(()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { result: Err(message.into()) }
    }
}

#[async_trait]
impl DeployAdapter for NullDeployer {
    async fn deploy(&self, _subdomain: &Subdomain) -> Result<()> {
        self.result.clone().map_err(crate::error::WorkerError::Deploy)
    }
}
