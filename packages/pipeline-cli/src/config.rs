//! Environment-var configuration (spec §6), loaded via `dotenvy` for local
//! development before `Cli::parse()` runs — mirroring the teacher's
//! `Config::new` pattern of resolving all tunables once at startup rather
//! than threading `env::var` calls through the command handlers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub struct PipelineConfig {
    pub database_url: String,
    pub storage_root: PathBuf,
    pub reconcile_interval: Duration,
    pub reconcile_threshold: Duration,
    pub extraction_enabled: bool,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let storage_root = std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string()).into();

        let reconcile_interval = Duration::from_secs(env_u64("RECONCILE_INTERVAL_SECS", 900)?);
        let reconcile_threshold = Duration::from_secs(env_u64("RECONCILE_THRESHOLD_HOURS", 2)? * 3600);
        let extraction_enabled = std::env::var("EXTRACTION_ENABLED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            storage_root,
            reconcile_interval,
            reconcile_threshold,
            extraction_enabled,
        })
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}
