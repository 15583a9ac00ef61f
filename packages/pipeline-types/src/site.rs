use chrono::{DateTime, Utc};

use crate::ids::Subdomain;
use crate::stage::{PipelineStage, Stage, StageCounters};

/// Legacy operator-visible status string (spec §3 "Legacy status"). Always
/// derived from [`PipelineStage`]; `site-store` never persists it
/// independently and nothing in `pipeline-core`/`workers`/`reconciler`
/// branches on it (spec §9 Open Questions: `current_stage` is
/// authoritative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LegacyStatus {
    New,
    Fetching,
    NeedsOcr,
    NeedsDeploy,
    Deployed,
}

impl LegacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyStatus::New => "new",
            LegacyStatus::Fetching => "fetching",
            LegacyStatus::NeedsOcr => "needs_ocr",
            LegacyStatus::NeedsDeploy => "needs_deploy",
            LegacyStatus::Deployed => "deployed",
        }
    }

    /// Derive the legacy label from the authoritative pipeline stage.
    pub fn derive(pipeline_stage: PipelineStage) -> Self {
        match pipeline_stage {
            PipelineStage::NotStarted => LegacyStatus::New,
            PipelineStage::Running(Stage::Fetch) => LegacyStatus::Fetching,
            PipelineStage::Running(Stage::Ocr) => LegacyStatus::NeedsOcr,
            PipelineStage::Running(Stage::Compilation)
            | PipelineStage::Running(Stage::Extraction)
            | PipelineStage::Running(Stage::Deploy) => LegacyStatus::NeedsDeploy,
            PipelineStage::Completed => LegacyStatus::Deployed,
        }
    }
}

/// A geographic coordinate pair, kept separate so `Site` doesn't carry two
/// bare `f64` fields of easily-swapped meaning.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// The most recent failure recorded against a site (spec §3 "Last error").
/// `None` until the first failure; never cleared implicitly afterward
/// (invariant 5).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LastError {
    pub stage: Stage,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// The primary entity of the pipeline (spec §3 "Site"). Mutated only
/// through the counter-update primitives of `site-store`'s `SiteStore`
/// trait; never constructed with invalid counters directly by application
/// code (see [`StageCounters::with_completed_incremented`]).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Site {
    pub subdomain: Subdomain,
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub kind: String,
    pub scraper: String,
    pub start_year: Option<i32>,
    pub extra: serde_json::Value,
    pub location: Option<LatLng>,

    pub pipeline_stage: PipelineStage,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    pub fetch: StageCounters,
    pub ocr: StageCounters,
    pub compilation: StageCounters,
    pub extraction: StageCounters,
    pub deploy: StageCounters,

    pub coordinator_enqueued: bool,
    pub last_error: Option<LastError>,
}

impl Site {
    pub fn counters(&self, stage: Stage) -> StageCounters {
        match stage {
            Stage::Fetch => self.fetch,
            Stage::Ocr => self.ocr,
            Stage::Compilation => self.compilation,
            Stage::Extraction => self.extraction,
            Stage::Deploy => self.deploy,
        }
    }

    pub fn legacy_status(&self) -> LegacyStatus {
        LegacyStatus::derive(self.pipeline_stage)
    }

    /// Spec §8 property 6 helper: a site that is neither fresh nor terminal
    /// is the reconciler's candidate set.
    pub fn is_in_flight(&self) -> bool {
        !matches!(self.pipeline_stage, PipelineStage::NotStarted | PipelineStage::Completed)
    }
}

/// The subset of [`Site`] fields an upstream "create site" collaborator may
/// supply (spec §3 "Lifecycle: created by an upstream create-site action").
#[derive(Debug, Clone)]
pub struct SiteFields {
    pub subdomain: Subdomain,
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub kind: String,
    pub scraper: String,
    pub start_year: Option<i32>,
    pub extra: serde_json::Value,
    pub location: Option<LatLng>,
}
