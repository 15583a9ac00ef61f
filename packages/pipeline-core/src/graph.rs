//! The stage graph (spec §4.3): a linear chain with one optional node.
//!
//! Generalizes the teacher's `PipelineDAG`/`topological_sort` — built for an
//! arbitrary DAG with parallel phases — down to the single shape this
//! system actually needs: `fetch -> ocr -> compilation -> [extraction?] ->
//! deploy -> completed`. Kept as its own type (rather than inlining the
//! `next` logic into the coordinator) so `execution_plan()`-style
//! introspection has one place to live.

use pipeline_types::Stage;

/// Whether the `extraction` stage participates in a given pipeline run
/// (spec §9 Open Questions: resolved as a linear, feature-flagged stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageGraph {
    extraction_enabled: bool,
}

impl StageGraph {
    pub fn new(extraction_enabled: bool) -> Self {
        Self { extraction_enabled }
    }

    /// The ordered phases of this graph, mirroring the teacher's
    /// `Vec<Vec<Stage>>` execution-order shape even though every phase here
    /// holds exactly one stage — there is no stage-level parallelism in this
    /// system, only per-unit fan-out within a stage.
    pub fn phases(&self) -> Vec<Stage> {
        if self.extraction_enabled {
            vec![Stage::Fetch, Stage::Ocr, Stage::Compilation, Stage::Extraction, Stage::Deploy]
        } else {
            vec![Stage::Fetch, Stage::Ocr, Stage::Compilation, Stage::Deploy]
        }
    }

    /// The stage that follows `current`, or `None` once `Deploy` finishes
    /// (the site transitions to `PipelineStage::Completed` instead).
    pub fn next_stage(&self, current: Stage) -> Option<Stage> {
        let phases = self.phases();
        let position = phases.iter().position(|stage| *stage == current)?;
        phases.get(position + 1).copied()
    }

    /// Human-readable rendering for logs, in the style of the teacher's
    /// `execution_plan()`.
    pub fn execution_plan(&self) -> String {
        self.phases()
            .iter()
            .enumerate()
            .map(|(i, stage)| format!("Phase {}: {stage}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
