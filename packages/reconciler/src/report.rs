use pipeline_types::Subdomain;

/// Operator-facing outcome of one `Reconciler::sweep` call, backing the
/// `pipeline-cli reconcile` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sites whose coordinator claim was won this sweep and whose next
    /// stage was fanned out.
    pub recovered: Vec<Subdomain>,
    /// Sites reported stalled — no observed progress, surfaced for human
    /// attention rather than retried automatically (spec §4.5, §7 "Critical").
    pub stalled: Vec<Subdomain>,
    /// Sites whose single-job stage (or fetch) was simply re-enqueued.
    pub requeued: Vec<Subdomain>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.recovered.is_empty() && self.stalled.is_empty() && self.requeued.is_empty()
    }
}

/// Per-site outcome of one recovery attempt, folded into a [`SweepReport`]
/// by `Reconciler::sweep`. `NoOp` sites contribute to none of the three
/// buckets — another process already claimed the transition this sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    Stalled,
    Requeued,
    NoOp,
}
