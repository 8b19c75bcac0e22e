use serde::Serialize;

/// Why a record was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Status is not the active marker; the record is never navigated to.
    InactiveStatus(String),
    /// Stored validity date does not mark the record as due; carries the
    /// raw value for the log.
    IneligibleDate(String),
}

/// Terminal outcome of one visited record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Updated { previous: String, applied: String },
    Skipped(SkipReason),
    Failed(String),
}

/// Per-run counters, folded from record outcomes.
///
/// `total` counts records actually visited, so
/// `succeeded + skipped + failed == total` holds at every point, including
/// after an early cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Updated { .. } => self.succeeded += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
        self.total += 1;
    }

    pub fn visited(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}
