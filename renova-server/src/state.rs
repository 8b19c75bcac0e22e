use std::sync::{Arc, Mutex};

use serde::Serialize;

use renova_core::{CancelToken, LogEntry, LogSink, RenovaConfig, RunSummary};

/// Handle threaded through the axum router.
#[derive(Clone)]
pub struct AppState {
    pub state: SharedState,
    pub config: Arc<RenovaConfig>,
}

/// Terminal result of the most recent run, kept for status polling.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LastResult {
    Summary(RunSummary),
    Error { error: String },
}

/// In-memory control-layer state: the single "running" flag that enforces
/// one run at a time, the active run's cancel token, the last result and
/// the append-only log buffer.
#[derive(Debug, Default)]
pub struct RunState {
    running: bool,
    cancel: Option<CancelToken>,
    result: Option<LastResult>,
    logs: Vec<LogEntry>,
}

impl RunState {
    /// Claims the running slot. Returns the fresh cancel token for the new
    /// run, or `None` when a run is already in flight.
    pub fn begin_run(&mut self) -> Option<CancelToken> {
        if self.running {
            return None;
        }
        self.running = true;
        self.result = None;
        self.logs.clear();
        let cancel = CancelToken::new();
        self.cancel = Some(cancel.clone());
        Some(cancel)
    }

    pub fn finish_run(&mut self, result: LastResult) {
        self.result = Some(result);
        self.cancel = None;
        self.running = false;
    }

    /// Relays a stop request to the active run. `false` when none is active.
    pub fn request_stop(&self) -> bool {
        match (&self.cancel, self.running) {
            (Some(cancel), true) => {
                cancel.request_stop();
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_result(&self) -> Option<LastResult> {
        self.result.clone()
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    /// Log entries from `from` onward, plus the total count so far, for
    /// incremental polling.
    pub fn logs_from(&self, from: usize) -> (Vec<LogEntry>, usize) {
        let total = self.logs.len();
        let batch = if from >= total {
            Vec::new()
        } else {
            self.logs[from..].to_vec()
        };
        (batch, total)
    }
}

pub type SharedState = Arc<Mutex<RunState>>;

/// Engine log sink that appends into the shared polling buffer.
pub struct BufferSink {
    state: SharedState,
}

impl BufferSink {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl LogSink for BufferSink {
    fn emit(&self, entry: LogEntry) {
        self.state.lock().unwrap().push_log(entry);
    }
}
