pub mod browser;
pub mod cancel;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod runlog;
pub mod runner;

pub use cancel::CancelToken;
pub use collector::ClientRecord;
pub use config::{load_config, load_config_or_default, RenovaConfig};
pub use engine::{RunEngine, RunError};
pub use error::ConfigError;
pub use outcome::{RecordOutcome, RunSummary, SkipReason};
pub use policy::{compute_target_date, is_eligible_for_edit, TargetDate};
pub use runlog::{LogEntry, LogLevel, LogSink, TracingSink};
pub use runner::execute_run;
