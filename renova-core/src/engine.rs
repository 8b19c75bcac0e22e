use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::{BrowserError, BrowserResult, PortalDriver};
use crate::cancel::CancelToken;
use crate::collector::{ClientRecord, RecordCollector};
use crate::config::RenovaConfig;
use crate::outcome::{RecordOutcome, RunSummary, SkipReason};
use crate::policy::{self, TargetDate};
use crate::runlog::{LogEntry, LogLevel, LogSink};

/// Fatal, run-aborting conditions. Everything else is isolated to the
/// record it happened in.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("browser session failed to start: {0}")]
    Session(#[source] BrowserError),
    #[error("authentication failed: {0}")]
    Authentication(#[source] BrowserError),
    #[error("record collection failed: {0}")]
    Collection(#[source] BrowserError),
}

/// The run orchestration engine.
///
/// Sequences authentication, collection and the per-record loop over a
/// [`PortalDriver`]. Strictly sequential: every record shares the same
/// navigation context, so there is no parallel processing. The cancel
/// token is consulted between records only; an in-flight record always
/// runs to completion or local failure first.
pub struct RunEngine {
    config: Arc<RenovaConfig>,
    sink: Arc<dyn LogSink>,
    cancel: CancelToken,
    collector: RecordCollector,
}

impl RunEngine {
    pub fn new(config: Arc<RenovaConfig>, sink: Arc<dyn LogSink>, cancel: CancelToken) -> Self {
        let collector = RecordCollector::new(Arc::clone(&config));
        Self {
            config,
            sink,
            cancel,
            collector,
        }
    }

    pub async fn run<D: PortalDriver>(&self, driver: &mut D) -> Result<RunSummary, RunError> {
        self.run_on_date(driver, Local::now().date_naive()).await
    }

    /// Runs with an explicit "today". Captured once so eligibility stays
    /// consistent even if the run crosses midnight or a month boundary.
    pub async fn run_on_date<D: PortalDriver>(
        &self,
        driver: &mut D,
        today: NaiveDate,
    ) -> Result<RunSummary, RunError> {
        self.cancel.reset();
        let target = policy::compute_target_date(today);
        self.log(
            LogLevel::Info,
            format!("target validity date for this run: {target}"),
        );

        self.authenticate(driver).await?;

        self.log(LogLevel::Info, "opening clients listing");
        let records = self
            .collector
            .collect(driver)
            .await
            .map_err(RunError::Collection)?;
        self.log(LogLevel::Success, "listing loaded");

        let collected = records.len();
        if collected == 0 {
            self.log(LogLevel::Warning, "no client records found");
            return Ok(RunSummary::default());
        }

        self.log(LogLevel::Info, format!("{collected} client record(s) found"));
        for (status, count) in status_breakdown(&records) {
            self.log(LogLevel::Info, format!("  {status}: {count} record(s)"));
        }

        let mut summary = RunSummary::default();
        for (index, record) in records.iter().enumerate() {
            if self.cancel.should_stop() {
                summary.cancelled = true;
                self.log(
                    LogLevel::Warning,
                    format!("run interrupted by operator after {index} record(s)"),
                );
                break;
            }

            let name_label = record
                .display_name
                .as_deref()
                .map(|name| format!(" {name}"))
                .unwrap_or_default();
            self.log(
                LogLevel::Info,
                format!(
                    "── client {}{name_label} / {collected} — status \"{}\"",
                    index + 1,
                    record.status
                ),
            );

            let outcome = self.process_record(driver, record, target, today).await;
            self.log_outcome(&outcome);
            summary.record(&outcome);

            match outcome {
                RecordOutcome::Failed(_) => driver.send_recovery_key().await,
                RecordOutcome::Updated { .. } => {
                    // Pacing only. Gives the portal room to finish its own
                    // post-save work before the next navigation.
                    let settle = self.config.timing.save_settle_ms;
                    if settle > 0 {
                        sleep(Duration::from_millis(settle)).await;
                    }
                }
                RecordOutcome::Skipped(_) => {}
            }
        }

        self.log_summary(&summary, collected);
        Ok(summary)
    }

    async fn authenticate<D: PortalDriver>(&self, driver: &mut D) -> Result<(), RunError> {
        let portal = &self.config.portal;
        let selectors = &self.config.selectors;
        let credentials = &self.config.credentials;

        self.log(
            LogLevel::Info,
            format!("opening portal at {}", portal.login_url),
        );
        driver
            .goto(&portal.login_url, Some(&selectors.login_user))
            .await
            .map_err(RunError::Authentication)?;

        self.log(
            LogLevel::Info,
            format!("signing in as {}", credentials.user),
        );
        driver
            .fill_field(&selectors.login_user, &credentials.user)
            .await
            .map_err(RunError::Authentication)?;
        driver
            .fill_field(&selectors.login_password, &credentials.password)
            .await
            .map_err(RunError::Authentication)?;
        let navigated = driver
            .submit_and_wait(&selectors.login_button)
            .await
            .map_err(RunError::Authentication)?;
        if !navigated {
            return Err(RunError::Authentication(BrowserError::Timeout(
                "post-login navigation".to_string(),
            )));
        }
        self.log(LogLevel::Success, "signed in");
        Ok(())
    }

    /// Decides and applies one record. Never lets a driver error escape:
    /// whatever happens inside is folded into the outcome.
    async fn process_record<D: PortalDriver>(
        &self,
        driver: &mut D,
        record: &ClientRecord,
        target: TargetDate,
        today: NaiveDate,
    ) -> RecordOutcome {
        // Status filter short-circuits the date check: inactive records are
        // never navigated to, whatever their stored date.
        let active = self.config.portal.active_status.to_lowercase();
        if record.status.to_lowercase() != active {
            return RecordOutcome::Skipped(SkipReason::InactiveStatus(record.status.clone()));
        }

        match self.edit_record(driver, record, target, today).await {
            Ok(outcome) => outcome,
            Err(err) => RecordOutcome::Failed(err.to_string()),
        }
    }

    async fn edit_record<D: PortalDriver>(
        &self,
        driver: &mut D,
        record: &ClientRecord,
        target: TargetDate,
        today: NaiveDate,
    ) -> BrowserResult<RecordOutcome> {
        let selectors = &self.config.selectors;
        driver
            .goto(&record.edit_url, Some(&selectors.validity_field))
            .await?;
        let current = driver.field_value(&selectors.validity_field).await?;
        if !policy::is_eligible_for_edit(&current, today) {
            return Ok(RecordOutcome::Skipped(SkipReason::IneligibleDate(current)));
        }

        let applied = target.to_string();
        driver.fill_field(&selectors.validity_field, &applied).await?;
        driver.submit_and_wait(&selectors.save_button).await?;
        Ok(RecordOutcome::Updated {
            previous: current,
            applied,
        })
    }

    fn log_outcome(&self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Updated { previous, applied } => self.log(
                LogLevel::Success,
                format!("  \"{previous}\" → \"{applied}\" saved"),
            ),
            RecordOutcome::Skipped(SkipReason::InactiveStatus(status)) => self.log(
                LogLevel::Warning,
                format!("  skipped — status \"{status}\""),
            ),
            RecordOutcome::Skipped(SkipReason::IneligibleDate(raw)) => self.log(
                LogLevel::Warning,
                format!("  skipped — validity \"{raw}\" is not day 20 of the current month"),
            ),
            RecordOutcome::Failed(message) => {
                self.log(LogLevel::Error, format!("  error: {message}"))
            }
        }
    }

    fn log_summary(&self, summary: &RunSummary, collected: usize) {
        self.log(LogLevel::Info, "─".repeat(45));
        if summary.cancelled {
            self.log(LogLevel::Warning, "interrupted by operator");
        } else {
            self.log(LogLevel::Info, "run complete");
        }
        self.log(LogLevel::Info, format!("  updated   : {}", summary.succeeded));
        self.log(LogLevel::Info, format!("  skipped   : {}", summary.skipped));
        self.log(LogLevel::Info, format!("  failed    : {}", summary.failed));
        self.log(
            LogLevel::Info,
            format!("  processed : {} of {collected}", summary.visited()),
        );
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match entry.level {
            LogLevel::Info | LogLevel::Success => info!("{}", entry.message),
            LogLevel::Warning => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }
        self.sink.emit(entry);
    }
}

/// Count of records per distinct status value, first-seen order.
fn status_breakdown(records: &[ClientRecord]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for record in records {
        match counts.iter_mut().find(|(status, _)| *status == record.status) {
            Some((_, count)) => *count += 1,
            None => counts.push((record.status.clone(), 1)),
        }
    }
    counts
}
