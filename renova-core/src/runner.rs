use std::sync::Arc;

use tracing::warn;

use crate::browser::{BrowserLauncher, CdpDriver};
use crate::cancel::CancelToken;
use crate::config::RenovaConfig;
use crate::engine::{RunEngine, RunError};
use crate::outcome::RunSummary;
use crate::runlog::LogSink;

/// Executes one complete run: launch Chromium, drive the engine, tear the
/// session down on every exit path.
pub async fn execute_run(
    config: Arc<RenovaConfig>,
    sink: Arc<dyn LogSink>,
    cancel: CancelToken,
) -> Result<RunSummary, RunError> {
    let launcher = BrowserLauncher::new(Arc::clone(&config));
    let session = launcher.launch().await.map_err(RunError::Session)?;

    let outcome = match session.new_page().await {
        Ok(page) => {
            let mut driver = CdpDriver::new(page, &config);
            let engine = RunEngine::new(config, sink, cancel);
            engine.run(&mut driver).await
        }
        Err(err) => Err(RunError::Session(err)),
    };

    if let Err(err) = session.shutdown().await {
        warn!(error = %err, "browser session teardown failed");
    }
    outcome
}
