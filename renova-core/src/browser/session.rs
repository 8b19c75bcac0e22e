use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RenovaConfig;

use super::error::{BrowserError, BrowserResult};

/// Builds and launches Chromium instances for renewal runs.
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<RenovaConfig>,
}

impl BrowserLauncher {
    pub fn new(config: Arc<RenovaConfig>) -> Self {
        Self { config }
    }

    pub async fn launch(&self) -> BrowserResult<BrowserSession> {
        let chromium_config = self.build_chromium_config()?;
        let chromium = &self.config.chromium;
        info!(
            headless = chromium.headless,
            width = chromium.viewport[0],
            height = chromium.viewport[1],
            "launching chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler_task: Some(handler_task),
        })
    }

    fn build_chromium_config(&self) -> BrowserResult<ChromiumConfig> {
        let chromium = &self.config.chromium;
        let [width, height] = chromium.viewport;
        let mut builder = ChromiumConfig::builder().viewport(ChromiumViewport {
            width,
            height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: width >= height,
            has_touch: false,
        });

        if let Some(path) = &chromium.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !chromium.headless {
            builder = builder.with_head();
        }
        if !chromium.sandbox {
            builder = builder.no_sandbox();
        }
        builder = builder.request_timeout(Duration::from_secs(chromium.nav_timeout_secs));

        let args = vec![
            format!("--user-agent={}", chromium.user_agent),
            format!("--window-size={width},{height}"),
            "--disable-background-timer-throttling".to_string(),
            "--password-store=basic".to_string(),
        ];
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}

/// One launched Chromium instance. Whoever launches it owns teardown:
/// `shutdown` must run on every exit path of a run, fatal ones included.
#[derive(Debug)]
pub struct BrowserSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserSession {
    pub async fn new_page(&self) -> BrowserResult<Page> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        Ok(page)
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("shutting down chromium instance");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("BrowserSession dropped without explicit shutdown");
            }
        }
    }
}
