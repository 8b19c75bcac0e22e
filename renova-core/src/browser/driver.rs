use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use rand::Rng;
use serde::Deserialize;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::config::RenovaConfig;

use super::error::{BrowserError, BrowserResult};

/// One listing row as the in-page extraction script reports it. Rows
/// without a resolvable edit link are dropped before this point.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRaw {
    pub status: String,
    pub name: Option<String>,
    pub url: String,
}

/// Capability surface the run engine needs from the portal page.
///
/// Engine and collector only speak this trait; the CDP-backed implementation
/// below is the single place that knows about Chromium.
#[async_trait]
pub trait PortalDriver: Send {
    /// Navigates and, when given, waits for `ready_selector` to appear.
    async fn goto(&mut self, url: &str, ready_selector: Option<&str>) -> BrowserResult<()>;

    /// Current value of a form field.
    async fn field_value(&mut self, selector: &str) -> BrowserResult<String>;

    /// Replaces a field's content entirely with `value`.
    async fn fill_field(&mut self, selector: &str, value: &str) -> BrowserResult<()>;

    async fn click(&mut self, selector: &str) -> BrowserResult<()>;

    /// Clicks a submit control and waits for the portal to navigate.
    /// Returns `false` when no navigation happened within the bounded
    /// wait; the caller decides whether that matters.
    async fn submit_and_wait(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Runs an extraction script against the current page and decodes the
    /// rows it returns.
    async fn extract_records(&mut self, script: &str) -> BrowserResult<Vec<RecordRaw>>;

    /// Best-effort recovery keystroke (Escape) after a record failed,
    /// dismissing whatever modal or picker the portal left open. Its own
    /// failure is ignored.
    async fn send_recovery_key(&mut self);
}

pub struct CdpDriver {
    page: Page,
    selector_timeout: Duration,
    save_nav_timeout: Duration,
    typing_delay_ms: (u64, u64),
}

impl CdpDriver {
    pub fn new(page: Page, config: &RenovaConfig) -> Self {
        Self {
            page,
            selector_timeout: Duration::from_secs(config.chromium.selector_timeout_secs),
            save_nav_timeout: Duration::from_secs(config.timing.save_nav_timeout_secs),
            typing_delay_ms: (config.timing.typing_delay_ms[0], config.timing.typing_delay_ms[1]),
        }
    }

    /// Polls for a selector until it resolves or the deadline passes.
    async fn wait_for(&self, selector: &str) -> BrowserResult<Element> {
        let deadline = Instant::now() + self.selector_timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(selector.to_string()));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    async fn typing_pause(&self) {
        let (lower, upper) = self.typing_delay_ms;
        if lower == 0 && upper == 0 {
            return;
        }
        let millis = rand::thread_rng().gen_range(lower.min(upper)..=lower.max(upper));
        sleep(Duration::from_millis(millis)).await;
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn clear_field_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.focus(); el.value = ''; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()",
        sel = js_string(selector)
    )
}

fn field_value_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); return el ? el.value : null; }})()",
        sel = js_string(selector)
    )
}

const RECOVERY_KEY_SCRIPT: &str = "(() => { const target = document.activeElement || document.body; \
     target.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true })); \
     target.dispatchEvent(new KeyboardEvent('keyup', { key: 'Escape', bubbles: true })); })()";

#[async_trait]
impl PortalDriver for CdpDriver {
    async fn goto(&mut self, url: &str, ready_selector: Option<&str>) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        if let Some(selector) = ready_selector {
            self.wait_for(selector).await?;
        }
        Ok(())
    }

    async fn field_value(&mut self, selector: &str) -> BrowserResult<String> {
        self.wait_for(selector).await?;
        let script = field_value_script(selector);
        let value: Option<String> = self
            .page
            .evaluate(script.as_str())
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to decode field value: {err}"))
            })?;
        value.ok_or_else(|| BrowserError::Unexpected(format!("field {selector} not found")))
    }

    async fn fill_field(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        let element = self.wait_for(selector).await?;
        element.click().await?;
        let cleared: bool = self
            .page
            .evaluate(clear_field_script(selector).as_str())
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to decode clear result: {err}"))
            })?;
        if !cleared {
            return Err(BrowserError::Unexpected(format!(
                "field {selector} disappeared before clearing"
            )));
        }
        for ch in value.chars() {
            element.type_str(ch.to_string()).await?;
            self.typing_pause().await;
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let element = self.wait_for(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn submit_and_wait(&mut self, selector: &str) -> BrowserResult<bool> {
        let element = self.wait_for(selector).await?;
        element.click().await?;
        match timeout(self.save_nav_timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(err)) => {
                debug!(error = %err, "navigation after submit reported error");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    async fn extract_records(&mut self, script: &str) -> BrowserResult<Vec<RecordRaw>> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to decode listing rows: {err}"))
            })
    }

    async fn send_recovery_key(&mut self) {
        if let Err(err) = self.page.evaluate(RECOVERY_KEY_SCRIPT).await {
            debug!(error = %err, "recovery keystroke failed");
        }
    }
}
