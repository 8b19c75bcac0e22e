use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::browser::{BrowserResult, PortalDriver, RecordRaw};
use crate::config::RenovaConfig;

/// One client row from the listing grid, in rendered order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub status: String,
    pub display_name: Option<String>,
    pub edit_url: String,
}

impl From<RecordRaw> for ClientRecord {
    fn from(raw: RecordRaw) -> Self {
        let display_name = raw
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Self {
            status: raw.status.trim().to_string(),
            display_name,
            edit_url: raw.url,
        }
    }
}

/// Pulls the candidate records off the clients listing.
///
/// Collection is all-or-nothing: any navigation or extraction failure is
/// fatal to the run. Rows without a resolvable edit link are silently
/// excluded by the in-page script, not counted as failures.
pub struct RecordCollector {
    config: Arc<RenovaConfig>,
}

impl RecordCollector {
    pub fn new(config: Arc<RenovaConfig>) -> Self {
        Self { config }
    }

    pub async fn collect<D: PortalDriver + ?Sized>(
        &self,
        driver: &mut D,
    ) -> BrowserResult<Vec<ClientRecord>> {
        let selectors = &self.config.selectors;
        driver
            .goto(&self.config.portal.clients_url, Some(&selectors.table_rows))
            .await?;

        // The grid plugin keeps filling rows after the first one renders.
        let settle = self.config.timing.listing_settle_ms;
        if settle > 0 {
            sleep(Duration::from_millis(settle)).await;
        }

        let script = extraction_script(&selectors.table_rows, &selectors.edit_link);
        let rows = driver.extract_records(&script).await?;
        debug!(rows = rows.len(), "listing rows extracted");
        Ok(rows.into_iter().map(ClientRecord::from).collect())
    }
}

fn extraction_script(rows_selector: &str, edit_link_selector: &str) -> String {
    let rows = serde_json::Value::from(rows_selector);
    let link = serde_json::Value::from(edit_link_selector);
    format!(
        "(() => Array.from(document.querySelectorAll({rows})).map((tr) => {{ \
           const cells = tr.querySelectorAll('td'); \
           const status = cells[0] ? cells[0].innerText.trim() : ''; \
           const name = cells[3] ? cells[3].innerText.trim() : ''; \
           const link = tr.querySelector({link}); \
           return {{ status, name, url: link ? link.href : null }}; \
         }}).filter((row) => row.url))()"
    )
}
