use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use renova_core::browser::{BrowserError, BrowserResult, PortalDriver, RecordRaw};
use renova_core::cancel::CancelToken;
use renova_core::engine::{RunEngine, RunError};
use renova_core::runlog::{LogEntry, LogSink};
use renova_core::RenovaConfig;

const LOGIN_BUTTON: &str = "#btnEnviar";
const SAVE_BUTTON: &str = "#btnGravar";
const VALIDITY_FIELD: &str = "#ValidadeLicenca";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
}

fn test_config() -> Arc<RenovaConfig> {
    let mut config = RenovaConfig::default();
    config.credentials.user = "operator".into();
    config.credentials.password = "secret".into();
    config.timing.listing_settle_ms = 0;
    config.timing.save_settle_ms = 0;
    config.timing.typing_delay_ms = [0, 0];
    Arc::new(config)
}

#[derive(Default)]
struct BufferSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogSink for BufferSink {
    fn emit(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

struct MockDriver {
    rows: Vec<RecordRaw>,
    validity_by_url: HashMap<String, String>,
    fail_save_for: HashSet<String>,
    login_navigates: bool,
    stop_after_saves: Option<(usize, CancelToken)>,
    current_url: String,
    saves: usize,
    recovery_keys: usize,
    calls: Vec<String>,
}

impl MockDriver {
    fn new(rows: Vec<RecordRaw>) -> Self {
        Self {
            rows,
            validity_by_url: HashMap::new(),
            fail_save_for: HashSet::new(),
            login_navigates: true,
            stop_after_saves: None,
            current_url: String::new(),
            saves: 0,
            recovery_keys: 0,
            calls: Vec::new(),
        }
    }

    fn edit_gotos(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.starts_with("goto:") && call.contains("/Editar/"))
            .count()
    }
}

fn row(status: &str, name: &str, url: &str) -> RecordRaw {
    RecordRaw {
        status: status.into(),
        name: Some(name.into()),
        url: url.into(),
    }
}

fn edit_url(n: usize) -> String {
    format!("https://portal.test/MeusClientes/Editar/{n}")
}

#[async_trait]
impl PortalDriver for MockDriver {
    async fn goto(&mut self, url: &str, _ready_selector: Option<&str>) -> BrowserResult<()> {
        self.current_url = url.to_string();
        self.calls.push(format!("goto:{url}"));
        Ok(())
    }

    async fn field_value(&mut self, selector: &str) -> BrowserResult<String> {
        self.calls.push(format!("read:{selector}"));
        self.validity_by_url
            .get(&self.current_url)
            .cloned()
            .ok_or_else(|| BrowserError::Unexpected(format!("no value staged for {selector}")))
    }

    async fn fill_field(&mut self, selector: &str, value: &str) -> BrowserResult<()> {
        self.calls.push(format!("fill:{selector}={value}"));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        self.calls.push(format!("click:{selector}"));
        Ok(())
    }

    async fn submit_and_wait(&mut self, selector: &str) -> BrowserResult<bool> {
        self.calls.push(format!("submit:{selector}"));
        if selector == LOGIN_BUTTON {
            return Ok(self.login_navigates);
        }
        if selector == SAVE_BUTTON {
            if self.fail_save_for.contains(&self.current_url) {
                return Err(BrowserError::Timeout("save button".into()));
            }
            self.saves += 1;
            if let Some((after, token)) = &self.stop_after_saves {
                if self.saves == *after {
                    token.request_stop();
                }
            }
        }
        Ok(true)
    }

    async fn extract_records(&mut self, _script: &str) -> BrowserResult<Vec<RecordRaw>> {
        self.calls.push("extract".into());
        Ok(self.rows.clone())
    }

    async fn send_recovery_key(&mut self) {
        self.recovery_keys += 1;
        self.calls.push("recovery".into());
    }
}

fn engine(config: Arc<RenovaConfig>, cancel: CancelToken) -> (RunEngine, Arc<BufferSink>) {
    let sink = Arc::new(BufferSink::default());
    let engine = RunEngine::new(config, sink.clone(), cancel);
    (engine, sink)
}

#[tokio::test]
async fn zero_records_completes_with_empty_summary() {
    let (engine, _sink) = engine(test_config(), CancelToken::new());
    let mut driver = MockDriver::new(vec![]);

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.visited(), 0);
    assert!(!summary.cancelled);
    assert_eq!(driver.edit_gotos(), 0);
    assert!(!driver
        .calls
        .iter()
        .any(|call| call.starts_with(&format!("fill:{VALIDITY_FIELD}"))));
    assert!(!driver
        .calls
        .iter()
        .any(|call| call == &format!("submit:{SAVE_BUTTON}")));
}

#[tokio::test]
async fn inactive_status_skips_without_navigation() {
    let url = edit_url(1);
    let mut driver = MockDriver::new(vec![row("Inativa", "Padaria Central", &url)]);
    // Even an eligible stored date must not be reached: the status filter
    // short-circuits the date check.
    driver
        .validity_by_url
        .insert(url.clone(), "20/04/2024".into());
    let (engine, _sink) = engine(test_config(), CancelToken::new());

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.total, 1);
    assert_eq!(driver.edit_gotos(), 0);
}

#[tokio::test]
async fn ineligible_date_skips_after_reading_field() {
    let url = edit_url(1);
    let mut driver = MockDriver::new(vec![row("Ativa", "Mercado Azul", &url)]);
    driver
        .validity_by_url
        .insert(url.clone(), "21/04/2024".into());
    let (engine, _sink) = engine(test_config(), CancelToken::new());

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total, 1);
    assert_eq!(driver.edit_gotos(), 1);
    assert!(!driver
        .calls
        .iter()
        .any(|call| call == &format!("submit:{SAVE_BUTTON}")));
}

#[tokio::test]
async fn eligible_record_is_rewritten_and_saved() {
    let url = edit_url(7);
    let mut driver = MockDriver::new(vec![row("Ativa", "Mercado Azul", &url)]);
    driver
        .validity_by_url
        .insert(url.clone(), "20/04/2024 10:00".into());
    let (engine, sink) = engine(test_config(), CancelToken::new());

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.total, 1);

    let expected_tail = vec![
        format!("goto:{url}"),
        format!("read:{VALIDITY_FIELD}"),
        format!("fill:{VALIDITY_FIELD}=20/05/2024"),
        format!("submit:{SAVE_BUTTON}"),
    ];
    let tail: Vec<_> = driver.calls[driver.calls.len() - expected_tail.len()..].to_vec();
    assert_eq!(tail, expected_tail);

    let logged = sink.entries.lock().unwrap();
    assert!(logged
        .iter()
        .any(|entry| entry.message.contains("\"20/04/2024 10:00\" → \"20/05/2024\"")));
}

#[tokio::test]
async fn stop_request_truncates_remaining_records() {
    let rows: Vec<RecordRaw> = (1..=5)
        .map(|n| row("Ativa", &format!("Cliente {n}"), &edit_url(n)))
        .collect();
    let mut driver = MockDriver::new(rows);
    for n in 1..=5 {
        driver
            .validity_by_url
            .insert(edit_url(n), "20/04/2024".into());
    }
    let cancel = CancelToken::new();
    driver.stop_after_saves = Some((2, cancel.clone()));
    let (engine, _sink) = engine(test_config(), cancel);

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.visited(), 2);
    assert_eq!(driver.edit_gotos(), 2);
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_run() {
    let rows: Vec<RecordRaw> = (1..=5)
        .map(|n| row("Ativa", &format!("Cliente {n}"), &edit_url(n)))
        .collect();
    let mut driver = MockDriver::new(rows);
    for n in 1..=5 {
        driver
            .validity_by_url
            .insert(edit_url(n), "20/04/2024".into());
    }
    driver.fail_save_for.insert(edit_url(3));
    let (engine, _sink) = engine(test_config(), CancelToken::new());

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.total, 5);
    assert_eq!(driver.edit_gotos(), 5);
    assert_eq!(driver.recovery_keys, 1);
}

#[tokio::test]
async fn missing_login_navigation_is_an_authentication_failure() {
    let mut driver = MockDriver::new(vec![]);
    driver.login_navigates = false;
    let (engine, _sink) = engine(test_config(), CancelToken::new());

    let err = engine.run_on_date(&mut driver, today()).await.unwrap_err();

    assert!(matches!(err, RunError::Authentication(_)));
    assert!(!driver.calls.iter().any(|call| call == "extract"));
}

#[tokio::test]
async fn stale_stop_request_is_cleared_at_run_start() {
    let url = edit_url(1);
    let mut driver = MockDriver::new(vec![row("Ativa", "Cliente", &url)]);
    driver
        .validity_by_url
        .insert(url.clone(), "20/04/2024".into());
    let cancel = CancelToken::new();
    cancel.request_stop();
    let (engine, _sink) = engine(test_config(), cancel);

    let summary = engine.run_on_date(&mut driver, today()).await.unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.succeeded, 1);
}
