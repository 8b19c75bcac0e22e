use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use renova_core::runner::execute_run;
use renova_core::runlog::LogSink;

use crate::state::{AppState, BufferSink, LastResult};

const LOG_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/api/run", post(start_run))
        .route("/api/stop", post(stop_run))
        .route("/api/status", get(status))
        .route("/api/logs/stream", get(logs_stream))
        .layer(CorsLayer::permissive())
        .with_state(app)
}

/// Begins a run unless one is active. The run proceeds in the background;
/// the response only acknowledges acceptance.
async fn start_run(State(app): State<AppState>) -> impl IntoResponse {
    let cancel = match app.state.lock().unwrap().begin_run() {
        Some(cancel) => cancel,
        None => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "ok": false, "error": "a run is already in progress" })),
            );
        }
    };

    let sink: Arc<dyn LogSink> = Arc::new(BufferSink::new(app.state.clone()));
    let config = Arc::clone(&app.config);
    let shared = app.state.clone();
    tokio::spawn(async move {
        let result = match execute_run(config, sink, cancel).await {
            Ok(summary) => LastResult::Summary(summary),
            Err(err) => {
                tracing::error!(error = %err, "run ended with fatal error");
                LastResult::Error {
                    error: err.to_string(),
                }
            }
        };
        shared.lock().unwrap().finish_run(result);
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "message": "run started" })),
    )
}

/// Advisory stop: the run finishes its current record before honoring it.
async fn stop_run(State(app): State<AppState>) -> impl IntoResponse {
    if app.state.lock().unwrap().request_stop() {
        (
            StatusCode::OK,
            Json(json!({ "ok": true, "message": "stop requested" })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "no run in progress" })),
        )
    }
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(default)]
    from: usize,
}

async fn status(
    State(app): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let guard = app.state.lock().unwrap();
    let (logs, total) = guard.logs_from(query.from);
    Json(json!({
        "ok": true,
        "running": guard.is_running(),
        "result": guard.last_result(),
        "logs": logs,
        "total": total,
    }))
}

/// Pushes newly appended log batches once per poll interval until the
/// client disconnects.
async fn logs_stream(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let shared = app.state.clone();
    let stream = futures::stream::unfold(0usize, move |cursor| {
        let shared = shared.clone();
        async move {
            let mut cursor = cursor;
            loop {
                tokio::time::sleep(LOG_POLL_INTERVAL).await;
                let (batch, total) = shared.lock().unwrap().logs_from(cursor);
                if batch.is_empty() {
                    continue;
                }
                cursor = total;
                let event = Event::default().json_data(&batch).ok()?;
                return Some((Ok::<_, Infallible>(event), cursor));
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
