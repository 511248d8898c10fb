use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use campaign_core::data::CampaignData;
use campaign_core::dom::SharedDocument;
use campaign_core::session::SessionSnapshot;
use campaign_core::template::ClientLoader;
use campaign_core::{CampaignProject, CompiledTemplate, DevEvent, DevSession, SessionConfig};

use crate::config::CampaignConfig;
use crate::{select_loader, watch};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DataUpdateResponse {
    /// Whether the new data differed and triggered a reload.
    pub reloaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub payload: Option<Value>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared server state: the dev session behind an async lock.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<DevSession>>,
    project: CampaignProject,
    events: broadcast::Sender<DevEvent>,
}

impl AppState {
    /// Build and start a dev session for `project`.
    pub async fn start(
        project: CampaignProject,
        loader: Arc<dyn ClientLoader>,
        config: SessionConfig,
    ) -> Result<Self> {
        let source = project.load_template()?;
        let template = CompiledTemplate::compile(&source).context("template failed to compile")?;
        let mut session = DevSession::new(
            SharedDocument::new(),
            loader,
            template,
            project.load_data(),
            config,
        );
        session.start().await?;
        let events = session.event_sender();
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            project,
            events,
        })
    }

    pub fn session(&self) -> &Arc<Mutex<DevSession>> {
        &self.session
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/virtual/campaign-data.js", get(data_module))
        .route("/api/state", get(session_state))
        .route("/api/data", get(get_data).post(post_data))
        .route("/api/control", post(run_control))
        .route("/events", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(config: &CampaignConfig, client: Option<&str>) -> Result<()> {
    let project = CampaignProject::new(&config.dir);
    if !project.dir().is_dir() {
        bail!(
            "campaign directory not found: {} (use --dir or CAMPAIGN_DIR)",
            project.dir().display()
        );
    }
    let loader = select_loader(&project, client)?;
    let state = AppState::start(project.clone(), loader, SessionConfig::default()).await?;

    let cancel = CancellationToken::new();
    let (_watcher, rx) = watch::start_watcher(&project)?;
    let reload_task = {
        let session = state.session.clone();
        let project = project.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let changes = watch::debounced(project.clone(), rx, watch::DEBOUNCE_WINDOW);
            watch::run_reload_loop(&session, &project, changes, cancel).await;
        })
    };

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.bind, config.port))?;
    info!("campaign serve listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = reload_task.await {
        warn!(error = %e, "reload task ended abnormally");
    }
    state.session.lock().await.dispose().await?;
    info!("campaign serve shut down");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "failed to listen for Ctrl+C");
            }
        }
        _ = cancel.cancelled() => {}
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

const RELOAD_SCRIPT: &str = r#"
const source = new EventSource('/events');
source.addEventListener('reloaded', () => location.reload());
source.addEventListener('styles-changed', () => {
  const link = document.getElementById('campaign-styles');
  link.href = '/styles.css?t=' + Date.now();
});
source.addEventListener('campaign-data-update', (e) => {
  console.info('[campaign] data updated', JSON.parse(e.data).data);
});
for (const name of ['apply-failed', 'load-failed']) {
  source.addEventListener(name, (e) => {
    const event = JSON.parse(e.data);
    console.error('[campaign] ' + name + ': ' + event.message, event.hint || '');
  });
}
"#;

async fn index(State(state): State<AppState>) -> Html<String> {
    let body = state.session.lock().await.body_html();
    Html(format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>campaign dev</title>\
<link id=\"campaign-styles\" rel=\"stylesheet\" href=\"/styles.css\"></head>\
<body>{body}<script>{RELOAD_SCRIPT}</script></body></html>"
    ))
}

async fn styles(State(state): State<AppState>) -> impl IntoResponse {
    let css = state.project.load_stylesheet();
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css)
}

async fn data_module(State(state): State<AppState>) -> impl IntoResponse {
    let source = state.session.lock().await.data().to_module_source();
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], source)
}

async fn session_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

async fn get_data(State(state): State<AppState>) -> Json<CampaignData> {
    Json(state.session.lock().await.data().clone())
}

async fn post_data(
    State(state): State<AppState>,
    Json(data): Json<CampaignData>,
) -> Result<Json<DataUpdateResponse>, AppError> {
    let reloaded = state
        .session
        .lock()
        .await
        .data_changed(data)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(DataUpdateResponse { reloaded }))
}

async fn run_control(State(state): State<AppState>) -> Json<ControlResponse> {
    let payload = state.session.lock().await.control();
    Json(ControlResponse { payload })
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|msg| async move {
        match msg {
            Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok::<_, Infallible>(sse)),
                Err(e) => {
                    warn!(error = %e, "failed to encode dev event");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged; dropping events");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
