//! HTTP surface: health check, the Twilio SMS webhook, and bearer-protected
//! admin endpoints for the monitor and the hosted browser session.

use axum::{
    extract::{DefaultBodyLimit, OriginalUri, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use igsms_channels::twilio::{
    constant_time_eq, parse_inbound, request_url, SignatureValidator,
};
use igsms_core::{config::Config, error::IgsmsError};
use igsms_memory::{audit::AuditStatus, Store};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::commands::{self, Command};
use crate::monitor::{self, Monitor};
use crate::notifier::Notifier;

type ApiError = (StatusCode, Json<Value>);

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 500;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    monitor: Arc<Monitor>,
    notifier: Notifier,
    store: Store,
    /// `None` when webhook signature validation is switched off.
    validator: Option<SignatureValidator>,
    public_url: String,
    secret_token: Option<String>,
    poll_seconds: u64,
    data_dir: String,
}

impl ApiState {
    pub fn new(
        config: &Config,
        monitor: Arc<Monitor>,
        notifier: Notifier,
        store: Store,
        validator: Option<SignatureValidator>,
    ) -> Self {
        let secret_token = Some(config.api.secret_token.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            monitor,
            notifier,
            store,
            validator,
            public_url: config.twilio.public_url.clone(),
            secret_token,
            poll_seconds: config.instagram.poll_seconds,
            data_dir: config.igsms.data_dir.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NavigateRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ClickRequest {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct TypeRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct KeyRequest {
    key: String,
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<i64>,
}

/// Check bearer token auth for admin routes. Without a configured token the
/// admin routes are closed entirely.
fn check_admin(headers: &HeaderMap, secret_token: &Option<String>) -> Result<(), ApiError> {
    let Some(token) = secret_token else {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "admin API disabled: APP_SECRET_TOKEN is not set"})),
        ));
    };

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing Authorization header"})),
        ))?
        .to_str()
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            )
        })?;

    match value.strip_prefix("Bearer ") {
        Some(given) if constant_time_eq(given.trim(), token) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

fn internal(e: IgsmsError) -> ApiError {
    error!("admin request failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

fn bad_gateway(e: IgsmsError) -> ApiError {
    warn!("browser request failed: {e}");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"error": e.to_string()})),
    )
}

/// Reject a webhook whose `X-Twilio-Signature` does not match.
fn verify_signature(
    validator: &SignatureValidator,
    public_url: &str,
    headers: &HeaderMap,
    uri: &Uri,
    params: &BTreeMap<String, String>,
) -> Result<(), (StatusCode, &'static str)> {
    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::BAD_REQUEST, "Missing Twilio signature"))?;

    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = request_url(
        public_url,
        header_str("host"),
        header_str("x-forwarded-proto"),
        path_and_query,
    )
    .ok_or((StatusCode::BAD_REQUEST, "Cannot determine request URL"))?;

    if validator.validate(&url, params, signature) {
        Ok(())
    } else {
        warn!("rejected webhook with bad signature for {url}");
        Err((StatusCode::FORBIDDEN, "Invalid Twilio signature"))
    }
}

/// `GET /healthz`
async fn healthz(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "poll_seconds": state.poll_seconds,
        "data_dir": state.data_dir,
        "monitor_running": state.monitor.is_running().await,
    }))
}

/// `POST /twilio/sms`: inbound SMS from Twilio.
async fn twilio_sms(
    State(state): State<ApiState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Form(params): Form<BTreeMap<String, String>>,
) -> Response {
    if let Some(validator) = &state.validator {
        if let Err(rejection) =
            verify_signature(validator, &state.public_url, &headers, &uri, &params)
        {
            return rejection.into_response();
        }
    }

    let Some(message) = parse_inbound(&params) else {
        warn!("webhook without a From field");
        return (StatusCode::ACCEPTED, "IGNORED").into_response();
    };

    if !commands::is_owner(state.notifier.owner_phone(), &message.sender_id) {
        info!("ignoring SMS from non-owner {}", message.sender_id);
        state
            .notifier
            .audit_inbound(&message.sender_id, &message.text, AuditStatus::Denied)
            .await;
        return (StatusCode::ACCEPTED, "IGNORED").into_response();
    }

    state
        .notifier
        .audit_inbound(&message.sender_id, &message.text, AuditStatus::Ok)
        .await;

    match commands::handle(Command::parse(&message.text), &state.monitor, &state.notifier).await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            error!("SMS command failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "ERROR").into_response()
        }
    }
}

/// `POST /api/monitor/start`
async fn monitor_start(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let status = state.monitor.start().await.map_err(internal)?;
    Ok(Json(json!({"status": status.as_str()})))
}

/// `POST /api/monitor/stop`
async fn monitor_stop(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let status = state.monitor.stop().await.map_err(internal)?;
    Ok(Json(json!({"status": status.as_str()})))
}

/// `GET /api/monitor/status`
async fn monitor_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let snapshot = state.store.snapshot().await.map_err(internal)?;
    Ok(Json(json!({
        "running": state.monitor.is_running().await,
        "state": snapshot,
    })))
}

/// `GET /api/browser/status`: current URL and login state of the shared page.
/// Never launches the browser.
async fn browser_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let browser = state.monitor.browser();
    if !browser.is_open().await {
        return Ok(Json(json!({"open": false})));
    }
    let page = browser.page().await.map_err(bad_gateway)?;
    let url = page.url().await.map_err(bad_gateway)?;
    let logged_in = monitor::is_logged_in(page.as_ref()).await;
    Ok(Json(json!({
        "open": true,
        "url": url,
        "logged_in": logged_in,
    })))
}

/// `GET /api/browser/screenshot`: PNG of the viewport.
async fn browser_screenshot(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Response, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let page = state.monitor.browser().page().await.map_err(bad_gateway)?;
    let png = page.screenshot().await.map_err(bad_gateway)?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

/// `POST /api/browser/navigate` `{url}`
async fn browser_navigate(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let url = request.url.trim();
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "url must be http(s)"})),
        ));
    }
    let page = state.monitor.browser().page().await.map_err(bad_gateway)?;
    page.goto(url).await.map_err(bad_gateway)?;
    let current = page.url().await.map_err(bad_gateway)?;
    Ok(Json(json!({"status": "ok", "url": current})))
}

/// `POST /api/browser/click` `{x, y}`
async fn browser_click(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let page = state.monitor.browser().page().await.map_err(bad_gateway)?;
    page.click(request.x, request.y)
        .await
        .map_err(bad_gateway)?;
    Ok(Json(json!({"status": "ok"})))
}

/// `POST /api/browser/type` `{text}`
async fn browser_type(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(request): Json<TypeRequest>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let page = state.monitor.browser().page().await.map_err(bad_gateway)?;
    page.type_text(&request.text).await.map_err(bad_gateway)?;
    Ok(Json(json!({"status": "ok"})))
}

/// `POST /api/browser/key` `{key}`
async fn browser_key(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(request): Json<KeyRequest>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let page = state.monitor.browser().page().await.map_err(bad_gateway)?;
    page.press_key(&request.key).await.map_err(bad_gateway)?;
    Ok(Json(json!({"status": "ok"})))
}

/// `GET /api/audit?limit=N`: newest SMS traffic first.
async fn audit(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    check_admin(&headers, &state.secret_token)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let entries = state
        .notifier
        .audit()
        .recent(limit)
        .await
        .map_err(internal)?;
    Ok(Json(json!({"entries": entries})))
}

/// Build the axum router with shared state.
fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/twilio/sms", post(twilio_sms))
        .route("/api/monitor/start", post(monitor_start))
        .route("/api/monitor/stop", post(monitor_stop))
        .route("/api/monitor/status", get(monitor_status))
        .route("/api/browser/status", get(browser_status))
        .route("/api/browser/screenshot", get(browser_screenshot))
        .route("/api/browser/navigate", post(browser_navigate))
        .route("/api/browser/click", post(browser_click))
        .route("/api/browser/type", post(browser_type))
        .route("/api/browser/key", post(browser_key))
        .route("/api/audit", get(audit))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("could not install SIGTERM handler: {e}");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
    info!("shutdown signal received");
}

/// Serve until a shutdown signal arrives.
pub async fn serve(host: &str, port: u16, state: ApiState) -> Result<(), IgsmsError> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("API server failed to bind to {addr}: {e}");
        IgsmsError::Io(e)
    })?;

    info!("API server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
