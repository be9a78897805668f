use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    config::Config,
    error::NotifyError,
    registry::Registry,
    scheme::{Registration, ATTR_CHANNEL_ID},
    store::JsonFileStore,
    toast::NotifyData,
    wns::{NotifyOptions, WnsNotificationService},
};

pub const REGISTRATION_PATH: &str = "/api/notify.windows";
pub const SEND_PATH: &str = "/api/notify.windows/send";

pub struct AppState {
    pub registry: Arc<Registry>,
    pub notifier: Arc<WnsNotificationService>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(REGISTRATION_PATH, post(api_register).delete(api_unregister))
        .route(SEND_PATH, post(api_send))
        .with_state(state)
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(JsonFileStore::new(&config.registrations_file));
    let registry = Arc::new(
        Registry::load(store)
            .with_context(|| format!("loading {}", config.registrations_file.display()))?,
    );
    let notifier = Arc::new(WnsNotificationService::new(&config, registry.clone()));

    let app = router(Arc::new(AppState { registry, notifier }));

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    log::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .with_context(|| format!("binding {}", addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

fn json_message(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

fn parse_json(body: &[u8]) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|_| json_message(StatusCode::BAD_REQUEST, "Invalid JSON"))
}

fn save_error(e: NotifyError) -> Response {
    log::error!("{}", e);
    json_message(StatusCode::INTERNAL_SERVER_ERROR, "Error saving registration.")
}

async fn api_register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> axum::response::Result<Response> {
    let data = parse_json(&body)?;

    let registration = Registration::validate(&data)
        .map_err(|e| json_message(StatusCode::BAD_REQUEST, e.to_string()))?;
    let id = registration.id.clone();

    state.registry.upsert(registration).await.map_err(save_error)?;

    log::info!("registered push subscriber {}", id);
    Ok(json_message(StatusCode::OK, "Push notification subscriber registered."))
}

async fn api_unregister(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> axum::response::Result<Response> {
    let data = parse_json(&body)?;

    let channel_id = match data.get(ATTR_CHANNEL_ID).and_then(Value::as_str) {
        Some(id) => id,
        // Nothing to match against, so it is already unregistered.
        None => return Ok(json_message(StatusCode::OK, "Registration not found.")),
    };

    match state
        .registry
        .remove_by_channel_id(channel_id)
        .await
        .map_err(save_error)?
    {
        Some(_) => {
            log::info!("unregistered push subscriber {}", channel_id);
            Ok(json_message(StatusCode::OK, "Push notification subscriber unregistered."))
        }
        None => Ok(json_message(StatusCode::OK, "Registration not found.")),
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Targets {
    One(String),
    Many(Vec<String>),
}

#[derive(serde::Deserialize)]
struct SendPayload {
    message: String,
    title: Option<String>,
    target: Option<Targets>,
    data: Option<NotifyData>,
}

async fn api_send(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> axum::response::Result<Response> {
    let data = parse_json(&body)?;
    let payload: SendPayload = serde_json::from_value(data)
        .map_err(|e| json_message(StatusCode::BAD_REQUEST, e.to_string()))?;

    let options = NotifyOptions {
        title: payload.title,
        targets: payload.target.map(|t| match t {
            Targets::One(t) => vec![t],
            Targets::Many(t) => t,
        }),
        data: payload.data,
    };

    let report = state
        .notifier
        .send_message(&payload.message, options)
        .await
        .map_err(|e| {
            log::error!("{}", e);
            let status = match e {
                NotifyError::TokenFetch(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_message(status, e.to_string())
        })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Notification sent.",
            "delivered": report.delivered,
            "skipped": report.skipped,
        })),
    )
        .into_response())
}
