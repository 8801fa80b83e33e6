// src/server/routes.rs

//! The two public endpoints: the subscriber WebSocket and the publish route.

use crate::config::Config;
use crate::connection::serve_subscriber;
use crate::core::bridge::ACKNOWLEDGEMENT;
use crate::core::transport::{SharedSink, WebSocketSink};
use crate::core::{PublishBridge, SessionRegistry};
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub bridge: PublishBridge,
    pub keepalive_interval: Duration,
    pub write_timeout: Option<Duration>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            bridge: PublishBridge::new(registry.clone()),
            registry,
            keepalive_interval: config.keepalive_interval,
            write_timeout: config.write_timeout,
            shutdown_tx,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(subscribe_handler))
        .route("/{api}/{command}", post(publish_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    token: Option<String>,
}

/// `GET /ws?token=<token>`. The upgrade is always accepted; an invalid or
/// duplicate token is answered on the socket with a policy close.
async fn subscribe_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SubscribeParams>,
    State(state): State<AppState>,
) -> Response {
    let token = params.token.unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, token, state))
}

async fn handle_socket(socket: WebSocket, token: String, state: AppState) {
    let shutdown_rx = state.shutdown_tx.subscribe();
    let (sink, inbound) = socket.split();
    let transport: SharedSink = Arc::new(WebSocketSink::new(sink, state.write_timeout));

    match serve_subscriber(
        &token,
        transport,
        inbound,
        state.registry.clone(),
        state.keepalive_interval,
        shutdown_rx,
    )
    .await
    {
        Ok(reason) => debug!("Subscriber task for '{}' finished: {}.", token, reason),
        Err(e) => debug!("Subscriber for '{}' was not admitted: {}.", token, e),
    }
}

/// `POST /{api}/{command}?<parameters>` with `Authorization: Bearer <token>`.
///
/// The credential is checked before the query string is parsed, so an
/// unauthenticated caller always gets 401.
async fn publish_handler(
    State(state): State<AppState>,
    Path((api, command)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.bridge.authorize(authorization) {
        debug!("Rejected publish {}/{}: unknown token.", api, command);
        state.bridge.record_rejection();
        return e.into_response();
    }

    let parameters = match Query::<BTreeMap<String, String>>::try_from_uri(&uri) {
        Ok(Query(parameters)) => parameters,
        Err(rejection) => return rejection.into_response(),
    };

    match state
        .bridge
        .submit(authorization, &api, &command, parameters)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(ACKNOWLEDGEMENT)).into_response(),
        Err(e) => e.into_response(),
    }
}
