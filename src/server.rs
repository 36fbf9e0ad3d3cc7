// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Webhook API server.
//!
//! cert-manager reaches the webhook through the Kubernetes aggregation layer, so
//! the server looks like a tiny API server for one group:
//!
//! | Method | Path                                   | Purpose                         |
//! |--------|----------------------------------------|---------------------------------|
//! | POST   | `/apis/{group}/v1alpha1/{solver}`      | Present / CleanUp a challenge   |
//! | GET    | `/apis`                                | `APIGroupList` discovery        |
//! | GET    | `/apis/{group}`                        | `APIGroup` discovery            |
//! | GET    | `/apis/{group}/v1alpha1`               | `APIResourceList` discovery     |
//! | GET    | `/healthz`, `/livez`, `/readyz`        | Probes                          |
//! | GET    | `/metrics`                             | Prometheus metrics              |
//!
//! Solver failures are not HTTP errors: the payload comes back with
//! `response.success = false` and a `Failure` status. Only requests that never
//! reach a solver (unknown group or solver, undecodable body) get a 4xx.

use crate::challenge::{ChallengeAction, ChallengePayload, ChallengeResponse};
use crate::constants::{
    KIND_CHALLENGE_PAYLOAD, MAX_PAYLOAD_BYTES, SHUTDOWN_DRAIN_TIMEOUT_SECS, WEBHOOK_API_VERSION,
};
use crate::errors::failure_reason;
use crate::metrics;
use crate::solver::{ShutdownSignal, Solver};
use crate::status_reasons::{REASON_BAD_REQUEST, REASON_NOT_FOUND, STATUS_FAILURE};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    APIGroup, APIGroupList, APIResource, APIResourceList, GroupVersionForDiscovery, Status,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;
use rustls::ServerConfig;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

/// Shared state of the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    group_name: Arc<str>,
    solvers: Arc<BTreeMap<String, Arc<dyn Solver>>>,
}

impl WebhookState {
    /// Serve `solvers` under the API group `group_name`.
    ///
    /// Solvers are keyed by [`Solver::name`]; a later solver with the same name
    /// replaces an earlier one.
    #[must_use]
    pub fn new(group_name: &str, solvers: Vec<Arc<dyn Solver>>) -> Self {
        let solvers = solvers
            .into_iter()
            .map(|solver| (solver.name().to_string(), solver))
            .collect();
        Self {
            group_name: Arc::from(group_name),
            solvers: Arc::new(solvers),
        }
    }

    /// API group the webhook is served under.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Names of the registered solvers, sorted.
    pub fn solver_names(&self) -> impl Iterator<Item = &str> {
        self.solvers.keys().map(String::as_str)
    }

    fn group_version(&self) -> String {
        format!("{}/{WEBHOOK_API_VERSION}", self.group_name)
    }
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState")
            .field("group_name", &self.group_name)
            .field("solvers", &self.solvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(healthz))
        .route("/readyz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/apis", get(api_group_list))
        .route("/apis/{group}", get(api_group))
        .route("/apis/{group}/{version}", get(api_resource_list))
        .route("/apis/{group}/{version}/{solver}", post(solve))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn discovery_group(state: &WebhookState) -> APIGroup {
    let version = GroupVersionForDiscovery {
        group_version: state.group_version(),
        version: WEBHOOK_API_VERSION.to_string(),
    };
    APIGroup {
        name: state.group_name.to_string(),
        preferred_version: Some(version.clone()),
        versions: vec![version],
        ..Default::default()
    }
}

async fn api_group_list(State(state): State<WebhookState>) -> Json<APIGroupList> {
    Json(APIGroupList {
        groups: vec![discovery_group(&state)],
    })
}

async fn api_group(State(state): State<WebhookState>, Path(group): Path<String>) -> Response {
    if group != *state.group_name {
        return not_found(format!("the server could not find the API group {group}"));
    }
    Json(discovery_group(&state)).into_response()
}

async fn api_resource_list(
    State(state): State<WebhookState>,
    Path((group, version)): Path<(String, String)>,
) -> Response {
    if group != *state.group_name || version != WEBHOOK_API_VERSION {
        return not_found(format!(
            "the server could not find the requested resource {group}/{version}"
        ));
    }

    let resources = state
        .solver_names()
        .map(|name| APIResource {
            name: name.to_string(),
            singular_name: name.to_string(),
            kind: KIND_CHALLENGE_PAYLOAD.to_string(),
            namespaced: false,
            verbs: vec!["create".to_string()],
            ..Default::default()
        })
        .collect();

    Json(APIResourceList {
        group_version: state.group_version(),
        resources,
    })
    .into_response()
}

async fn solve(
    State(state): State<WebhookState>,
    Path((group, version, solver_name)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    if group != *state.group_name || version != WEBHOOK_API_VERSION {
        return not_found(format!(
            "the server could not find the requested resource {group}/{version}"
        ));
    }

    let Some(solver) = state.solvers.get(&solver_name).cloned() else {
        warn!(solver = %solver_name, "Challenge for unknown solver");
        return not_found(format!("no solver named '{solver_name}' is registered"));
    };

    let payload: ChallengePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(solver = %solver_name, error = %e, "Malformed ChallengePayload");
            return bad_request(format!("failed to decode ChallengePayload: {e}"));
        }
    };

    let Some(request) = payload.request else {
        return bad_request("ChallengePayload has no request".to_string());
    };

    let action = request.action;
    info!(
        uid = %request.uid,
        solver = %solver_name,
        action = %action,
        fqdn = %request.resolved_fqdn,
        "Handling challenge"
    );

    let start = Instant::now();
    let result = match action {
        ChallengeAction::Present => solver.present(&request).await,
        ChallengeAction::CleanUp => solver.cleanup(&request).await,
    };

    let response = match result {
        Ok(()) => {
            info!(uid = %request.uid, action = %action, "Challenge handled");
            ChallengeResponse::success(&request.uid)
        }
        Err(e) => {
            let reason = failure_reason(&e);
            error!(uid = %request.uid, action = %action, reason = %reason, error = %format!("{e:#}"), "Challenge failed");
            ChallengeResponse::failure(&request.uid, reason, format!("{e:#}"))
        }
    };

    metrics::record_challenge(
        &solver_name,
        &action.to_string(),
        response.success,
        start.elapsed(),
    );

    (
        StatusCode::CREATED,
        Json(ChallengePayload::answer(Some(request), response)),
    )
        .into_response()
}

fn status_response(code: StatusCode, reason: &str, message: String) -> Response {
    let status = Status {
        status: Some(STATUS_FAILURE.to_string()),
        reason: Some(reason.to_string()),
        code: Some(i32::from(code.as_u16())),
        message: Some(message),
        ..Default::default()
    };
    (code, Json(status)).into_response()
}

fn not_found(message: String) -> Response {
    status_response(StatusCode::NOT_FOUND, REASON_NOT_FOUND, message)
}

fn bad_request(message: String) -> Response {
    status_response(StatusCode::BAD_REQUEST, REASON_BAD_REQUEST, message)
}

// ============================================================================
// Serving
// ============================================================================

/// Load the serving certificate chain and private key.
///
/// # Errors
///
/// Returns an error if either file cannot be read or holds no usable PEM data.
pub fn load_tls_config(cert_file: &FsPath, key_file: &FsPath) -> Result<Arc<ServerConfig>> {
    let mut cert_reader = BufReader::new(
        File::open(cert_file)
            .with_context(|| format!("Failed to open TLS certificate {}", cert_file.display()))?,
    );
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse TLS certificate {}", cert_file.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {}", cert_file.display()));
    }

    let mut key_reader = BufReader::new(
        File::open(key_file)
            .with_context(|| format!("Failed to open TLS private key {}", key_file.display()))?,
    );
    let key = rustls_pemfile::private_key(&mut key_reader)
        .with_context(|| format!("Failed to parse TLS private key {}", key_file.display()))?
        .ok_or_else(|| anyhow!("no private key found in {}", key_file.display()))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("Failed to select TLS protocol versions")?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .context("TLS certificate and private key do not match")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Serve `state` on `addr` until `shutdown` flips to `true`.
///
/// With `tls` set every connection is a TLS connection, otherwise plain HTTP.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the plain HTTP server fails.
pub async fn run(
    addr: SocketAddr,
    state: WebhookState,
    tls: Option<Arc<ServerConfig>>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind webhook server to {addr}"))?;
    serve(
        listener,
        state,
        tls,
        shutdown,
        Duration::from_secs(SHUTDOWN_DRAIN_TIMEOUT_SECS),
    )
    .await
}

/// Serve on an already bound listener.
///
/// Once `shutdown` fires no new connections are accepted; open connections
/// finish their current request, for at most `drain_timeout`.
///
/// # Errors
///
/// Returns an error if the plain HTTP server fails.
pub async fn serve(
    listener: TcpListener,
    state: WebhookState,
    tls: Option<Arc<ServerConfig>>,
    mut shutdown: ShutdownSignal,
    drain_timeout: Duration,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    let app = router(state);

    let Some(tls) = tls else {
        warn!(address = %local_addr, "No TLS certificate configured, serving plain HTTP");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stopped(&mut shutdown).await })
            .await
            .context("Webhook server failed")?;
        info!("Webhook server stopped");
        return Ok(());
    };

    info!(address = %local_addr, "Serving webhook over HTTPS");
    let acceptor = TlsAcceptor::from(tls);
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            () = stopped(&mut shutdown) => break,
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        let mut conn_shutdown = shutdown.clone();
        connections.spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = hyper::service::service_fn(
                move |request: hyper::Request<hyper::body::Incoming>| app.clone().oneshot(request),
            );
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                () = stopped(&mut conn_shutdown) => {
                    // Finish the request in flight, then close.
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                debug!(peer = %peer, error = %e, "Connection closed with error");
            }
        });
    }

    info!(
        connections = connections.len(),
        "Webhook server stopping, draining open connections"
    );
    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(drain_timeout, drain).await.is_err() {
        warn!(
            timeout_secs = drain_timeout.as_secs(),
            "Open connections did not finish in time, aborting them"
        );
        connections.abort_all();
    }

    info!("Webhook server stopped");
    Ok(())
}

/// Resolves once the shutdown signal is raised or its sender is gone.
pub async fn stopped(shutdown: &mut ShutdownSignal) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
