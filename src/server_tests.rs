// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the webhook routes.

#[cfg(test)]
mod tests {
    use crate::challenge::{ChallengePayload, ChallengeRequest};
    use crate::errors::{CredentialError, ProviderError};
    use crate::server::{load_tls_config, router, serve, WebhookState};
    use crate::solver::{ShutdownSignal, Solver};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::fs::File;
    use std::io::BufReader;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::watch;
    use tokio_rustls::TlsConnector;
    use tower::ServiceExt;

    const GROUP: &str = "acme.example.com";

    /// Records calls; fails any challenge whose key starts with `fail-`.
    #[derive(Default)]
    struct RecordingSolver {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Solver for RecordingSolver {
        fn name(&self) -> &str {
            "transip"
        }

        async fn initialize(&self, _: kube::Config, _: ShutdownSignal) -> Result<()> {
            Ok(())
        }

        async fn present(&self, challenge: &ChallengeRequest) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("present:{}", challenge.key));
            match challenge.key.as_str() {
                "fail-credentials" => Err(CredentialError::NoCredentials.into()),
                "fail-provider" => Err(anyhow::Error::from(ProviderError::Api {
                    operation: "add dns entry".to_string(),
                    status_code: 401,
                    message: "Signature could not be verified".to_string(),
                })
                .context("Error while setting DNS entry for domain example.com")),
                _ => Ok(()),
            }
        }

        async fn cleanup(&self, challenge: &ChallengeRequest) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("cleanup:{}", challenge.key));
            Ok(())
        }
    }

    fn app() -> (Router, Arc<RecordingSolver>) {
        let solver = Arc::new(RecordingSolver::default());
        let state = WebhookState::new(GROUP, vec![solver.clone() as Arc<dyn Solver>]);
        (router(state), solver)
    }

    fn payload(action: &str, key: &str) -> Value {
        json!({
            "apiVersion": "acme.cert-manager.io/v1alpha1",
            "kind": "ChallengePayload",
            "request": {
                "uid": "3f1c2b7e",
                "action": action,
                "type": "dns-01",
                "dnsName": "example.com",
                "key": key,
                "resourceNamespace": "cert-manager",
                "resolvedFQDN": "_acme-challenge.example.com.",
                "resolvedZone": "example.com.",
                "allowAmbientCredentials": false,
                "config": { "accountName": "my-account" }
            }
        })
    }

    fn post(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn solve_uri() -> String {
        format!("/apis/{GROUP}/v1alpha1/transip")
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _) = app();
        for uri in ["/healthz", "/livez", "/readyz"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"ok");
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::metrics::record_record_change("created");
        let (app, _) = app();
        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("cert_manager_webhook_transip_record_changes_total"));
    }

    #[tokio::test]
    async fn test_api_group_list() {
        let (app, _) = app();
        let response = app.oneshot(get("/apis")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "APIGroupList");
        assert_eq!(body["groups"][0]["name"], GROUP);
        assert_eq!(
            body["groups"][0]["preferredVersion"]["groupVersion"],
            format!("{GROUP}/v1alpha1")
        );
    }

    #[tokio::test]
    async fn test_api_resource_list() {
        let (app, _) = app();
        let response = app
            .oneshot(get(&format!("/apis/{GROUP}/v1alpha1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "APIResourceList");
        assert_eq!(body["groupVersion"], format!("{GROUP}/v1alpha1"));
        let resource = &body["resources"][0];
        assert_eq!(resource["name"], "transip");
        assert_eq!(resource["kind"], "ChallengePayload");
        assert_eq!(resource["namespaced"], false);
        assert_eq!(resource["verbs"], json!(["create"]));
    }

    #[tokio::test]
    async fn test_unknown_group_discovery_is_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(get("/apis/other.example.com/v1alpha1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_present_success() {
        let (app, solver) = app();
        let response = app
            .oneshot(post(&solve_uri(), payload("Present", "proof").to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: ChallengePayload = serde_json::from_value(json_body(response).await).unwrap();
        let answer = body.response.unwrap();
        assert!(answer.success);
        assert_eq!(answer.uid, "3f1c2b7e");
        assert!(answer.status.is_none());
        assert_eq!(body.request.unwrap().key, "proof");
        assert_eq!(*solver.calls.lock().unwrap(), vec!["present:proof"]);
    }

    #[tokio::test]
    async fn test_cleanup_dispatches_to_cleanup() {
        let (app, solver) = app();
        let response = app
            .oneshot(post(&solve_uri(), payload("CleanUp", "proof").to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(*solver.calls.lock().unwrap(), vec!["cleanup:proof"]);
    }

    #[tokio::test]
    async fn test_solver_failure_is_reported_in_payload() {
        let (app, _) = app();
        let response = app
            .oneshot(post(
                &solve_uri(),
                payload("Present", "fail-credentials").to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["response"]["success"], false);
        assert_eq!(body["response"]["uid"], "3f1c2b7e");
        let status = &body["response"]["status"];
        assert_eq!(status["status"], "Failure");
        assert_eq!(status["reason"], "Invalid");
        assert_eq!(status["code"], 422);
        assert!(status["message"]
            .as_str()
            .unwrap()
            .contains("no private key configured"));
    }

    #[tokio::test]
    async fn test_provider_failure_reason_survives_context() {
        let (app, _) = app();
        let response = app
            .oneshot(post(&solve_uri(), payload("Present", "fail-provider").to_string()))
            .await
            .unwrap();

        let body = json_body(response).await;
        let status = &body["response"]["status"];
        assert_eq!(status["reason"], "Unauthorized");
        assert_eq!(status["code"], 401);
        let message = status["message"].as_str().unwrap();
        assert!(message.starts_with("Error while setting DNS entry for domain example.com"));
        assert!(message.contains("Signature could not be verified"));
    }

    #[tokio::test]
    async fn test_unknown_solver_is_not_found() {
        let (app, solver) = app();
        let response = app
            .oneshot(post(
                &format!("/apis/{GROUP}/v1alpha1/cloudflare"),
                payload("Present", "proof").to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["kind"], "Status");
        assert_eq!(body["reason"], "NotFound");
        assert!(solver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_mismatch_is_not_found() {
        let (app, solver) = app();
        let response = app
            .oneshot(post(
                "/apis/other.example.com/v1alpha1/transip",
                payload("Present", "proof").to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(solver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let (app, _) = app();
        let response = app
            .oneshot(post(&solve_uri(), "{not json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["reason"], "BadRequest");
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_missing_request_is_bad_request() {
        let (app, _) = app();
        let body = json!({
            "apiVersion": "acme.cert-manager.io/v1alpha1",
            "kind": "ChallengePayload"
        });
        let response = app
            .oneshot(post(&solve_uri(), body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let (app, solver) = app();
        let response = app
            .oneshot(post(&solve_uri(), payload("Rotate", "proof").to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(solver.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_load_tls_config() {
        let config = load_tls_config(
            Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls.crt")),
            Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls.key")),
        )
        .unwrap();
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn test_load_tls_config_missing_file() {
        let err = load_tls_config(
            Path::new("/nonexistent/tls.crt"),
            Path::new("/nonexistent/tls.key"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tls.crt"));
    }

    #[test]
    fn test_load_tls_config_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("tls.key");
        std::fs::write(&key_file, "not a pem file\n").unwrap();

        let err = load_tls_config(
            Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls.crt")),
            &key_file,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no private key found"));
    }

    #[tokio::test]
    async fn test_plain_http_serve_stops_on_shutdown() {
        let (_, solver) = app();
        let state = WebhookState::new(GROUP, vec![solver as Arc<dyn Solver>]);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);

        let server = tokio::spawn(serve(listener, state, None, rx, Duration::from_secs(5)));

        let body = reqwest::get(format!("http://{addr}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }

    /// Takes its time presenting, then records that it finished.
    #[derive(Default)]
    struct SlowSolver {
        finished: AtomicBool,
    }

    #[async_trait]
    impl Solver for SlowSolver {
        fn name(&self) -> &str {
            "transip"
        }

        async fn initialize(&self, _: kube::Config, _: ShutdownSignal) -> Result<()> {
            Ok(())
        }

        async fn present(&self, _: &ChallengeRequest) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(800)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn cleanup(&self, _: &ChallengeRequest) -> Result<()> {
            Ok(())
        }
    }

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn tls_connector() -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        let mut reader = BufReader::new(File::open(testdata("ca.crt")).unwrap());
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert.unwrap()).unwrap();
        }
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }

    /// Send a raw HTTP/1.1 request over TLS and return the whole response.
    async fn https_request(addr: SocketAddr, request: String) -> String {
        let tcp = TcpStream::connect(addr).await.unwrap();
        let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
        let mut tls = tls_connector().connect(server_name, tcp).await.unwrap();
        tls.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        let _ = tls.read_to_end(&mut response).await;
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn start_https(
        solver: Arc<dyn Solver>,
    ) -> (
        SocketAddr,
        watch::Sender<bool>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let tls = load_tls_config(&testdata("tls.crt"), &testdata("tls.key")).unwrap();
        let state = WebhookState::new(GROUP, vec![solver]);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, state, Some(tls), rx, Duration::from_secs(10)));
        (addr, tx, server)
    }

    #[tokio::test]
    async fn test_https_serves_health() {
        let (addr, tx, server) = start_https(Arc::new(RecordingSolver::default())).await;

        let response = https_request(
            addr,
            "GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n".to_string(),
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("ok"), "{response}");

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_https_shutdown_waits_for_challenge_in_flight() {
        let solver = Arc::new(SlowSolver::default());
        let (addr, tx, server) = start_https(solver.clone()).await;

        let body = payload("Present", "proof").to_string();
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            solve_uri(),
            body.len()
        );
        let client = tokio::spawn(https_request(addr, request));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!solver.finished.load(Ordering::SeqCst));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(solver.finished.load(Ordering::SeqCst));

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 201"), "{response}");
        assert!(response.contains("\"success\":true"), "{response}");
    }
}
