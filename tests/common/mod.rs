// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cert_manager_webhook_transip::transip::DnsEntry;
use cert_manager_webhook_transip::zone::ZoneResolver;
use kube::client::Client;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// API group the test webhook is served under
pub const GROUP: &str = "acme.example.com";

/// PEM RSA key used to sign TransIP auth requests
pub const TRANSIP_KEY_PEM: &str = include_str!("../../testdata/transip-pkcs8.pem");

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Zone resolver that always answers with the same zone.
pub struct FixedZone(pub &'static str);

#[async_trait]
impl ZoneResolver for FixedZone {
    async fn find_zone_by_fqdn(&self, _fqdn: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

/// In-memory TransIP domain behind a wiremock server.
///
/// `GET` lists the entries, `POST` appends one, `DELETE` removes the entry that
/// matches on all four fields (404 when none does, like TransIP).
#[derive(Clone, Default)]
pub struct FakeDomain {
    entries: Arc<Mutex<Vec<DnsEntry>>>,
}

impl FakeDomain {
    pub fn with_entries(entries: Vec<DnsEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn entries(&self) -> Vec<DnsEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Mount the auth endpoint and `/domains/{domain}/dns` on `server`.
    pub async fn mount(&self, server: &MockServer, domain: &str) {
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "test-token" })))
            .mount(server)
            .await;

        Mock::given(path(format!("/domains/{domain}/dns")))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }
}

impl Respond for FakeDomain {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut entries = self.entries.lock().unwrap();
        match request.method.as_str() {
            "GET" => ResponseTemplate::new(200).set_body_json(json!({ "dnsEntries": *entries })),
            "POST" | "DELETE" => {
                let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
                    return ResponseTemplate::new(406)
                        .set_body_json(json!({ "error": "invalid JSON" }));
                };
                let Ok(entry) = serde_json::from_value::<DnsEntry>(body["dnsEntry"].clone())
                else {
                    return ResponseTemplate::new(406)
                        .set_body_json(json!({ "error": "invalid dnsEntry" }));
                };

                if request.method.as_str() == "POST" {
                    entries.push(entry);
                    return ResponseTemplate::new(201);
                }
                match entries.iter().position(|e| *e == entry) {
                    Some(index) => {
                        entries.remove(index);
                        ResponseTemplate::new(204)
                    }
                    None => ResponseTemplate::new(404)
                        .set_body_json(json!({ "error": "DNS entry not found" })),
                }
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

/// A TXT entry as the webhook writes it.
pub fn txt_entry(name: &str, ttl: u32, content: &str) -> DnsEntry {
    DnsEntry {
        name: name.to_string(),
        expire: ttl,
        entry_type: "TXT".to_string(),
        content: content.to_string(),
    }
}

/// Mock the Kubernetes API to serve a `Secret` holding `key_pem` under `key`.
pub async fn mount_secret(server: &MockServer, namespace: &str, name: &str, key: &str, key_pem: &str) {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), Value::String(BASE64.encode(key_pem)));

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/namespaces/{namespace}/secrets/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": name, "namespace": namespace },
            "data": data
        })))
        .mount(server)
        .await;
}

/// Kubernetes client talking to a mock API server.
pub fn mock_kube_client(server: &MockServer) -> Client {
    let config = kube::Config::new(server.uri().parse().unwrap());
    Client::try_from(config).unwrap()
}

/// A `ChallengePayload` as cert-manager sends it.
pub fn challenge_payload(action: &str, key: &str, config: Value) -> Value {
    json!({
        "apiVersion": "acme.cert-manager.io/v1alpha1",
        "kind": "ChallengePayload",
        "request": {
            "uid": format!("uid-{action}-{key}"),
            "action": action,
            "type": "dns-01",
            "dnsName": "example.com",
            "key": key,
            "resourceNamespace": "cert-manager",
            "resolvedFQDN": "_acme-challenge.example.com.",
            "resolvedZone": "example.com.",
            "allowAmbientCredentials": false,
            "config": config
        }
    })
}
