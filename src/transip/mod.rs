// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TransIP REST API client.
//!
//! Only the small part of the TransIP v6 API needed for DNS-01 challenges is
//! covered:
//!
//! - `POST /auth` - exchange a signed request for a bearer token
//! - `GET /domains/{domain}/dns` - list the DNS entries of a domain
//! - `POST /domains/{domain}/dns` - add one DNS entry
//! - `DELETE /domains/{domain}/dns` - remove one DNS entry
//!
//! # Example
//!
//! ```rust,no_run
//! use cert_manager_webhook_transip::transip::{auth::SigningKey, DnsEntry, TransipClient};
//!
//! # async fn example(pem: &[u8]) -> anyhow::Result<()> {
//! let key = SigningKey::from_pem(pem)?;
//! let http = reqwest::Client::new();
//! let client =
//!     TransipClient::authenticate(&http, "https://api.transip.nl/v6", "my-account", &key)
//!         .await?;
//!
//! let entries = client.get_dns_entries("example.com").await?;
//! println!("{} entries", entries.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod types;

pub use types::DnsEntry;

use crate::constants::{
    TRANSIP_SIGNATURE_HEADER, TRANSIP_TOKEN_EXPIRATION, TRANSIP_TOKEN_LABEL_NONCE_CHARS,
    TRANSIP_TOKEN_LABEL_PREFIX,
};
use crate::errors::ProviderError;
use crate::metrics;
use anyhow::{Context, Result};
use auth::SigningKey;
use reqwest::{header, Client as HttpClient, Method, RequestBuilder, Response};
use std::time::Instant;
use tracing::{debug, info};
use types::{AuthRequest, AuthResponse, DnsEntriesResponse, DnsEntryRequest, ErrorResponse};

/// Authenticated TransIP API client.
///
/// Holds a bearer token obtained by [`TransipClient::authenticate`]. A client is
/// built per challenge call and dropped afterwards.
#[derive(Debug, Clone)]
pub struct TransipClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

/// Normalize the API base URL: no trailing slash, `https://` when no scheme is given.
#[must_use]
pub fn build_api_url(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Label for a new access token.
///
/// Concurrent challenges authenticate within the same second, so the label
/// carries part of the request nonce next to the timestamp.
#[must_use]
pub fn token_label(timestamp: i64, nonce: &str) -> String {
    let suffix = nonce.get(..TRANSIP_TOKEN_LABEL_NONCE_CHARS).unwrap_or(nonce);
    format!("{TRANSIP_TOKEN_LABEL_PREFIX}-{timestamp}-{suffix}")
}

impl TransipClient {
    /// Request an access token for `account_name`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the request fails or TransIP rejects the
    /// signature, or a [`crate::errors::CredentialError`] if signing fails.
    pub async fn authenticate(
        http: &HttpClient,
        base_url: &str,
        account_name: &str,
        key: &SigningKey,
    ) -> Result<Self> {
        let base_url = build_api_url(base_url);
        let nonce = key.nonce()?;
        let request = AuthRequest {
            login: account_name.to_string(),
            label: token_label(chrono::Utc::now().timestamp(), &nonce),
            nonce,
            read_only: false,
            expiration_time: TRANSIP_TOKEN_EXPIRATION.to_string(),
            global_key: true,
        };

        // The signature covers these exact bytes, so send them as-is.
        let body = serde_json::to_vec(&request).context("Failed to encode auth request")?;
        let signature = key.sign(&body)?;

        debug!(account = %account_name, url = %base_url, "Requesting TransIP access token");

        let builder = http
            .post(format!("{base_url}/auth"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(TRANSIP_SIGNATURE_HEADER, signature)
            .body(body);
        let response = send("auth", builder).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest("auth", &e))?;

        info!(account = %account_name, "Obtained TransIP access token");

        Ok(Self {
            http: http.clone(),
            base_url,
            token: auth.token,
        })
    }

    /// Build a client around an existing token.
    #[must_use]
    pub fn with_token(http: HttpClient, base_url: &str, token: String) -> Self {
        Self {
            http,
            base_url: build_api_url(base_url),
            token,
        }
    }

    fn dns_url(&self, domain: &str) -> String {
        format!("{}/domains/{domain}/dns", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    /// List every DNS entry of `domain`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the request fails or the domain is unknown.
    pub async fn get_dns_entries(&self, domain: &str) -> Result<Vec<DnsEntry>> {
        let operation = "list dns entries";
        let response = send(operation, self.request(Method::GET, self.dns_url(domain))).await?;
        let body: DnsEntriesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(operation, &e))?;

        debug!(
            domain = %domain,
            count = body.dns_entries.len(),
            "Fetched TransIP DNS entries"
        );
        Ok(body.dns_entries)
    }

    /// Add `entry` to `domain`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if TransIP rejects the entry.
    pub async fn add_dns_entry(&self, domain: &str, entry: &DnsEntry) -> Result<()> {
        let builder = self
            .request(Method::POST, self.dns_url(domain))
            .json(&DnsEntryRequest { dns_entry: entry });
        send("add dns entry", builder).await?;
        Ok(())
    }

    /// Remove `entry` from `domain`.
    ///
    /// TransIP only removes an entry when all four fields match.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if TransIP rejects the removal.
    pub async fn remove_dns_entry(&self, domain: &str, entry: &DnsEntry) -> Result<()> {
        let builder = self
            .request(Method::DELETE, self.dns_url(domain))
            .json(&DnsEntryRequest { dns_entry: entry });
        send("remove dns entry", builder).await?;
        Ok(())
    }
}

/// Send a request and turn non-2xx responses into [`ProviderError::Api`].
async fn send(operation: &str, builder: RequestBuilder) -> Result<Response, ProviderError> {
    let start = Instant::now();
    let result = builder.send().await;
    let elapsed = start.elapsed();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            metrics::record_provider_request(operation, "error", elapsed);
            return Err(ProviderError::from_reqwest(operation, &e));
        }
    };

    let status = response.status();
    if status.is_success() {
        metrics::record_provider_request(operation, "success", elapsed);
        return Ok(response);
    }

    metrics::record_provider_request(operation, "error", elapsed);
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        Err(_) => body,
    };

    Err(ProviderError::Api {
        operation: operation.to_string(),
        status_code: status.as_u16(),
        message,
    })
}
