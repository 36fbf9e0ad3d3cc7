// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS-01 solver backed by the TransIP DNS API.
//!
//! Each call decodes the issuer config, resolves the private key, authenticates
//! against TransIP and then adds or removes exactly one TXT entry. Entries are
//! compared on name, TTL, type and content, so:
//!
//! - presenting the same challenge twice leaves a single entry, and
//! - cleaning up one challenge never removes another challenge's entry for the
//!   same name.

use crate::challenge::ChallengeRequest;
use crate::config::{load_config, TransipConfig};
use crate::constants::{SOLVER_NAME, TRANSIP_REQUEST_TIMEOUT_SECS, TXT_RECORD_TYPE};
use crate::credentials::resolve_private_key;
use crate::metrics;
use crate::solver::{ShutdownSignal, Solver};
use crate::transip::{auth::SigningKey, build_api_url, DnsEntry, TransipClient};
use crate::zone::{extract_record_name, resolve_domain_name, ZoneResolver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Solver registered as `transip`.
pub struct TransipSolver {
    kube_client: OnceLock<kube::Client>,
    http: reqwest::Client,
    api_url: String,
    zone_resolver: Arc<dyn ZoneResolver>,
}

impl std::fmt::Debug for TransipSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransipSolver")
            .field("api_url", &self.api_url)
            .field("initialized", &self.kube_client.get().is_some())
            .finish_non_exhaustive()
    }
}

impl TransipSolver {
    /// Create a solver talking to the TransIP API at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_url` is not a valid URL or the HTTP client cannot
    /// be built.
    pub fn new(api_url: &str, zone_resolver: Arc<dyn ZoneResolver>) -> Result<Self> {
        let api_url = build_api_url(api_url);
        url::Url::parse(&api_url).with_context(|| format!("Invalid TransIP API URL '{api_url}'"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSIP_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Failed to build HTTP client for TransIP")?;

        Ok(Self {
            kube_client: OnceLock::new(),
            http,
            api_url,
            zone_resolver,
        })
    }

    /// Use an already constructed Kubernetes client instead of [`Solver::initialize`].
    #[must_use]
    pub fn with_kube_client(self, client: kube::Client) -> Self {
        let _ = self.kube_client.set(client);
        self
    }

    /// Build the challenge TXT entry for `domain`.
    #[must_use]
    pub fn challenge_entry(
        challenge: &ChallengeRequest,
        config: &TransipConfig,
        domain: &str,
    ) -> DnsEntry {
        DnsEntry {
            name: extract_record_name(&challenge.resolved_fqdn, domain),
            expire: config.record_ttl(),
            entry_type: TXT_RECORD_TYPE.to_string(),
            content: challenge.key.clone(),
        }
    }

    /// Authenticate against TransIP with the credentials of `config`.
    async fn connect(
        &self,
        challenge: &ChallengeRequest,
        config: &TransipConfig,
    ) -> Result<TransipClient> {
        let pem = resolve_private_key(
            config,
            self.kube_client.get(),
            &challenge.resource_namespace,
        )
        .await?;
        let key = SigningKey::from_pem(&pem)?;

        debug!(account = %config.account_name, "Creating TransIP client");
        TransipClient::authenticate(&self.http, &self.api_url, &config.account_name, &key).await
    }

    /// Shared preamble of present and cleanup.
    async fn prepare(
        &self,
        challenge: &ChallengeRequest,
    ) -> Result<(String, TransipClient, DnsEntry)> {
        let domain = resolve_domain_name(self.zone_resolver.as_ref(), &challenge.resolved_zone).await;

        let config = load_config(challenge.config.as_ref()).inspect_err(|e| {
            error!(uid = %challenge.uid, error = %e, "Error while loading config");
        })?;
        config.validate()?;

        let client = self.connect(challenge, &config).await.inspect_err(|e| {
            error!(uid = %challenge.uid, error = %e, "Error while creating TransIP client");
        })?;

        let entry = Self::challenge_entry(challenge, &config, &domain);
        Ok((domain, client, entry))
    }
}

#[async_trait]
impl Solver for TransipSolver {
    fn name(&self) -> &str {
        SOLVER_NAME
    }

    async fn initialize(&self, kube_config: kube::Config, _shutdown: ShutdownSignal) -> Result<()> {
        let client =
            kube::Client::try_from(kube_config).context("Failed to create Kubernetes client")?;
        if self.kube_client.set(client).is_err() {
            warn!("TransIP solver already initialized, keeping existing Kubernetes client");
        }

        info!(api_url = %self.api_url, "TransIP solver initialized");
        Ok(())
    }

    async fn present(&self, challenge: &ChallengeRequest) -> Result<()> {
        let (domain, client, entry) = self.prepare(challenge).await?;

        info!(
            uid = %challenge.uid,
            fqdn = %challenge.resolved_fqdn,
            domain = %domain,
            "Presenting record"
        );

        let entries = client
            .get_dns_entries(&domain)
            .await
            .with_context(|| format!("Error while getting DNS entries for {domain}"))?;

        // Present may be called repeatedly for one challenge.
        if entries.contains(&entry) {
            info!(domain = %domain, entry = %entry, "ACME DNS entry already exists, skipping");
            metrics::record_record_change("already_present");
            return Ok(());
        }

        client
            .add_dns_entry(&domain, &entry)
            .await
            .with_context(|| format!("Error while setting DNS entry for domain {domain}"))?;

        info!(domain = %domain, entry = %entry, "New record has been set");
        metrics::record_record_change("created");
        Ok(())
    }

    async fn cleanup(&self, challenge: &ChallengeRequest) -> Result<()> {
        let (domain, client, entry) = self.prepare(challenge).await?;

        info!(
            uid = %challenge.uid,
            fqdn = %challenge.resolved_fqdn,
            domain = %domain,
            "Cleaning up record"
        );

        let entries = client
            .get_dns_entries(&domain)
            .await
            .with_context(|| format!("Error while getting DNS entries for {domain}"))?;

        // Only the entry carrying this challenge's key; other validations of the
        // same name keep theirs.
        if !entries.contains(&entry) {
            info!(domain = %domain, entry = %entry, "Did not find a DNS record matching the challenge");
            metrics::record_record_change("not_found");
            return Ok(());
        }

        info!(domain = %domain, entry = %entry, "Deleting DNS record");
        client
            .remove_dns_entry(&domain, &entry)
            .await
            .with_context(|| format!("Error while removing DNS entry from domain {domain}"))?;

        metrics::record_record_change("deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "transip_tests.rs"]
mod transip_tests;
