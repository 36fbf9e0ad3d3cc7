// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TransIP private key resolution.
//!
//! The key is either inlined in the solver config (`privateKey`) or referenced
//! from a `Secret` in the challenge's namespace (`privateKeySecretRef`). An inline
//! key always wins.

use crate::config::TransipConfig;
use crate::errors::CredentialError;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::debug;

/// Resolve the PEM private key for a challenge.
///
/// # Arguments
///
/// * `config` - Decoded solver config
/// * `client` - Kubernetes client, `None` before the solver is initialized
/// * `namespace` - Namespace of the challenge, where the secret is looked up
///
/// # Errors
///
/// Returns a [`CredentialError`] if no key is configured, the secret cannot be
/// read, or the secret lacks the referenced key.
pub async fn resolve_private_key(
    config: &TransipConfig,
    client: Option<&Client>,
    namespace: &str,
) -> Result<Vec<u8>, CredentialError> {
    if !config.private_key.is_empty() {
        debug!("Using inline TransIP private key");
        return Ok(config.private_key.clone());
    }

    let secret_ref = &config.private_key_secret_ref;
    if secret_ref.name.is_empty() {
        return Err(CredentialError::NoCredentials);
    }

    let client = client.ok_or_else(|| CredentialError::ClientNotInitialized {
        namespace: namespace.to_string(),
        name: secret_ref.name.clone(),
    })?;

    debug!(
        namespace = %namespace,
        secret = %secret_ref.name,
        key = %secret_ref.key,
        "Fetching TransIP private key from secret"
    );

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets
        .get(&secret_ref.name)
        .await
        .map_err(|e| CredentialError::SecretFetchFailed {
            namespace: namespace.to_string(),
            name: secret_ref.name.clone(),
            reason: e.to_string(),
        })?;

    secret
        .data
        .as_ref()
        .and_then(|data| data.get(&secret_ref.key))
        .filter(|value| !value.0.is_empty())
        .map(|value| value.0.clone())
        .ok_or_else(|| CredentialError::SecretKeyMissing {
            namespace: namespace.to_string(),
            name: secret_ref.name.clone(),
            key: secret_ref.key.clone(),
        })
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
