// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the TransIP webhook.
//!
//! This module provides specialized error types for:
//! - Decoding the per-issuer solver configuration
//! - Resolving the TransIP private key (inline or from a Kubernetes `Secret`)
//! - TransIP REST API operations (authentication, DNS entry management)
//! - Authoritative zone discovery via SOA queries
//!
//! Solver operations propagate these through `anyhow::Error`; the webhook server
//! recovers the typed error with [`failure_reason`] to fill in the `reason` of the
//! `Status` returned to cert-manager.

use crate::status_reasons::{
    map_http_status_to_reason, REASON_BAD_REQUEST, REASON_INTERNAL_ERROR, REASON_INVALID,
    REASON_NOT_FOUND, REASON_SERVICE_UNAVAILABLE, REASON_TIMEOUT, REASON_UNAUTHORIZED,
};
use thiserror::Error;

/// Errors decoding the solver configuration attached to a challenge.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The config blob is not valid JSON for the solver config schema
    #[error("error decoding solver config: {reason}")]
    Decode {
        /// Underlying serde error message
        reason: String,
    },

    /// A required field is empty
    #[error("solver config field '{field}' must be set")]
    MissingField {
        /// JSON name of the missing field
        field: &'static str,
    },
}

/// Errors resolving the TransIP private key.
#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    /// Neither an inline key nor a secret reference was configured
    #[error("no private key configured: set either 'privateKey' or 'privateKeySecretRef'")]
    NoCredentials,

    /// A secret must be fetched but the solver has not been initialized
    #[error("kubernetes client not initialized, cannot read secret '{namespace}/{name}'")]
    ClientNotInitialized {
        /// Namespace of the referenced secret
        namespace: String,
        /// Name of the referenced secret
        name: String,
    },

    /// Fetching the secret from the Kubernetes API failed
    #[error("failed to get secret '{namespace}/{name}': {reason}")]
    SecretFetchFailed {
        /// Namespace of the referenced secret
        namespace: String,
        /// Name of the referenced secret
        name: String,
        /// Underlying Kubernetes client error
        reason: String,
    },

    /// The secret exists but does not contain the referenced key
    #[error("no private key for '{key}' in secret '{namespace}/{name}'")]
    SecretKeyMissing {
        /// Namespace of the referenced secret
        namespace: String,
        /// Name of the referenced secret
        name: String,
        /// Data key that was looked up
        key: String,
    },

    /// The key material is not a usable RSA private key
    #[error("invalid TransIP private key: {reason}")]
    InvalidPrivateKey {
        /// Why the key was rejected
        reason: String,
    },
}

/// Errors talking to the TransIP REST API.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// TransIP answered with a non-success HTTP status
    #[error("TransIP API {operation} returned HTTP {status_code}: {message}")]
    Api {
        /// Operation that failed (e.g. `auth`, `list dns entries`)
        operation: String,
        /// HTTP status code
        status_code: u16,
        /// `error` field of the response body, or the raw body
        message: String,
    },

    /// The request could not be sent or the connection dropped
    #[error("TransIP API {operation} failed: {reason}")]
    Connection {
        /// Operation that failed
        operation: String,
        /// Transport error message
        reason: String,
    },

    /// The request exceeded the client timeout
    #[error("TransIP API {operation} timed out")]
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// The response body could not be decoded
    #[error("unexpected response from TransIP API {operation}: {reason}")]
    InvalidResponse {
        /// Operation whose response was malformed
        operation: String,
        /// Decoding error
        reason: String,
    },
}

impl ProviderError {
    /// Build a provider error from a `reqwest` transport failure.
    #[must_use]
    pub fn from_reqwest(operation: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                operation: operation.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                operation: operation.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Connection {
                operation: operation.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Errors discovering the authoritative zone of a name.
#[derive(Error, Debug, Clone)]
pub enum ZoneError {
    /// No recursive nameservers are configured
    #[error("no recursive nameservers configured")]
    NoNameservers,

    /// The name could not be parsed as a DNS name
    #[error("invalid domain name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// Parser error
        reason: String,
    },

    /// Every nameserver failed to answer the SOA query
    #[error("SOA query for '{domain}' failed: {reason}")]
    QueryFailed {
        /// Domain being queried
        domain: String,
        /// Last transport error
        reason: String,
    },

    /// A nameserver answered with something other than NOERROR or NXDOMAIN
    #[error("unexpected response code '{code}' for {domain}")]
    UnexpectedResponseCode {
        /// Domain being queried
        domain: String,
        /// Response code returned
        code: String,
    },

    /// Walked to the root without finding an SOA record
    #[error("could not find the start of authority for '{fqdn}'")]
    NoStartOfAuthority {
        /// Name whose zone was searched
        fqdn: String,
    },
}

/// Composite error type covering every failure a challenge can hit.
#[derive(Error, Debug, Clone)]
pub enum WebhookError {
    /// Solver configuration could not be decoded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Private key could not be resolved
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// TransIP API failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Zone discovery failure
    #[error(transparent)]
    Zone(#[from] ZoneError),
}

impl WebhookError {
    /// Returns the Kubernetes `StatusReason` for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Config(_) => REASON_BAD_REQUEST,

            Self::Credential(
                CredentialError::NoCredentials | CredentialError::InvalidPrivateKey { .. },
            ) => REASON_INVALID,
            Self::Credential(CredentialError::SecretKeyMissing { .. }) => REASON_NOT_FOUND,
            Self::Credential(CredentialError::SecretFetchFailed { .. }) => REASON_UNAUTHORIZED,
            Self::Credential(CredentialError::ClientNotInitialized { .. }) => {
                REASON_INTERNAL_ERROR
            }

            Self::Provider(ProviderError::Api { status_code, .. }) => {
                map_http_status_to_reason(*status_code)
            }
            Self::Provider(ProviderError::Connection { .. }) => REASON_SERVICE_UNAVAILABLE,
            Self::Provider(ProviderError::Timeout { .. }) => REASON_TIMEOUT,
            Self::Provider(ProviderError::InvalidResponse { .. }) | Self::Zone(_) => {
                REASON_INTERNAL_ERROR
            }
        }
    }
}

/// Find the most specific status reason in an error chain.
///
/// Walks the `anyhow` chain looking for one of the typed errors of this module and
/// falls back to `InternalError` when none is present.
#[must_use]
pub fn failure_reason(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<WebhookError>() {
            return e.status_reason();
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return WebhookError::Config(e.clone()).status_reason();
        }
        if let Some(e) = cause.downcast_ref::<CredentialError>() {
            return WebhookError::Credential(e.clone()).status_reason();
        }
        if let Some(e) = cause.downcast_ref::<ProviderError>() {
            return WebhookError::Provider(e.clone()).status_reason();
        }
        if let Some(e) = cause.downcast_ref::<ZoneError>() {
            return WebhookError::Zone(e.clone()).status_reason();
        }
    }
    REASON_INTERNAL_ERROR
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
