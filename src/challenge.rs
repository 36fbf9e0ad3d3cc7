// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! cert-manager webhook wire types.
//!
//! cert-manager talks to DNS-01 webhooks through the Kubernetes aggregation layer by
//! `POST`ing a `ChallengePayload` to `/apis/<group>/v1alpha1/<solverName>`. The same
//! envelope comes back with `response` filled in.
//!
//! ```json
//! {
//!   "apiVersion": "acme.cert-manager.io/v1alpha1",
//!   "kind": "ChallengePayload",
//!   "request": {
//!     "uid": "0b4e0b8c-5c6f-4a57-a1a1-2c4b1f9e7a10",
//!     "action": "Present",
//!     "type": "dns-01",
//!     "dnsName": "example.com",
//!     "key": "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo",
//!     "resourceNamespace": "cert-manager",
//!     "resolvedFQDN": "_acme-challenge.example.com.",
//!     "resolvedZone": "example.com.",
//!     "allowAmbientCredentials": false,
//!     "config": { "accountName": "my-account" }
//!   }
//! }
//! ```

use crate::constants::{CHALLENGE_PAYLOAD_API_VERSION, KIND_CHALLENGE_PAYLOAD};
use crate::status_reasons::{reason_code, STATUS_FAILURE};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What cert-manager wants done with the challenge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ChallengeAction {
    /// Create the TXT record
    Present,
    /// Remove the TXT record
    CleanUp,
}

impl fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("Present"),
            Self::CleanUp => f.write_str("CleanUp"),
        }
    }
}

/// A single challenge handed to a solver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Identifier echoed back in the response
    #[serde(default)]
    pub uid: String,

    /// Present or CleanUp
    pub action: ChallengeAction,

    /// Challenge type, always `dns-01` for webhooks
    #[serde(rename = "type", default)]
    pub challenge_type: String,

    /// Domain name being validated
    #[serde(default)]
    pub dns_name: String,

    /// Proof value to publish in the TXT record
    #[serde(default)]
    pub key: String,

    /// Namespace in which referenced secrets are looked up
    #[serde(default)]
    pub resource_namespace: String,

    /// Fully-qualified name of the TXT record, with trailing dot
    #[serde(rename = "resolvedFQDN", default)]
    pub resolved_fqdn: String,

    /// Zone cert-manager believes is authoritative, with trailing dot
    #[serde(default)]
    pub resolved_zone: String,

    /// Whether ambient (environment) credentials may be used
    #[serde(default)]
    pub allow_ambient_credentials: bool,

    /// Opaque solver configuration from the issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// Result of handling a challenge.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    /// Identifier copied from the request
    #[serde(default)]
    pub uid: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Failure details when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl ChallengeResponse {
    /// A successful response for `uid`.
    #[must_use]
    pub fn success(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            success: true,
            status: None,
        }
    }

    /// A failed response for `uid` with the given `reason` and `message`.
    #[must_use]
    pub fn failure(uid: &str, reason: &str, message: String) -> Self {
        Self {
            uid: uid.to_string(),
            success: false,
            status: Some(Status {
                status: Some(STATUS_FAILURE.to_string()),
                reason: Some(reason.to_string()),
                code: Some(i32::from(reason_code(reason))),
                message: Some(message),
                ..Default::default()
            }),
        }
    }
}

/// Envelope exchanged with cert-manager.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    /// Always `acme.cert-manager.io/v1alpha1`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Always `ChallengePayload`
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Set by cert-manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChallengeRequest>,

    /// Set by the webhook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChallengeResponse>,
}

impl ChallengePayload {
    /// Wrap a response in a fresh envelope, echoing the request it answers.
    #[must_use]
    pub fn answer(request: Option<ChallengeRequest>, response: ChallengeResponse) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            request,
            response: Some(response),
        }
    }
}

fn default_api_version() -> String {
    CHALLENGE_PAYLOAD_API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND_CHALLENGE_PAYLOAD.to_string()
}

#[cfg(test)]
#[path = "challenge_tests.rs"]
mod challenge_tests;
