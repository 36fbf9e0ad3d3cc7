// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the TransIP webhook.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Webhook API Constants
// ============================================================================

/// Name under which the TransIP solver is registered with cert-manager
pub const SOLVER_NAME: &str = "transip";

/// API version served for every solver resource
pub const WEBHOOK_API_VERSION: &str = "v1alpha1";

/// API version of the `ChallengePayload` envelope exchanged with cert-manager
pub const CHALLENGE_PAYLOAD_API_VERSION: &str = "acme.cert-manager.io/v1alpha1";

/// Kind of the `ChallengePayload` envelope
pub const KIND_CHALLENGE_PAYLOAD: &str = "ChallengePayload";

/// Environment variable holding the API group the webhook is served under
pub const GROUP_NAME_ENV: &str = "GROUP_NAME";

/// Default HTTPS port for the webhook server
pub const DEFAULT_SECURE_PORT: u16 = 443;

/// Time open connections get to finish their request after a shutdown signal
pub const SHUTDOWN_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Maximum accepted size of a challenge payload body (1 MiB)
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

// ============================================================================
// DNS Constants
// ============================================================================

/// Standard DNS port for recursive queries
pub const DNS_PORT: u16 = 53;

/// Record type used for ACME DNS-01 challenges
pub const TXT_RECORD_TYPE: &str = "TXT";

/// Default TTL for challenge records when the issuer config omits one (1 minute)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 60;

/// Timeout for a single SOA query against one nameserver
pub const DNS_QUERY_TIMEOUT_SECS: u64 = 10;

/// Resolver configuration consulted for recursive nameservers
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Nameservers used when no others can be discovered
pub const FALLBACK_NAMESERVERS: &[&str] = &["8.8.8.8:53", "8.8.4.4:53"];

// ============================================================================
// TransIP API Constants
// ============================================================================

/// Base URL of the TransIP REST API
pub const TRANSIP_API_URL: &str = "https://api.transip.nl/v6";

/// Lifetime requested for access tokens; each challenge call authenticates anew
pub const TRANSIP_TOKEN_EXPIRATION: &str = "30 minutes";

/// Prefix of the label attached to every access token
pub const TRANSIP_TOKEN_LABEL_PREFIX: &str = "cert-manager-webhook-transip";

/// Nonce characters appended to a token label; TransIP rejects duplicate labels
pub const TRANSIP_TOKEN_LABEL_NONCE_CHARS: usize = 8;

/// Number of random bytes in an authentication nonce (hex encoded on the wire)
pub const TRANSIP_NONCE_BYTES: usize = 16;

/// HTTP header carrying the signature of the authentication request
pub const TRANSIP_SIGNATURE_HEADER: &str = "Signature";

/// Timeout for a single TransIP API request
pub const TRANSIP_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Logging Constants
// ============================================================================

/// Environment variable selecting the log output format (`text` or `json`)
pub const LOG_FORMAT_ENV: &str = "RUST_LOG_FORMAT";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
