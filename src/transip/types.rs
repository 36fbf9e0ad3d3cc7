// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TransIP REST API request and response bodies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single DNS entry of a TransIP domain.
///
/// All four fields together identify an entry: two TXT records with the same name
/// but different content are different entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DnsEntry {
    /// Name relative to the domain (`@` for the apex)
    pub name: String,
    /// TTL in seconds
    pub expire: u32,
    /// Record type (`TXT`, `A`, ...)
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Record value
    pub content: String,
}

impl fmt::Display for DnsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} \"{}\"",
            self.name, self.expire, self.entry_type, self.content
        )
    }
}

/// Body of `GET /domains/{domain}/dns`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntriesResponse {
    /// Every entry of the domain
    #[serde(default)]
    pub dns_entries: Vec<DnsEntry>,
}

/// Body of `POST` and `DELETE` on `/domains/{domain}/dns`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntryRequest<'a> {
    /// Entry to add or remove
    pub dns_entry: &'a DnsEntry,
}

/// Body of `POST /auth`.
///
/// The serialized bytes of this struct are what gets signed, so field order matters
/// only in that the signature must cover exactly the bytes sent.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    /// Account name
    pub login: String,
    /// Single-use random value
    pub nonce: String,
    /// Request a read-only token
    pub read_only: bool,
    /// Token lifetime, e.g. `30 minutes`
    pub expiration_time: String,
    /// Label shown in the TransIP control panel
    pub label: String,
    /// Whether the token may be used from any IP address
    pub global_key: bool,
}

/// Body of a successful `POST /auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for subsequent requests
    pub token: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Human readable error
    pub error: String,
}
