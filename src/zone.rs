// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authoritative zone discovery and record name derivation.
//!
//! TransIP manages records per registered domain, so before touching a record the
//! webhook needs the domain that owns it. The zone is found by walking up the
//! name's label hierarchy and asking recursive nameservers for an SOA record at
//! each level; the first level that answers with an SOA is the zone apex.
//!
//! ```text
//! _acme-challenge.www.example.com.   SOA? -> NOERROR, no SOA in answer
//! www.example.com.                   SOA? -> NOERROR, no SOA in answer
//! example.com.                       SOA? -> NOERROR, SOA example.com.  <- zone
//! ```

use crate::constants::{DNS_PORT, DNS_QUERY_TIMEOUT_SECS, FALLBACK_NAMESERVERS, RESOLV_CONF_PATH};
use crate::errors::ZoneError;
use crate::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::{Message, ResponseCode};
use hickory_client::rr::{DNSClass, Name, RecordType};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Strip one trailing dot from a fully-qualified name.
#[must_use]
pub fn un_fqdn(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

/// Append a trailing dot unless one is already present.
#[must_use]
pub fn to_fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Derive the record name relative to `domain`.
///
/// Returns the part of `fqdn` before the first occurrence of `.domain`, or the
/// whole `fqdn` without its trailing dot when `domain` is not a suffix.
///
/// ```rust
/// use cert_manager_webhook_transip::zone::extract_record_name;
///
/// assert_eq!(
///     extract_record_name("_acme-challenge.www.example.com.", "example.com"),
///     "_acme-challenge.www"
/// );
/// assert_eq!(
///     extract_record_name("_acme-challenge.example.org.", "example.com"),
///     "_acme-challenge.example.org"
/// );
/// ```
#[must_use]
pub fn extract_record_name(fqdn: &str, domain: &str) -> String {
    match fqdn.find(&format!(".{domain}")) {
        Some(idx) => fqdn[..idx].to_string(),
        None => un_fqdn(fqdn),
    }
}

/// Every suffix of `fqdn` from the full name up to the TLD.
///
/// `_acme-challenge.example.com` yields `_acme-challenge.example.com.`,
/// `example.com.`, `com.`. The root is never included.
#[must_use]
pub fn domain_candidates(fqdn: &str) -> Vec<String> {
    let fqdn = to_fqdn(fqdn);
    let mut candidates = Vec::new();
    let mut rest = fqdn.as_str();

    while !rest.is_empty() && rest != "." {
        candidates.push(rest.to_string());
        match rest.find('.') {
            Some(idx) => rest = &rest[idx + 1..],
            None => break,
        }
    }
    candidates
}

/// Decide what an SOA response says about `domain`.
///
/// - `Ok(Some(zone))`: the answer carries an SOA; `zone` is its owner name.
/// - `Ok(None)`: keep walking (NXDOMAIN, no SOA, or a CNAME at this name).
/// - `Err(_)`: any response code other than NOERROR or NXDOMAIN.
///
/// # Errors
///
/// Returns [`ZoneError::UnexpectedResponseCode`] for SERVFAIL, REFUSED and friends.
pub fn zone_from_soa_response(domain: &str, response: &Message) -> Result<Option<String>, ZoneError> {
    match response.response_code() {
        ResponseCode::NXDomain => Ok(None),
        ResponseCode::NoError => {
            // A CNAME cannot live at a zone apex.
            if response
                .answers()
                .iter()
                .any(|r| r.record_type() == RecordType::CNAME)
            {
                return Ok(None);
            }
            Ok(response
                .answers()
                .iter()
                .find(|r| r.record_type() == RecordType::SOA)
                .map(|r| r.name().to_string()))
        }
        code => Err(ZoneError::UnexpectedResponseCode {
            domain: domain.to_string(),
            code: format!("{code:?}"),
        }),
    }
}

/// Finds the zone apex for a name.
#[async_trait]
pub trait ZoneResolver: Send + Sync {
    /// Return the authoritative zone of `fqdn`, with trailing dot.
    async fn find_zone_by_fqdn(&self, fqdn: &str) -> Result<String>;
}

/// [`ZoneResolver`] that walks SOA records through recursive nameservers.
#[derive(Debug, Clone)]
pub struct SoaZoneResolver {
    nameservers: Vec<SocketAddr>,
    timeout: Duration,
}

impl SoaZoneResolver {
    /// Resolver querying `nameservers` in order.
    #[must_use]
    pub fn new(nameservers: Vec<SocketAddr>) -> Self {
        Self {
            nameservers,
            timeout: Duration::from_secs(DNS_QUERY_TIMEOUT_SECS),
        }
    }

    /// Override the per-query timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Nameservers this resolver queries.
    #[must_use]
    pub fn nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }
}

#[async_trait]
impl ZoneResolver for SoaZoneResolver {
    async fn find_zone_by_fqdn(&self, fqdn: &str) -> Result<String> {
        if self.nameservers.is_empty() {
            return Err(ZoneError::NoNameservers.into());
        }

        let fqdn = to_fqdn(fqdn);
        let nameservers = self.nameservers.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || -> Result<String> {
            for domain in domain_candidates(&fqdn) {
                let response = query_soa(&domain, &nameservers, timeout)?;
                if let Some(zone) = zone_from_soa_response(&domain, &response)? {
                    debug!(fqdn = %fqdn, zone = %zone, "Found start of authority");
                    return Ok(zone);
                }
            }
            Err(ZoneError::NoStartOfAuthority { fqdn }.into())
        })
        .await
        .context("Zone lookup task failed")?
    }
}

/// Ask each nameserver in turn for the SOA of `domain` until one answers.
fn query_soa(domain: &str, nameservers: &[SocketAddr], timeout: Duration) -> Result<Message, ZoneError> {
    let name = Name::from_str(domain).map_err(|e| ZoneError::InvalidName {
        name: domain.to_string(),
        reason: e.to_string(),
    })?;

    let mut last_error = String::from("no nameservers");
    for server in nameservers {
        match query_soa_udp(&name, *server, timeout) {
            Ok(message) if message.header().truncated() => {
                debug!(domain = %domain, server = %server, "Truncated SOA answer, retrying over TCP");
                match query_soa_tcp(&name, *server, timeout) {
                    Ok(message) => return Ok(message),
                    Err(e) => last_error = e,
                }
            }
            Ok(message) => return Ok(message),
            Err(e) => {
                debug!(domain = %domain, server = %server, error = %e, "SOA query failed");
                last_error = e;
            }
        }
    }

    Err(ZoneError::QueryFailed {
        domain: domain.to_string(),
        reason: last_error,
    })
}

fn query_soa_udp(name: &Name, server: SocketAddr, timeout: Duration) -> Result<Message, String> {
    let conn = UdpClientConnection::with_timeout(server, timeout).map_err(|e| e.to_string())?;
    let client = SyncClient::new(conn);
    let response = client
        .query(name, DNSClass::IN, RecordType::SOA)
        .map_err(|e| e.to_string())?;
    Ok((*response).clone())
}

fn query_soa_tcp(name: &Name, server: SocketAddr, timeout: Duration) -> Result<Message, String> {
    let conn = TcpClientConnection::with_timeout(server, timeout).map_err(|e| e.to_string())?;
    let client = SyncClient::new(conn);
    let response = client
        .query(name, DNSClass::IN, RecordType::SOA)
        .map_err(|e| e.to_string())?;
    Ok((*response).clone())
}

/// Resolve the TransIP domain name for a challenge zone.
///
/// Looks up the authoritative zone of `zone`; on failure logs the error and falls
/// back to `zone` itself. The result has no trailing dot.
pub async fn resolve_domain_name(resolver: &dyn ZoneResolver, zone: &str) -> String {
    match resolver.find_zone_by_fqdn(zone).await {
        Ok(auth_zone) => un_fqdn(&auth_zone),
        Err(e) => {
            warn!(zone = %zone, error = %e, "Could not get zone by fqdn, using supplied zone");
            metrics::record_zone_lookup_fallback();
            un_fqdn(zone)
        }
    }
}

/// Parse a nameserver given as `ip`, `ip:port` or `[ipv6]:port`.
///
/// # Errors
///
/// Returns an error if the value is not an IP address with optional port.
pub fn parse_nameserver(value: &str) -> Result<SocketAddr> {
    let value = value.trim();
    if let Ok(addr) = SocketAddr::from_str(value) {
        return Ok(addr);
    }
    let ip = IpAddr::from_str(value.trim_start_matches('[').trim_end_matches(']'))
        .with_context(|| format!("Invalid nameserver address: {value}"))?;
    Ok(SocketAddr::new(ip, DNS_PORT))
}

/// Extract `nameserver` entries from resolv.conf content.
#[must_use]
pub fn parse_resolv_conf(content: &str) -> Vec<SocketAddr> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => {
                    // Drop IPv6 zone ids such as fe80::1%eth0.
                    let addr = addr.split('%').next().unwrap_or(addr);
                    IpAddr::from_str(addr)
                        .ok()
                        .map(|ip| SocketAddr::new(ip, DNS_PORT))
                }
                _ => None,
            }
        })
        .collect()
}

/// Pick the recursive nameservers used for zone discovery.
///
/// Explicit `overrides` win; otherwise the system resolv.conf is read, and the
/// public fallbacks are used when that yields nothing.
///
/// # Errors
///
/// Returns an error if an override is not a valid address.
pub fn recursive_nameservers(overrides: &[String]) -> Result<Vec<SocketAddr>> {
    if !overrides.is_empty() {
        return overrides.iter().map(|s| parse_nameserver(s)).collect();
    }

    let from_system = std::fs::read_to_string(RESOLV_CONF_PATH)
        .map(|content| parse_resolv_conf(&content))
        .unwrap_or_default();
    if !from_system.is_empty() {
        return Ok(from_system);
    }

    FALLBACK_NAMESERVERS
        .iter()
        .map(|s| parse_nameserver(s))
        .collect()
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
