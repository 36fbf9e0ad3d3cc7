// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line flags of the webhook binary.
//!
//! The flag names follow the ones cert-manager's Helm chart passes to webhook
//! solvers (`--secure-port`, `--tls-cert-file`, `--tls-private-key-file`), so the
//! binary drops into the stock deployment.

use crate::constants::{DEFAULT_SECURE_PORT, GROUP_NAME_ENV, TRANSIP_API_URL};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// cert-manager ACME DNS-01 webhook for TransIP
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// API group the webhook is registered under with cert-manager
    #[arg(long, env = GROUP_NAME_ENV)]
    pub group_name: String,

    /// Port to serve the webhook API on
    #[arg(long, default_value_t = DEFAULT_SECURE_PORT)]
    pub secure_port: u16,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_address: IpAddr,

    /// PEM certificate chain to serve; plain HTTP when unset
    #[arg(long, requires = "tls_private_key_file")]
    pub tls_cert_file: Option<PathBuf>,

    /// PEM private key matching --tls-cert-file
    #[arg(long, requires = "tls_cert_file")]
    pub tls_private_key_file: Option<PathBuf>,

    /// Base URL of the TransIP REST API
    #[arg(long, env = "TRANSIP_API_URL", default_value = TRANSIP_API_URL)]
    pub transip_api_url: String,

    /// Recursive nameservers (host or host:port) used to find authoritative zones.
    /// Defaults to /etc/resolv.conf.
    #[arg(
        long,
        env = "DNS01_RECURSIVE_NAMESERVERS",
        value_delimiter = ','
    )]
    pub dns01_recursive_nameservers: Vec<String>,
}

impl Args {
    /// Socket address the server binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.secure_port)
    }

    /// Certificate and key paths, when both are set.
    #[must_use]
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_file, &self.tls_private_key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
